//! End-to-end linking run: mentions are collapsed into entity records,
//! resolved source by source, then relationships are extracted and deduplicated.

pub mod output;
pub mod request;
pub mod runner;

pub use dedup::LinkMode;
pub use output::{EntityView, LinkingResult, RelationshipStats, RelationshipView, RunStatistics, SourceView};
pub use request::{build_records, LinkRequest, MentionInput};
pub use runner::{Pipeline, PipelineConfig};
