pub mod audit;
pub mod entity;
pub mod error;
pub mod key;
pub mod relationship;
pub mod result;
pub mod source;

pub use audit::{Tier, TierEvent, TierOutcome};
pub use entity::EntityRecord;
pub use error::{LinkError, Result};
pub use key::{generate_entity_id, normalize_key};
pub use relationship::{normalize_predicate, Provenance, Relationship};
pub use result::{GeoPoint, MatchedVia, MissingFields, Reference, SourceResult};
pub use source::{LinkStatus, Source};

/// Language every linked record must carry a label and description in, unless configured otherwise.
pub const DEFAULT_LANGUAGE: &str = "en";
