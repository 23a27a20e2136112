//! Relationship deduplication: exact-triple collapse, optional LLM semantic
//! collapse, then validity filtering against the known entity list.

pub mod exact;
pub mod semantic;
pub mod validity;

pub use exact::collapse_exact;
pub use semantic::{collapse_semantic, parse_kept};
pub use validity::filter_valid;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use extract::LanguageModel;
use model::{EntityRecord, Relationship};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Entities come from a fixed pre-extracted list
    #[default]
    Extraction,
    /// Entities are discovered from the text alongside relationships
    Generative,
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub semantic: bool,
    pub mode: LinkMode,
    pub temperature: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            semantic: true,
            mode: LinkMode::Extraction,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupStats {
    pub input: usize,
    pub after_exact: usize,
    pub after_semantic: usize,
    pub after_validity: usize,
    pub semantic_groups: usize,
    /// Groups kept whole because the model gave no usable answer
    pub semantic_failures: usize,
}

pub struct Deduplicator {
    llm: Option<Arc<dyn LanguageModel>>,
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>, config: DedupConfig) -> Self {
        Self { llm, config }
    }

    /// Run the stages strictly in order. Each stage only removes or rewrites,
    /// so nothing dropped earlier comes back.
    pub async fn deduplicate(
        &self,
        relationships: Vec<Relationship>,
        known_entities: &[EntityRecord],
    ) -> (Vec<Relationship>, DedupStats) {
        let mut stats = DedupStats {
            input: relationships.len(),
            ..DedupStats::default()
        };

        let relationships = collapse_exact(relationships);
        stats.after_exact = relationships.len();

        let relationships = match (&self.llm, self.config.semantic) {
            (Some(llm), true) => {
                let names: HashMap<String, String> = known_entities
                    .iter()
                    .map(|e| (e.id.clone(), e.name.clone()))
                    .collect();
                let (kept, outcome) =
                    collapse_semantic(llm.as_ref(), relationships, &names, self.config.temperature).await;
                stats.semantic_groups = outcome.groups;
                stats.semantic_failures = outcome.failures;
                kept
            }
            _ => relationships,
        };
        stats.after_semantic = relationships.len();

        let relationships = match self.config.mode {
            LinkMode::Extraction => collapse_exact(filter_valid(relationships, known_entities)),
            LinkMode::Generative => relationships,
        };
        stats.after_validity = relationships.len();

        info!(
            input = stats.input,
            exact = stats.after_exact,
            semantic = stats.after_semantic,
            valid = stats.after_validity,
            "Relationships deduplicated"
        );
        (relationships, stats)
    }
}
