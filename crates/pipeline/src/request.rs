use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use dedup::LinkMode;
use extract::EntityNormalizer;
use model::{EntityRecord, LinkError, Result};

/// A raw entity mention as supplied by the caller or found by extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionInput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
}

impl MentionInput {
    pub fn new(name: impl Into<String>, entity_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkRequest {
    #[serde(default)]
    pub entities: Vec<MentionInput>,
    /// Source text for explicit or generative extraction
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub mode: LinkMode,
}

impl LinkRequest {
    pub fn validate(&self) -> Result<()> {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        match self.mode {
            LinkMode::Generative if !has_text => Err(LinkError::Validation(
                "generative mode needs source text".to_string(),
            )),
            LinkMode::Extraction if self.entities.is_empty() && !has_text => Err(LinkError::Validation(
                "request has neither entities nor text".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Collapse mentions that normalize to the same name into one record each,
/// keeping the first spelling seen and the first non-empty type.
pub fn build_records(mentions: &[MentionInput]) -> Vec<EntityRecord> {
    let mut normalizer = EntityNormalizer::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<EntityRecord> = Vec::new();

    for mention in mentions {
        let name = mention.name.trim();
        if name.is_empty() {
            continue;
        }
        let key = normalizer.normalize(name);
        let entity_type = mention
            .entity_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        match slots.get(&key) {
            Some(&slot) => {
                if records[slot].entity_type.is_none() {
                    records[slot].entity_type = entity_type;
                }
            }
            None => {
                slots.insert(key, records.len());
                records.push(EntityRecord::new(name, entity_type));
            }
        }
    }

    records
}
