use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::audit::TierEvent;
use crate::key::generate_entity_id;
use crate::relationship::Relationship;
use crate::result::SourceResult;
use crate::source::{LinkStatus, Source};

/// The unit of work: one mention and everything learned about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub per_source_data: BTreeMap<Source, SourceResult>,
    #[serde(default)]
    pub status_by_source: BTreeMap<Source, LinkStatus>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub audit_trail: Vec<TierEvent>,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, entity_type: Option<String>) -> Self {
        let name = name.into();
        Self {
            id: generate_entity_id(&name),
            name,
            entity_type: entity_type.filter(|t| !t.trim().is_empty()),
            per_source_data: BTreeMap::new(),
            status_by_source: BTreeMap::new(),
            relationships: Vec::new(),
            audit_trail: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn status(&self, source: Source) -> LinkStatus {
        self.status_by_source
            .get(&source)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_linked(&self, source: Source) -> bool {
        self.status(source) == LinkStatus::Linked
    }

    pub fn source_result(&self, source: Source) -> Option<&SourceResult> {
        self.per_source_data.get(&source)
    }

    /// Store a resolution outcome. The status is derived from the result so a
    /// record can only be `linked` when its data meets the minimum-field contract;
    /// partial data is kept and marked `not_linked`.
    pub fn record_resolution(
        &mut self,
        source: Source,
        result: SourceResult,
        language: &str,
    ) -> LinkStatus {
        let status = if result.is_complete(language) {
            LinkStatus::Linked
        } else {
            LinkStatus::NotLinked
        };
        if result == SourceResult::default() {
            self.per_source_data.remove(&source);
        } else {
            self.per_source_data.insert(source, result);
        }
        self.status_by_source.insert(source, status);
        status
    }

    pub fn mark_error(&mut self, source: Source) {
        self.status_by_source.insert(source, LinkStatus::Error);
    }

    /// An identifier for `target` found in another source's already-gathered data.
    pub fn cross_ref_for(&self, target: Source) -> Option<(Source, &str)> {
        self.per_source_data
            .iter()
            .filter(|(source, _)| **source != target)
            .find_map(|(source, data)| {
                data.cross_refs
                    .get(&target)
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|id| (*source, id))
            })
    }

    pub fn attach_relationship(&mut self, relationship: Relationship) {
        if relationship.involves(&self.id) && !self.relationships.contains(&relationship) {
            self.relationships.push(relationship);
        }
    }

    pub fn trail_for(&self, source: Source) -> impl Iterator<Item = &TierEvent> {
        self.audit_trail.iter().filter(move |e| e.source == source)
    }
}
