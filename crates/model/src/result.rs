use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::audit::Tier;
use crate::source::Source;

/// A reference to another record in the same knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    pub fn labeled(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// How a source result was found, kept so later stages can tell a
/// translated or synonym match from a direct one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedVia {
    pub tier: Tier,
    pub query: String,
    pub language: String,
}

/// Which parts of the minimum-field contract a result still lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissingFields {
    pub identifier: bool,
    pub label: bool,
    pub description: bool,
}

impl MissingFields {
    pub fn none(&self) -> bool {
        !self.identifier && !self.label && !self.description
    }
}

/// What one knowledge base knows about an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_or_id: Option<String>,
    /// language -> label
    #[serde(default)]
    pub label: BTreeMap<String, String>,
    /// language -> abstract or short description
    #[serde(default)]
    pub abstract_or_description: BTreeMap<String, String>,
    #[serde(default)]
    pub types: BTreeSet<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub part_of: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub has_part: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inception: Option<String>,
    /// Authority identifiers (VIAF, GND, ...) keyed by scheme
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,
    /// Identifiers of the same entity in the other knowledge bases
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cross_refs: BTreeMap<Source, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_via: Option<MatchedVia>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl SourceResult {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            uri_or_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, language: &str, label: impl Into<String>) -> Self {
        self.label.insert(language.to_string(), label.into());
        self
    }

    pub fn with_description(mut self, language: &str, text: impl Into<String>) -> Self {
        self.abstract_or_description
            .insert(language.to_string(), text.into());
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        non_empty(self.uri_or_id.as_ref())
    }

    pub fn label_in(&self, language: &str) -> Option<&str> {
        non_empty(self.label.get(language))
    }

    pub fn description_in(&self, language: &str) -> Option<&str> {
        non_empty(self.abstract_or_description.get(language))
    }

    pub fn missing_fields(&self, language: &str) -> MissingFields {
        MissingFields {
            identifier: self.identifier().is_none(),
            label: self.label_in(language).is_none(),
            description: self.description_in(language).is_none(),
        }
    }

    /// Minimum-field contract: identifier, label and description in `language`.
    pub fn is_complete(&self, language: &str) -> bool {
        self.missing_fields(language).none()
    }

    pub fn is_empty(&self) -> bool {
        self.identifier().is_none()
            && self.label.values().all(|v| v.trim().is_empty())
            && self.abstract_or_description.values().all(|v| v.trim().is_empty())
    }

    /// Fold `other` into `self`, filling only what is absent here. Existing
    /// fields are never overwritten. Returns true when anything was added.
    pub fn merge(&mut self, other: SourceResult) -> bool {
        let mut changed = false;

        if self.identifier().is_none() {
            if let Some(id) = other.identifier() {
                self.uri_or_id = Some(id.to_string());
                changed = true;
            }
        }

        changed |= merge_localized(&mut self.label, other.label);
        changed |= merge_localized(
            &mut self.abstract_or_description,
            other.abstract_or_description,
        );

        for reference in other.types {
            changed |= self.types.insert(reference);
        }
        changed |= merge_refs(&mut self.part_of, other.part_of);
        changed |= merge_refs(&mut self.has_part, other.has_part);

        if self.coordinates.is_none() && other.coordinates.is_some() {
            self.coordinates = other.coordinates;
            changed = true;
        }
        if self.inception.is_none() && other.inception.is_some() {
            self.inception = other.inception;
            changed = true;
        }
        for (scheme, id) in other.external_ids {
            if !self.external_ids.contains_key(&scheme) {
                self.external_ids.insert(scheme, id);
                changed = true;
            }
        }
        for (source, id) in other.cross_refs {
            if !self.cross_refs.contains_key(&source) {
                self.cross_refs.insert(source, id);
                changed = true;
            }
        }
        if self.matched_via.is_none() {
            self.matched_via = other.matched_via;
        }

        changed
    }
}

fn merge_localized(into: &mut BTreeMap<String, String>, from: BTreeMap<String, String>) -> bool {
    let mut changed = false;
    for (language, text) in from {
        if text.trim().is_empty() {
            continue;
        }
        let slot = into.entry(language).or_default();
        if slot.trim().is_empty() {
            *slot = text;
            changed = true;
        }
    }
    changed
}

fn merge_refs(into: &mut Vec<Reference>, from: Vec<Reference>) -> bool {
    let mut changed = false;
    for reference in from {
        if !into.iter().any(|r| r.id == reference.id) {
            into.push(reference);
            changed = true;
        }
    }
    changed
}
