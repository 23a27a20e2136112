use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a relationship was stated in the text or inferred from general knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Explicit,
    Implicit,
}

impl Provenance {
    /// Explicit assertions win over inferred ones on the same triple.
    pub fn outranks(&self, other: &Provenance) -> bool {
        matches!((self, other), (Provenance::Explicit, Provenance::Implicit))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Explicit => "explicit",
            Provenance::Implicit => "implicit",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub subject_id: String,
    pub predicate: String,
    pub object_id: String,
    pub provenance: Provenance,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
}

impl Relationship {
    pub fn new(
        subject_id: impl Into<String>,
        predicate: &str,
        object_id: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            predicate: normalize_predicate(predicate),
            object_id: object_id.into(),
            provenance,
            confidence: 1.0,
            evidence: None,
            subject_type: None,
            object_type: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        let evidence = evidence.into();
        if !evidence.trim().is_empty() {
            self.evidence = Some(evidence);
        }
        self
    }

    pub fn with_types(mut self, subject_type: Option<String>, object_type: Option<String>) -> Self {
        self.subject_type = subject_type;
        self.object_type = object_type;
        self
    }

    /// Exact-duplicate key
    pub fn triple_key(&self) -> (String, String, String) {
        (
            self.subject_id.clone(),
            self.predicate.clone(),
            self.object_id.clone(),
        )
    }

    /// Unordered entity pair, used to group candidate semantic duplicates.
    pub fn pair_key(&self) -> (String, String) {
        if self.subject_id <= self.object_id {
            (self.subject_id.clone(), self.object_id.clone())
        } else {
            (self.object_id.clone(), self.subject_id.clone())
        }
    }

    pub fn involves(&self, entity_id: &str) -> bool {
        self.subject_id == entity_id || self.object_id == entity_id
    }
}

/// Lower-case the predicate and turn `snake_case` / `kebab-case` into a spaced verb phrase.
pub fn normalize_predicate(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
