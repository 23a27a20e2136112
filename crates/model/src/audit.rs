use serde::{Deserialize, Serialize};
use std::fmt;

use crate::source::Source;

/// One strategy within the resolution cascade, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Cache,
    PrimaryLinkage,
    DirectSearch,
    LanguageFallback,
    SynonymFallback,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Cache => "cache",
            Tier::PrimaryLinkage => "primary_linkage",
            Tier::DirectSearch => "direct_search",
            Tier::LanguageFallback => "language_fallback",
            Tier::SynonymFallback => "synonym_fallback",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierOutcome {
    /// The running result is complete after this tier
    Hit,
    /// The tier contributed fields but the result is still incomplete
    Partial,
    Miss,
    /// Transport, timeout or parse failure inside the tier
    Error,
}

impl TierOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierOutcome::Hit => "hit",
            TierOutcome::Partial => "partial",
            TierOutcome::Miss => "miss",
            TierOutcome::Error => "error",
        }
    }
}

impl fmt::Display for TierOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of a single tier attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierEvent {
    pub source: Source,
    pub tier: Tier,
    pub outcome: TierOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TierEvent {
    pub fn new(source: Source, tier: Tier, outcome: TierOutcome) -> Self {
        Self {
            source,
            tier,
            outcome,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for TierEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier, self.outcome)
    }
}
