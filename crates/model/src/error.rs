use thiserror::Error;

/// Failures raised while linking entities and reconciling relationships.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Network or HTTP failure talking to a knowledge base or the LLM
    #[error("Transport error: {0}")]
    Transport(String),

    /// A network call exceeded its per-source timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Malformed payload from a knowledge base
    #[error("Parse error: {0}")]
    Parse(String),

    /// A record failed its minimum-field contract
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every fallback tier was spent without a complete result
    #[error("Fallback tiers exhausted: {0}")]
    Exhaustion(String),

    /// Invalid or missing configuration; fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// Errors the fallback cascade absorbs by moving on to the next tier.
    pub fn is_tier_failure(&self) -> bool {
        matches!(
            self,
            LinkError::Transport(_) | LinkError::Timeout(_) | LinkError::Parse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
