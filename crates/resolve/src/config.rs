use serde::{Deserialize, Serialize};
use std::time::Duration;

use model::{LinkError, Result, Source, DEFAULT_LANGUAGE};

/// Longest cache lifetime a source may be configured with.
pub const MAX_CACHE_TTL_DAYS: u64 = 3650;

/// Per-source dispatch, timeout and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub enabled: bool,
    /// Entities per dispatch window
    pub batch_size: usize,
    /// Windows initiated per second
    pub rate_limit_per_second: f64,
    pub timeout_secs: u64,
    pub cache_ttl_days: u64,
    /// Overrides the public endpoint; `{lang}` is replaced with the query language
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl SourceSettings {
    pub fn defaults_for(source: Source) -> Self {
        match source {
            Source::Wikipedia => Self {
                enabled: true,
                batch_size: 20,
                rate_limit_per_second: 10.0,
                timeout_secs: 20,
                cache_ttl_days: 7,
                endpoint: None,
            },
            Source::Wikidata => Self {
                enabled: true,
                batch_size: 50,
                rate_limit_per_second: 5.0,
                timeout_secs: 30,
                cache_ttl_days: 14,
                endpoint: None,
            },
            Source::Dbpedia => Self {
                enabled: true,
                batch_size: 10,
                rate_limit_per_second: 2.0,
                timeout_secs: 60,
                cache_ttl_days: 14,
                endpoint: None,
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Minimum gap between the starts of two consecutive windows.
    pub fn window_interval(&self) -> Duration {
        if self.rate_limit_per_second > 0.0 && self.rate_limit_per_second.is_finite() {
            Duration::from_secs_f64(1.0 / self.rate_limit_per_second)
        } else {
            Duration::ZERO
        }
    }

    pub fn validate(&self, source: Source) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LinkError::Config(format!("{}: batch_size must be at least 1", source)));
        }
        if self.timeout_secs == 0 {
            return Err(LinkError::Config(format!("{}: timeout_secs must be at least 1", source)));
        }
        if self.rate_limit_per_second < 0.0 || !self.rate_limit_per_second.is_finite() {
            return Err(LinkError::Config(format!("{}: invalid rate limit", source)));
        }
        if self.cache_ttl_days > MAX_CACHE_TTL_DAYS {
            return Err(LinkError::Config(format!(
                "{}: cache_ttl_days must be at most {}",
                source, MAX_CACHE_TTL_DAYS
            )));
        }
        Ok(())
    }
}

/// Cascade behaviour shared by all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Language a linked record must carry its label and description in
    pub language: String,
    /// Ordered languages tried by the translation tier
    pub fallback_languages: Vec<String>,
    /// Searches the translation and synonym tiers may issue together
    pub max_fallback_attempts: usize,
    pub max_synonyms: usize,
    pub similarity_threshold: f64,
    pub primary_linkage: bool,
    pub language_fallback: bool,
    pub synonym_fallback: bool,
    pub llm_temperature: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            fallback_languages: vec!["de".to_string(), "fr".to_string(), "es".to_string()],
            max_fallback_attempts: 3,
            max_synonyms: 3,
            similarity_threshold: 0.5,
            primary_linkage: true,
            language_fallback: true,
            synonym_fallback: true,
            llm_temperature: 0.0,
        }
    }
}

impl ResolverConfig {
    /// Fallback languages in order, without duplicates and without the target language.
    pub fn effective_fallback_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for lang in &self.fallback_languages {
            let lang = lang.trim().to_lowercase();
            if !lang.is_empty() && lang != self.language && !languages.contains(&lang) {
                languages.push(lang);
            }
        }
        languages
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(LinkError::Config("language must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(LinkError::Config("similarity_threshold must be within [0, 1]".to_string()));
        }
        Ok(())
    }
}
