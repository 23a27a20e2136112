use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use model::Source;
use pipeline::PipelineConfig;
use resolve::{ResolverConfig, SourceSettings};

pub const CONFIG_ENV: &str = "ENTITY_LINKER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineSection,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,      // Cache and direct search only, no LLM-backed tiers
    Accurate,  // Every tier, semantic dedup, longer timeouts
    Balanced,  // Default
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is unset
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    #[serde(flatten)]
    pub resolver: ResolverConfig,
    pub semantic_dedup: bool,
    pub implicit_relations: bool,
}

/// Per-source overrides; anything unset keeps that source's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub enabled: Option<bool>,
    pub batch_size: Option<usize>,
    pub rate_limit_per_second: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub cache_ttl_days: Option<u64>,
    pub endpoint: Option<String>,
}

impl SourceSection {
    pub fn apply(&self, source: Source) -> SourceSettings {
        let defaults = SourceSettings::defaults_for(source);
        SourceSettings {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            rate_limit_per_second: self.rate_limit_per_second.unwrap_or(defaults.rate_limit_per_second),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            cache_ttl_days: self.cache_ttl_days.unwrap_or(defaults.cache_ttl_days),
            endpoint: self.endpoint.clone().or(defaults.endpoint),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub wikipedia: SourceSection,
    pub wikidata: SourceSection,
    pub dbpedia: SourceSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            pipeline: PipelineSection::default(),
            sources: SourcesConfig::default(),
            cache: CacheConfig::default(),
            llm: LlmConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            semantic_dedup: true,
            implicit_relations: true,
        }
    }
}

impl SourcesConfig {
    pub fn section(&self, source: Source) -> &SourceSection {
        match source {
            Source::Wikipedia => &self.wikipedia,
            Source::Wikidata => &self.wikidata,
            Source::Dbpedia => &self.dbpedia,
        }
    }

    fn section_mut(&mut self, source: Source) -> &mut SourceSection {
        match source {
            Source::Wikipedia => &mut self.wikipedia,
            Source::Wikidata => &mut self.wikidata,
            Source::Dbpedia => &mut self.dbpedia,
        }
    }

    /// Effective settings for every source, defaults filled in.
    pub fn resolved(&self) -> Vec<(Source, SourceSettings)> {
        Source::ALL
            .iter()
            .map(|source| (*source, self.section(*source).apply(*source)))
            .collect()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(".cache/entity-linker"),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        }
    }
}

impl AppConfig {
    /// Read the file named by `ENTITY_LINKER_CONFIG`, or `config.toml`.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(Path::new(&path))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse TOML on top of the preset its `mode` names; explicit values win.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let overlay: toml::Table = toml::from_str(raw).context("Failed to parse TOML")?;
        let mode = match overlay.get("mode") {
            Some(value) => value
                .clone()
                .try_into::<OperationMode>()
                .context("Unknown mode")?,
            None => OperationMode::Balanced,
        };

        let base = toml::Value::try_from(Self::preset(mode)).context("Failed to encode preset")?;
        let mut merged = match base {
            toml::Value::Table(table) => table,
            _ => bail!("Preset did not encode as a table"),
        };
        merge_tables(&mut merged, overlay);

        toml::Value::Table(merged)
            .try_into()
            .context("Failed to apply config")
    }

    pub fn preset(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    pub fn fast_mode() -> Self {
        let mut config = Self {
            mode: OperationMode::Fast,
            ..Self::default()
        };
        config.pipeline.resolver.language_fallback = false;
        config.pipeline.resolver.synonym_fallback = false;
        config.pipeline.semantic_dedup = false;
        config.pipeline.implicit_relations = false;
        config.retry = RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 500,
            max_backoff_ms: 2000,
        };
        config
    }

    pub fn accurate_mode() -> Self {
        let mut config = Self {
            mode: OperationMode::Accurate,
            ..Self::default()
        };
        config.pipeline.resolver.max_fallback_attempts = 6;
        config.pipeline.resolver.max_synonyms = 5;
        for source in Source::ALL {
            let timeout = SourceSettings::defaults_for(source).timeout_secs * 2;
            config.sources.section_mut(source).timeout_secs = Some(timeout);
        }
        config.retry = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 2000,
            max_backoff_ms: 20000,
        };
        config
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .resolver
            .validate()
            .context("Invalid [pipeline] section")?;

        let sources = self.sources.resolved();
        for (source, settings) in &sources {
            if settings.enabled {
                settings
                    .validate(*source)
                    .with_context(|| format!("Invalid [sources.{}] section", source))?;
            }
        }
        if sources.iter().all(|(_, s)| !s.enabled) {
            bail!("At least one source must be enabled");
        }
        if self.llm.enabled && self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url is required when the LLM is enabled");
        }
        Ok(())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let extractor = extract::ExtractorConfig {
            temperature: self.llm.temperature,
            model: Some(self.llm.model.clone()),
            ..extract::ExtractorConfig::default()
        };

        PipelineConfig {
            resolver: self.pipeline.resolver.clone(),
            sources: self.sources.resolved().into_iter().collect(),
            cache_dir: self.cache.enabled.then(|| self.cache.directory.clone()),
            semantic_dedup: self.pipeline.semantic_dedup,
            implicit_relations: self.pipeline.implicit_relations,
            extractor,
        }
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
