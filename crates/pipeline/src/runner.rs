use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use cache::{SourceCache, SourceCacheStats, TermCache, TermCacheStats};
use dedup::{DedupConfig, Deduplicator, LinkMode};
use extract::{ExtractorConfig, LanguageModel, RelationshipExtractor};
use model::{EntityRecord, LinkError, Provenance, Relationship, Result, Source};
use resolve::{
    knowledge_base_for, BatchDispatcher, KnowledgeBase, Resolver, ResolverConfig, SourceSettings,
    SynonymProvider, Translator,
};

use crate::output::{LinkingResult, RunStatistics};
use crate::request::{build_records, LinkRequest, MentionInput};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub resolver: ResolverConfig,
    pub sources: BTreeMap<Source, SourceSettings>,
    /// Persisted cache root; `None` disables the cache
    pub cache_dir: Option<PathBuf>,
    pub semantic_dedup: bool,
    pub implicit_relations: bool,
    pub extractor: ExtractorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            sources: Source::ALL
                .iter()
                .map(|s| (*s, SourceSettings::defaults_for(*s)))
                .collect(),
            cache_dir: Some(PathBuf::from(".cache/entity-linker")),
            semantic_dedup: true,
            implicit_relations: true,
            extractor: ExtractorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.resolver.validate()?;
        for (source, settings) in &self.sources {
            if settings.enabled {
                settings.validate(*source)?;
            }
        }
        Ok(())
    }

    fn settings_for(&self, source: Source) -> SourceSettings {
        self.sources
            .get(&source)
            .cloned()
            .unwrap_or_else(|| SourceSettings::defaults_for(source))
    }
}

/// Mentions in, linked entities and deduplicated relationships out.
pub struct Pipeline {
    config: PipelineConfig,
    llm: Option<Arc<dyn LanguageModel>>,
    cache: Arc<SourceCache>,
    terms: TermCache,
    dispatchers: Vec<BatchDispatcher>,
    extractor: Option<RelationshipExtractor>,
}

impl Pipeline {
    /// Build with HTTP clients for every enabled source.
    pub fn new(config: PipelineConfig, llm: Option<Arc<dyn LanguageModel>>) -> Result<Self> {
        let mut knowledge_bases = Vec::new();
        for (source, settings) in &config.sources {
            if settings.enabled {
                knowledge_bases.push(knowledge_base_for(*source, settings)?);
            }
        }
        Self::with_knowledge_bases(config, llm, knowledge_bases)
    }

    pub fn with_knowledge_bases(
        config: PipelineConfig,
        llm: Option<Arc<dyn LanguageModel>>,
        mut knowledge_bases: Vec<Arc<dyn KnowledgeBase>>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = match &config.cache_dir {
            Some(dir) => Source::ALL.iter().fold(SourceCache::new(dir), |cache, source| {
                cache.with_ttl_days(*source, config.settings_for(*source).cache_ttl_days)
            }),
            None => SourceCache::disabled(),
        };
        let cache = Arc::new(cache);

        let terms = TermCache::new();
        let temperature = config.resolver.llm_temperature;
        let translator = Arc::new(Translator::new(llm.clone(), terms.clone(), temperature));
        let synonyms = Arc::new(SynonymProvider::new(llm.clone(), terms.clone(), temperature));

        // Earlier sources feed cross-references to later ones
        knowledge_bases.sort_by_key(|kb| kb.source());
        let dispatchers = knowledge_bases
            .into_iter()
            .map(|kb| {
                let settings = config.settings_for(kb.source());
                let resolver = Resolver::new(
                    kb,
                    cache.clone(),
                    translator.clone(),
                    synonyms.clone(),
                    &settings,
                    &config.resolver,
                );
                BatchDispatcher::new(Arc::new(resolver), settings, config.resolver.similarity_threshold)
            })
            .collect();

        let extractor = llm
            .clone()
            .map(|llm| RelationshipExtractor::new(llm, config.extractor.clone()));

        Ok(Self {
            config,
            llm,
            cache,
            terms,
            dispatchers,
            extractor,
        })
    }

    pub fn sources(&self) -> Vec<Source> {
        self.dispatchers.iter().map(|d| d.source()).collect()
    }

    pub fn cache_stats(&self) -> SourceCacheStats {
        self.cache.stats()
    }

    pub fn term_cache_stats(&self) -> TermCacheStats {
        self.terms.stats()
    }

    pub async fn run(&self, request: LinkRequest) -> Result<LinkingResult> {
        request.validate()?;
        let started = Instant::now();
        let mut stats = RunStatistics::new(Uuid::new_v4().to_string(), request.mode, Utc::now());
        let text = request.text.clone().unwrap_or_default();
        let mut mentions = request.entities;

        let mut generated = Vec::new();
        if request.mode == LinkMode::Generative {
            let extractor = self.extractor.as_ref().ok_or_else(|| {
                LinkError::Config("generative mode needs a language model".to_string())
            })?;
            let extraction = extractor.extract_generative(&text).await?;
            mentions.extend(
                extraction
                    .entities
                    .into_iter()
                    .map(|e| MentionInput::new(e.name, e.entity_type.as_deref())),
            );
            generated = extraction.relationships;
        }

        stats.mentions = mentions.len();
        let mut records = build_records(&mentions);
        stats.entities = records.len();
        info!(run_id = %stats.run_id, mode = ?request.mode, entities = records.len(), "Linking run started");

        for dispatcher in &self.dispatchers {
            let report = dispatcher.process(&mut records).await;
            stats.record_source(report);
        }
        stats.linked = records
            .iter()
            .filter(|r| r.status_by_source.keys().any(|s| r.is_linked(*s)))
            .count();

        let relationships = match (&self.extractor, request.mode) {
            (Some(extractor), LinkMode::Generative) => {
                let relationships = extractor.to_relationships(generated, &records, Provenance::Explicit);
                stats.relationships.generated = relationships.len();
                relationships
            }
            (Some(extractor), LinkMode::Extraction) => {
                self.extract_relationships(extractor, &text, &records, &mut stats).await
            }
            (None, _) => Vec::new(),
        };

        let deduplicator = Deduplicator::new(
            self.llm.clone(),
            DedupConfig {
                semantic: self.config.semantic_dedup,
                mode: request.mode,
                temperature: self.config.extractor.temperature,
            },
        );
        let (relationships, dedup_stats) = deduplicator.deduplicate(relationships, &records).await;
        stats.relationships.dedup = dedup_stats;

        for relationship in &relationships {
            for record in records.iter_mut().filter(|r| relationship.involves(&r.id)) {
                record.attach_relationship(relationship.clone());
            }
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %stats.run_id,
            linked = stats.linked,
            relationships = relationships.len(),
            elapsed_ms = stats.elapsed_ms,
            "Linking run finished"
        );
        Ok(LinkingResult::new(records, &relationships, stats))
    }

    async fn extract_relationships(
        &self,
        extractor: &RelationshipExtractor,
        text: &str,
        records: &[EntityRecord],
        stats: &mut RunStatistics,
    ) -> Vec<Relationship> {
        let mut relationships = Vec::new();

        if !text.trim().is_empty() {
            match extractor.extract_explicit(text, records).await {
                Ok(explicit) => {
                    stats.relationships.explicit = explicit.len();
                    relationships.extend(explicit);
                }
                Err(e) => {
                    warn!(error = %e, "Explicit extraction failed");
                    stats.relationships.extraction_failures += 1;
                }
            }
        }

        if self.config.implicit_relations {
            match extractor.infer_implicit(records).await {
                Ok(implicit) => {
                    stats.relationships.implicit = implicit.len();
                    relationships.extend(implicit);
                }
                Err(e) => {
                    warn!(error = %e, "Implicit inference failed");
                    stats.relationships.extraction_failures += 1;
                }
            }
        }

        relationships
    }
}
