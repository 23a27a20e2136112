use std::sync::Arc;
use tracing::{debug, warn};

use cache::SourceCache;
use model::{
    EntityRecord, LinkError, LinkStatus, Result, Source, SourceResult, Tier, TierEvent,
    TierOutcome,
};

use crate::config::{ResolverConfig, SourceSettings};
use crate::knowledge_base::KnowledgeBase;
use crate::strategy::{
    CacheTier, DirectSearchTier, LanguageFallbackTier, PrimaryLinkageTier, ResolveContext,
    Strategy, SynonymTier,
};
use crate::translate::{SynonymProvider, Translator};

/// Outcome of one entity's cascade against one source.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub source: Source,
    pub result: SourceResult,
    pub status: LinkStatus,
    pub trail: Vec<TierEvent>,
    pub from_cache: bool,
    pub network_calls: usize,
}

impl Resolution {
    /// Fold this resolution into the record it was computed for.
    pub fn apply_to(self, entity: &mut EntityRecord, language: &str) -> LinkStatus {
        entity.audit_trail.extend(self.trail);
        entity.record_resolution(self.source, self.result, language)
    }
}

/// Runs the tier cascade for a single source.
pub struct Resolver {
    source: Source,
    cache: Arc<SourceCache>,
    strategies: Vec<Box<dyn Strategy>>,
    language: String,
    max_fallback_attempts: usize,
}

impl Resolver {
    pub fn new(
        kb: Arc<dyn KnowledgeBase>,
        cache: Arc<SourceCache>,
        translator: Arc<Translator>,
        synonyms: Arc<SynonymProvider>,
        settings: &SourceSettings,
        config: &ResolverConfig,
    ) -> Self {
        let timeout = settings.timeout();
        let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(CacheTier::new(cache.clone()))];
        if config.primary_linkage {
            strategies.push(Box::new(PrimaryLinkageTier::new(kb.clone(), timeout)));
        }
        strategies.push(Box::new(DirectSearchTier::new(kb.clone(), timeout)));
        if config.language_fallback {
            strategies.push(Box::new(LanguageFallbackTier::new(
                kb.clone(),
                translator,
                config.effective_fallback_languages(),
                timeout,
            )));
        }
        if config.synonym_fallback {
            strategies.push(Box::new(SynonymTier::new(
                kb.clone(),
                synonyms,
                config.max_synonyms,
                timeout,
            )));
        }

        Self::with_strategies(kb.source(), cache, strategies, config)
    }

    pub fn with_strategies(
        source: Source,
        cache: Arc<SourceCache>,
        strategies: Vec<Box<dyn Strategy>>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            source,
            cache,
            strategies,
            language: config.language.clone(),
            max_fallback_attempts: config.max_fallback_attempts,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.strategies.iter().map(|s| s.tier()).collect()
    }

    pub async fn resolve(&self, entity: &EntityRecord) -> Result<Resolution> {
        self.run(entity, 0, Vec::new()).await
    }

    /// Cache tier only. `Some` when the cache alone links the entity.
    pub async fn probe_cache(&self, entity: &EntityRecord) -> Option<Resolution> {
        let first = self.strategies.first()?;
        if first.tier() != Tier::Cache {
            return None;
        }
        let mut ctx = ResolveContext::new(self.source, &self.language, self.max_fallback_attempts);
        match first.attempt(entity, &mut ctx).await {
            Ok((Some(hit), true)) => Some(Resolution {
                source: self.source,
                result: hit,
                status: LinkStatus::Linked,
                trail: vec![TierEvent::new(self.source, Tier::Cache, TierOutcome::Hit)],
                from_cache: true,
                network_calls: 0,
            }),
            _ => None,
        }
    }

    /// The cascade after a cache probe already missed.
    pub async fn resolve_uncached(&self, entity: &EntityRecord) -> Result<Resolution> {
        let has_cache = self.strategies.first().map(|s| s.tier()) == Some(Tier::Cache);
        if !has_cache {
            return self.run(entity, 0, Vec::new()).await;
        }
        let trail = vec![TierEvent::new(self.source, Tier::Cache, TierOutcome::Miss)];
        self.run(entity, 1, trail).await
    }

    async fn run(&self, entity: &EntityRecord, start: usize, mut trail: Vec<TierEvent>) -> Result<Resolution> {
        let mut ctx = ResolveContext::new(self.source, &self.language, self.max_fallback_attempts);
        let mut from_cache = false;

        for strategy in self.strategies.iter().skip(start) {
            let tier = strategy.tier();
            if strategy.consumes_budget() && ctx.fallback_budget == 0 {
                debug!(entity = %entity.name, source = %self.source, tier = %tier, "Fallback budget spent");
                break;
            }

            let event = match strategy.attempt(entity, &mut ctx).await {
                Ok((contribution, _)) => {
                    let mut changed = false;
                    let mut via = None;
                    if let Some(contribution) = contribution {
                        via = contribution.matched_via.clone();
                        if ctx.running == SourceResult::default() {
                            changed = contribution != SourceResult::default();
                            ctx.running = contribution;
                        } else {
                            changed = ctx.running.merge(contribution);
                        }
                    }

                    if ctx.is_complete() {
                        if via.is_some() {
                            ctx.running.matched_via = via;
                        }
                        from_cache = tier == Tier::Cache;
                        TierEvent::new(self.source, tier, TierOutcome::Hit)
                    } else if changed {
                        TierEvent::new(self.source, tier, TierOutcome::Partial)
                    } else {
                        TierEvent::new(self.source, tier, TierOutcome::Miss)
                    }
                }
                Err(e) if e.is_tier_failure() => {
                    warn!(entity = %entity.name, source = %self.source, tier = %tier, error = %e, "Tier failed");
                    TierEvent::new(self.source, tier, TierOutcome::Error).with_detail(e.to_string())
                }
                Err(e) => return Err(e),
            };

            debug!(entity = %entity.name, source = %self.source, transition = %event, "Tier finished");
            let hit = event.outcome == TierOutcome::Hit;
            trail.push(event);
            if hit {
                break;
            }
        }

        let status = if ctx.is_complete() {
            LinkStatus::Linked
        } else {
            let missing = ctx.running.missing_fields(&self.language);
            let reason = LinkError::Exhaustion(format!(
                "{} for '{}' missing identifier={} label={} description={}",
                self.source, entity.name, missing.identifier, missing.label, missing.description
            ));
            debug!(error = %reason, "Cascade exhausted");
            LinkStatus::NotLinked
        };

        if status == LinkStatus::Linked && !from_cache {
            if let Err(e) = self
                .cache
                .put(&entity.name, self.source, &ctx.running, &self.language)
                .await
            {
                warn!(entity = %entity.name, source = %self.source, error = %e, "Cache write failed");
            }
        }

        Ok(Resolution {
            source: self.source,
            result: ctx.running,
            status,
            trail,
            from_cache,
            network_calls: ctx.network_calls,
        })
    }
}
