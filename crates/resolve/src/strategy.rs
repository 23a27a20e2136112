//! Cascade tiers. Each tier is a [`Strategy`]; the resolver walks them in
//! order and stops at the first one that leaves the running result complete.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use cache::SourceCache;
use model::{
    normalize_key, EntityRecord, LinkError, MatchedVia, Result, Source, SourceResult, Tier,
};

use crate::knowledge_base::KnowledgeBase;
use crate::translate::{SynonymProvider, Translator};

/// Mutable state threaded through one entity's cascade for one source.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub source: Source,
    pub language: String,
    /// Best result so far; tiers only ever add to it
    pub running: SourceResult,
    /// Searches the translation and synonym tiers may still issue
    pub fallback_budget: usize,
    pub network_calls: usize,
    searched: Vec<String>,
}

impl ResolveContext {
    pub fn new(source: Source, language: &str, fallback_budget: usize) -> Self {
        Self {
            source,
            language: language.to_string(),
            running: SourceResult::default(),
            fallback_budget,
            network_calls: 0,
            searched: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.running.is_complete(&self.language)
    }

    /// Whether folding `candidate` into the running result would complete it.
    pub fn would_complete(&self, candidate: &SourceResult) -> bool {
        let mut probe = self.running.clone();
        probe.merge(candidate.clone());
        probe.is_complete(&self.language)
    }

    pub fn already_searched(&self, query: &str) -> bool {
        self.searched.contains(&normalize_key(query))
    }
}

/// What a tier contributes, and whether the running result is complete with it.
pub type StrategyOutput = (Option<SourceResult>, bool);

#[async_trait]
pub trait Strategy: Send + Sync {
    fn tier(&self) -> Tier;

    /// Tiers drawing on the shared fallback budget.
    fn consumes_budget(&self) -> bool {
        false
    }

    async fn attempt(&self, entity: &EntityRecord, ctx: &mut ResolveContext) -> Result<StrategyOutput>;
}

async fn timed_search(
    kb: &dyn KnowledgeBase,
    query: &str,
    timeout: Duration,
    ctx: &mut ResolveContext,
) -> Result<Option<SourceResult>> {
    ctx.network_calls += 1;
    ctx.searched.push(normalize_key(query));
    match tokio::time::timeout(timeout, kb.search(query, &ctx.language)).await {
        Ok(result) => result,
        Err(_) => Err(LinkError::Timeout(format!(
            "{} search for '{}' after {}s",
            ctx.source,
            query,
            timeout.as_secs()
        ))),
    }
}

fn tag(mut result: SourceResult, tier: Tier, query: &str, language: &str) -> SourceResult {
    result.matched_via = Some(MatchedVia {
        tier,
        query: query.to_string(),
        language: language.to_string(),
    });
    result
}

pub struct CacheTier {
    cache: Arc<SourceCache>,
}

impl CacheTier {
    pub fn new(cache: Arc<SourceCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Strategy for CacheTier {
    fn tier(&self) -> Tier {
        Tier::Cache
    }

    async fn attempt(&self, entity: &EntityRecord, ctx: &mut ResolveContext) -> Result<StrategyOutput> {
        match self.cache.get(&entity.name, ctx.source).await {
            Some(hit) => {
                let complete = ctx.would_complete(&hit);
                Ok((Some(hit), complete))
            }
            None => Ok((None, false)),
        }
    }
}

/// Derive this source's identifier from another source's data for the same entity.
pub struct PrimaryLinkageTier {
    kb: Arc<dyn KnowledgeBase>,
    timeout: Duration,
}

impl PrimaryLinkageTier {
    pub fn new(kb: Arc<dyn KnowledgeBase>, timeout: Duration) -> Self {
        Self { kb, timeout }
    }
}

#[async_trait]
impl Strategy for PrimaryLinkageTier {
    fn tier(&self) -> Tier {
        Tier::PrimaryLinkage
    }

    async fn attempt(&self, entity: &EntityRecord, ctx: &mut ResolveContext) -> Result<StrategyOutput> {
        let Some((from, id)) = entity.cross_ref_for(ctx.source) else {
            return Ok((None, false));
        };
        debug!(entity = %entity.name, from = %from, id, target = %ctx.source, "Following cross-reference");

        ctx.network_calls += 1;
        let found = match tokio::time::timeout(self.timeout, self.kb.lookup(id, &ctx.language)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(LinkError::Timeout(format!(
                    "{} lookup of '{}' after {}s",
                    ctx.source,
                    id,
                    self.timeout.as_secs()
                )))
            }
        };

        Ok(match found {
            Some(result) => {
                let result = tag(result, Tier::PrimaryLinkage, id, &ctx.language);
                let complete = ctx.would_complete(&result);
                (Some(result), complete)
            }
            None => (None, false),
        })
    }
}

pub struct DirectSearchTier {
    kb: Arc<dyn KnowledgeBase>,
    timeout: Duration,
}

impl DirectSearchTier {
    pub fn new(kb: Arc<dyn KnowledgeBase>, timeout: Duration) -> Self {
        Self { kb, timeout }
    }
}

#[async_trait]
impl Strategy for DirectSearchTier {
    fn tier(&self) -> Tier {
        Tier::DirectSearch
    }

    async fn attempt(&self, entity: &EntityRecord, ctx: &mut ResolveContext) -> Result<StrategyOutput> {
        let found = timed_search(self.kb.as_ref(), &entity.name, self.timeout, ctx).await?;
        Ok(match found {
            Some(result) => {
                let result = tag(result, Tier::DirectSearch, &entity.name, &ctx.language);
                let complete = ctx.would_complete(&result);
                (Some(result), complete)
            }
            None => (None, false),
        })
    }
}

/// Budgeted search over several alternative queries, merging partial hits.
struct CandidateRun {
    tier: Tier,
    acc: Option<SourceResult>,
    last_error: Option<LinkError>,
    complete: bool,
}

impl CandidateRun {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            acc: None,
            last_error: None,
            complete: false,
        }
    }

    /// Search one alternative. Returns true once the running result would be complete.
    async fn try_query(
        &mut self,
        kb: &dyn KnowledgeBase,
        query: &str,
        timeout: Duration,
        ctx: &mut ResolveContext,
    ) -> Result<bool> {
        if self.complete || ctx.fallback_budget == 0 || ctx.already_searched(query) {
            return Ok(self.complete);
        }
        ctx.fallback_budget -= 1;

        match timed_search(kb, query, timeout, ctx).await {
            Ok(Some(found)) => {
                let found = tag(found, self.tier, query, &ctx.language);
                let via = found.matched_via.clone();
                let mut merged = match self.acc.take() {
                    Some(mut acc) => {
                        acc.merge(found);
                        acc
                    }
                    None => found,
                };
                if ctx.would_complete(&merged) {
                    merged.matched_via = via;
                    self.complete = true;
                }
                self.acc = Some(merged);
                Ok(self.complete)
            }
            Ok(None) => Ok(false),
            Err(e) if e.is_tier_failure() => {
                debug!(tier = %self.tier, query, error = %e, "Candidate search failed");
                self.last_error = Some(e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn finish(self) -> Result<StrategyOutput> {
        match (self.acc, self.last_error) {
            (None, Some(e)) => Err(e),
            (acc, _) => Ok((acc, self.complete)),
        }
    }
}

/// Translate the name into the target language and search again.
pub struct LanguageFallbackTier {
    kb: Arc<dyn KnowledgeBase>,
    translator: Arc<Translator>,
    languages: Vec<String>,
    timeout: Duration,
}

impl LanguageFallbackTier {
    pub fn new(
        kb: Arc<dyn KnowledgeBase>,
        translator: Arc<Translator>,
        languages: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            kb,
            translator,
            languages,
            timeout,
        }
    }
}

#[async_trait]
impl Strategy for LanguageFallbackTier {
    fn tier(&self) -> Tier {
        Tier::LanguageFallback
    }

    fn consumes_budget(&self) -> bool {
        true
    }

    async fn attempt(&self, entity: &EntityRecord, ctx: &mut ResolveContext) -> Result<StrategyOutput> {
        let mut run = CandidateRun::new(Tier::LanguageFallback);
        let target = ctx.language.clone();
        let mut linked = false;

        for from in self.languages.iter().filter(|l| **l != target) {
            if ctx.fallback_budget == 0 {
                break;
            }
            let Some(translation) = self
                .translator
                .langlink(self.kb.as_ref(), &entity.name, from, &target, self.timeout)
                .await
            else {
                continue;
            };
            linked = true;
            debug!(entity = %entity.name, from = %from, translation = %translation, "Interlanguage link");
            if run.try_query(self.kb.as_ref(), &translation, self.timeout, ctx).await? {
                return run.finish();
            }
        }

        if !linked && ctx.fallback_budget > 0 {
            if let Some(translation) = self.translator.translate_with_llm(&entity.name, &target).await {
                run.try_query(self.kb.as_ref(), &translation, self.timeout, ctx).await?;
            }
        }

        run.finish()
    }
}

/// Search alternate phrasings in order until one completes the result.
pub struct SynonymTier {
    kb: Arc<dyn KnowledgeBase>,
    provider: Arc<SynonymProvider>,
    max_synonyms: usize,
    timeout: Duration,
}

impl SynonymTier {
    pub fn new(
        kb: Arc<dyn KnowledgeBase>,
        provider: Arc<SynonymProvider>,
        max_synonyms: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            kb,
            provider,
            max_synonyms,
            timeout,
        }
    }
}

#[async_trait]
impl Strategy for SynonymTier {
    fn tier(&self) -> Tier {
        Tier::SynonymFallback
    }

    fn consumes_budget(&self) -> bool {
        true
    }

    async fn attempt(&self, entity: &EntityRecord, ctx: &mut ResolveContext) -> Result<StrategyOutput> {
        let synonyms = self
            .provider
            .synonyms(
                &entity.name,
                entity.entity_type.as_deref(),
                &ctx.language,
                self.max_synonyms,
            )
            .await;

        let mut run = CandidateRun::new(Tier::SynonymFallback);
        for synonym in &synonyms {
            if run.try_query(self.kb.as_ref(), synonym, self.timeout, ctx).await? {
                break;
            }
        }
        run.finish()
    }
}
