use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use model::{EntityRecord, LinkStatus, Source, Tier, TierOutcome};

use crate::config::SourceSettings;
use crate::resolver::{Resolution, Resolver};
use crate::similarity::cluster_by_similarity;

/// Counters for one source's pass over a batch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub source: Source,
    /// Already linked for this source before the pass
    pub skipped: usize,
    pub cache_hits: usize,
    pub linked: usize,
    pub not_linked: usize,
    pub errors: usize,
    pub windows: usize,
    pub network_calls: usize,
    /// Which tier completed each linked entity
    pub tier_hits: BTreeMap<Tier, usize>,
}

impl DispatchReport {
    fn new(source: Source) -> Self {
        Self {
            source,
            skipped: 0,
            cache_hits: 0,
            linked: 0,
            not_linked: 0,
            errors: 0,
            windows: 0,
            network_calls: 0,
            tier_hits: BTreeMap::new(),
        }
    }

    fn record(&mut self, resolution: &Resolution) {
        match resolution.status {
            LinkStatus::Linked => self.linked += 1,
            LinkStatus::NotLinked => self.not_linked += 1,
            LinkStatus::Error => self.errors += 1,
            LinkStatus::NotAttempted => {}
        }
        if resolution.from_cache {
            self.cache_hits += 1;
        }
        self.network_calls += resolution.network_calls;
        for event in resolution.trail.iter().filter(|e| e.outcome == TierOutcome::Hit) {
            *self.tier_hits.entry(event.tier).or_default() += 1;
        }
    }
}

/// Drives one source's resolver over a batch: cache pre-pass, similarity
/// windows, concurrent resolution inside a window, rate-limited window starts.
pub struct BatchDispatcher {
    resolver: Arc<Resolver>,
    settings: SourceSettings,
    similarity_threshold: f64,
}

impl BatchDispatcher {
    pub fn new(resolver: Arc<Resolver>, settings: SourceSettings, similarity_threshold: f64) -> Self {
        Self {
            resolver,
            settings,
            similarity_threshold,
        }
    }

    pub fn source(&self) -> Source {
        self.resolver.source()
    }

    pub async fn process(&self, entities: &mut [EntityRecord]) -> DispatchReport {
        let source = self.resolver.source();
        let language = self.resolver.language().to_string();
        let mut report = DispatchReport::new(source);

        let mut pending = Vec::new();
        for (index, entity) in entities.iter().enumerate() {
            if entity.is_linked(source) {
                report.skipped += 1;
            } else {
                pending.push(index);
            }
        }

        let mut misses = Vec::new();
        for index in pending {
            match self.resolver.probe_cache(&entities[index]).await {
                Some(resolution) => {
                    report.record(&resolution);
                    resolution.apply_to(&mut entities[index], &language);
                }
                None => misses.push(index),
            }
        }
        debug!(%source, cache_hits = report.cache_hits, misses = misses.len(), "Cache pre-pass done");

        let batch_size = self.settings.batch_size.max(1);
        let windows: Vec<Vec<usize>> = cluster_by_similarity(entities, &misses, self.similarity_threshold)
            .into_iter()
            .flat_map(|cluster| cluster.chunks(batch_size).map(<[usize]>::to_vec).collect::<Vec<_>>())
            .collect();

        let interval = self.settings.window_interval();
        let mut last_start: Option<Instant> = None;

        for window in windows {
            if let Some(previous) = last_start {
                tokio::time::sleep_until(previous + interval).await;
            }
            last_start = Some(Instant::now());
            report.windows += 1;

            let handles = window.iter().map(|&index| {
                let resolver = self.resolver.clone();
                let entity = entities[index].clone();
                tokio::spawn(async move { resolver.resolve_uncached(&entity).await })
            });
            let results = join_all(handles).await;

            for (&index, joined) in window.iter().zip(results) {
                let entity = &mut entities[index];
                match joined {
                    Ok(Ok(resolution)) => {
                        report.record(&resolution);
                        resolution.apply_to(entity, &language);
                    }
                    Ok(Err(e)) => {
                        warn!(entity = %entity.name, %source, error = %e, "Resolution failed");
                        entity.mark_error(source);
                        report.errors += 1;
                    }
                    Err(e) => {
                        warn!(entity = %entity.name, %source, error = %e, "Resolution task aborted");
                        entity.mark_error(source);
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            %source,
            linked = report.linked,
            not_linked = report.not_linked,
            errors = report.errors,
            cache_hits = report.cache_hits,
            windows = report.windows,
            "Source pass complete"
        );
        report
    }
}
