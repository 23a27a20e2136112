use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use model::{normalize_key, LinkStatus, Source, SourceResult};

/// Bumped whenever the on-disk layout of [`CacheEntry`] changes; older entries read as misses.
pub const CACHE_VERSION: u32 = 1;

/// One persisted resolution, stored as `<root>/<source>/<key>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub key: String,
    pub source: Source,
    pub language: String,
    pub status: LinkStatus,
    pub cached_at: DateTime<Utc>,
    pub ttl_days: u64,
    pub result: SourceResult,
}

impl CacheEntry {
    pub fn new(
        name: &str,
        source: Source,
        language: &str,
        ttl_days: u64,
        result: SourceResult,
    ) -> Self {
        Self {
            version: CACHE_VERSION,
            key: normalize_key(name),
            source,
            language: language.to_string(),
            status: LinkStatus::Linked,
            cached_at: Utc::now(),
            ttl_days,
            result,
        }
    }

    /// Whether this entry can be served for `name` on `source`.
    pub fn is_servable(&self, name: &str, source: Source) -> bool {
        self.version == CACHE_VERSION
            && self.source == source
            && self.key == normalize_key(name)
            && self.status == LinkStatus::Linked
            && self.result.is_complete(&self.language)
    }
}
