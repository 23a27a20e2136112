use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use model::{normalize_key, LinkError, Result, Source, SourceResult};

use crate::entry::CacheEntry;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Wikipedia pages change fastest; the structured sources are refreshed less often.
pub fn default_ttl_days(source: Source) -> u64 {
    match source {
        Source::Wikipedia => 7,
        Source::Wikidata | Source::Dbpedia => 14,
    }
}

/// Persisted per-source cache of complete resolutions.
///
/// Writes are idempotent per key, so concurrent writers need no lock: a racing
/// pair leaves either value, and both are validated-complete. The file's
/// modification time is the TTL clock.
pub struct SourceCache {
    root: PathBuf,
    enabled: bool,
    ttl_days: BTreeMap<Source, u64>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    writes: AtomicUsize,
    tmp_counter: AtomicU64,
}

impl SourceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            enabled: true,
            ttl_days: Source::ALL
                .iter()
                .map(|s| (*s, default_ttl_days(*s)))
                .collect(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// A cache that never serves and never writes.
    pub fn disabled() -> Self {
        let mut cache = Self::new(PathBuf::new());
        cache.enabled = false;
        cache
    }

    pub fn with_ttl_days(mut self, source: Source, days: u64) -> Self {
        self.ttl_days.insert(source, days);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl_days(&self, source: Source) -> u64 {
        self.ttl_days
            .get(&source)
            .copied()
            .unwrap_or_else(|| default_ttl_days(source))
    }

    /// `<root>/<source>/<readable-prefix>-<hash>.json`
    pub fn path_for(&self, name: &str, source: Source) -> PathBuf {
        let key = normalize_key(name);
        let readable: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .take(48)
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();

        self.root
            .join(source.as_str())
            .join(format!("{}-{}.json", readable, hex::encode(&digest[..8])))
    }

    pub async fn get(&self, name: &str, source: Source) -> Option<SourceResult> {
        self.get_at(name, source, SystemTime::now()).await
    }

    /// Look up `name` as of `now`. Expired, unreadable, stale-schema or partial
    /// entries are all misses.
    pub async fn get_at(&self, name: &str, source: Source, now: SystemTime) -> Option<SourceResult> {
        if !self.enabled {
            return None;
        }
        let found = self.read_entry(name, source, now).await;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    async fn read_entry(&self, name: &str, source: Source, now: SystemTime) -> Option<SourceResult> {
        let path = self.path_for(name, source);

        let metadata = tokio::fs::metadata(&path).await.ok()?;
        let modified = metadata.modified().ok()?;
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cache file vanished before read");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                return None;
            }
        };

        let ttl_days = entry.ttl_days.min(self.ttl_days(source));
        if age > Duration::from_secs(ttl_days.saturating_mul(SECS_PER_DAY)) {
            debug!(entity = name, %source, age_secs = age.as_secs(), "Cache entry expired");
            return None;
        }
        if !entry.is_servable(name, source) {
            debug!(entity = name, %source, "Cache entry not servable");
            return None;
        }

        Some(entry.result)
    }

    /// Persist a complete resolution. Partial results are refused so an
    /// incomplete lookup never poisons later runs; returns whether a file was written.
    pub async fn put(
        &self,
        name: &str,
        source: Source,
        result: &SourceResult,
        language: &str,
    ) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        if !result.is_complete(language) {
            debug!(entity = name, %source, "Refusing to cache partial result");
            return Ok(false);
        }

        let entry = CacheEntry::new(name, source, language, self.ttl_days(source), result.clone());
        let path = self.path_for(name, source);
        self.write_atomic(&path, &entry).await?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| LinkError::Config(format!("invalid cache path {}", path.display())))?;
        tokio::fs::create_dir_all(parent).await?;

        let json = serde_json::to_string_pretty(value)?;
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), n));

        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub fn stats(&self) -> SourceCacheStats {
        SourceCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCacheStats {
    pub hits: usize,
    pub misses: usize,
    pub writes: usize,
}
