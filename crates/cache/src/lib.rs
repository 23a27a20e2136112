pub mod entry;
pub mod store;
pub mod terms;

pub use entry::{CacheEntry, CACHE_VERSION};
pub use store::{default_ttl_days, SourceCache, SourceCacheStats};
pub use terms::{TermCache, TermCacheStats};
