use async_trait::async_trait;

use model::{Result, Source, SourceResult};

/// Fetcher for one knowledge base.
///
/// Non-2xx responses, malformed payloads and timeouts all surface as tier
/// failures (`Transport`, `Parse`, `Timeout`); the cascade absorbs them.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    fn source(&self) -> Source;

    /// Native search with a free-text query, best hit only.
    async fn search(&self, query: &str, language: &str) -> Result<Option<SourceResult>>;

    /// Fetch by an identifier taken from another source's cross-references.
    async fn lookup(&self, id: &str, language: &str) -> Result<Option<SourceResult>>;

    /// Title of `title` (written in `from`) in language `to`, if the source knows one.
    async fn langlink(&self, _title: &str, _from: &str, _to: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
