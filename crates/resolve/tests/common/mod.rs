#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use cache::{SourceCache, TermCache};
use extract::{CompletionRequest, LanguageModel};
use model::{normalize_key, LinkError, Result, Source, SourceResult};
use resolve::{KnowledgeBase, Resolver, ResolverConfig, SourceSettings, SynonymProvider, Translator};

pub fn complete(id: &str, label: &str, description: &str) -> SourceResult {
    SourceResult::with_id(id)
        .with_label("en", label)
        .with_description("en", description)
}

/// In-memory knowledge base keyed on normalized query text.
#[derive(Default)]
pub struct FakeKb {
    pub searches: HashMap<String, SourceResult>,
    pub lookups: HashMap<String, SourceResult>,
    /// (title, from) -> title in the target language
    pub langlinks: HashMap<(String, String), String>,
    pub failing: HashMap<String, LinkError>,
    pub panicking: Vec<String>,
    pub slow: HashMap<String, Duration>,
    pub search_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub search_log: Mutex<Vec<(String, Instant)>>,
}

impl FakeKb {
    pub fn with_search(mut self, query: &str, result: SourceResult) -> Self {
        self.searches.insert(normalize_key(query), result);
        self
    }

    pub fn with_lookup(mut self, id: &str, result: SourceResult) -> Self {
        self.lookups.insert(id.to_string(), result);
        self
    }

    pub fn with_langlink(mut self, title: &str, from: &str, translated: &str) -> Self {
        self.langlinks
            .insert((title.to_string(), from.to_string()), translated.to_string());
        self
    }

    pub fn failing_on(mut self, query: &str, error: LinkError) -> Self {
        self.failing.insert(normalize_key(query), error);
        self
    }

    pub fn panicking_on(mut self, query: &str) -> Self {
        self.panicking.push(normalize_key(query));
        self
    }

    pub fn sleeping_on(mut self, query: &str, delay: Duration) -> Self {
        self.slow.insert(normalize_key(query), delay);
        self
    }

    pub fn searches_made(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn lookups_made(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn searched_queries(&self) -> Vec<String> {
        self.search_log.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }
}

#[async_trait]
impl KnowledgeBase for FakeKb {
    fn source(&self) -> Source {
        Source::Wikipedia
    }

    async fn search(&self, query: &str, _language: &str) -> Result<Option<SourceResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.search_log
            .lock()
            .unwrap()
            .push((query.to_string(), Instant::now()));
        let key = normalize_key(query);
        if self.panicking.contains(&key) {
            panic!("knowledge base blew up on {query}");
        }
        if let Some(delay) = self.slow.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.failing.get(&key) {
            return Err(match error {
                LinkError::Transport(m) => LinkError::Transport(m.clone()),
                LinkError::Timeout(m) => LinkError::Timeout(m.clone()),
                LinkError::Parse(m) => LinkError::Parse(m.clone()),
                other => LinkError::Validation(other.to_string()),
            });
        }
        Ok(self.searches.get(&key).cloned())
    }

    async fn lookup(&self, id: &str, _language: &str) -> Result<Option<SourceResult>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookups.get(id).cloned())
    }

    async fn langlink(&self, title: &str, from: &str, _to: &str) -> Result<Option<String>> {
        Ok(self
            .langlinks
            .get(&(title.to_string(), from.to_string()))
            .cloned())
    }
}

/// Language model that always answers with the same text.
pub struct CannedLlm {
    pub reply: String,
    pub calls: AtomicUsize,
}

impl CannedLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LanguageModel for CannedLlm {
    async fn complete(&self, _request: &CompletionRequest) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(self.reply.clone())
    }
}

pub fn resolver(
    kb: Arc<FakeKb>,
    cache: Arc<SourceCache>,
    synonym_llm: Option<Arc<dyn LanguageModel>>,
    config: &ResolverConfig,
) -> Resolver {
    let terms = TermCache::new();
    let translator = Arc::new(Translator::new(None, terms.clone(), 0.0));
    let synonyms = Arc::new(SynonymProvider::new(synonym_llm, terms, 0.0));
    Resolver::new(
        kb,
        cache,
        translator,
        synonyms,
        &SourceSettings::defaults_for(Source::Wikipedia),
        config,
    )
}
