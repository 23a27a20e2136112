pub mod config;
pub mod dbpedia;
pub mod dispatcher;
mod http;
pub mod knowledge_base;
pub mod resolver;
pub mod similarity;
pub mod strategy;
pub mod translate;
pub mod wikidata;
pub mod wikipedia;

pub use config::{ResolverConfig, SourceSettings};
pub use dbpedia::DbpediaClient;
pub use dispatcher::{BatchDispatcher, DispatchReport};
pub use knowledge_base::KnowledgeBase;
pub use resolver::{Resolution, Resolver};
pub use similarity::{cluster_by_similarity, similarity};
pub use strategy::{ResolveContext, Strategy};
pub use translate::{SynonymProvider, Translator};
pub use wikidata::WikidataClient;
pub use wikipedia::WikipediaClient;

use model::{Result, Source};
use std::sync::Arc;

/// Build the HTTP client for `source` from its settings.
pub fn knowledge_base_for(source: Source, settings: &SourceSettings) -> Result<Arc<dyn KnowledgeBase>> {
    let client: Arc<dyn KnowledgeBase> = match source {
        Source::Wikipedia => Arc::new(WikipediaClient::new(settings)?),
        Source::Wikidata => Arc::new(WikidataClient::new(settings)?),
        Source::Dbpedia => Arc::new(DbpediaClient::new(settings)?),
    };
    Ok(client)
}
