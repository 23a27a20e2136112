use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use model::{LinkError, Result, Source, SourceResult};

use crate::config::SourceSettings;
use crate::http::{build_client, endpoint_for, get_json};
use crate::knowledge_base::KnowledgeBase;

const DEFAULT_ENDPOINT: &str = "https://{lang}.wikipedia.org/w/api.php";

/// MediaWiki action API client for the Wikipedia language editions.
#[derive(Clone)]
pub struct WikipediaClient {
    endpoint: String,
    client: reqwest::Client,
}

impl WikipediaClient {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        Ok(Self {
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client: build_client(settings.timeout())?,
        })
    }

    async fn query(&self, language: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = endpoint_for(&self.endpoint, language);
        let mut all = vec![("action", "query"), ("format", "json"), ("formatversion", "2")];
        all.extend_from_slice(params);
        get_json(&self.client, &url, &all, "wikipedia").await
    }
}

const PAGE_PROPS: &[(&str, &str)] = &[
    ("prop", "extracts|pageprops|info"),
    ("exintro", "1"),
    ("explaintext", "1"),
    ("exsentences", "3"),
    ("inprop", "url"),
    ("ppprop", "wikibase_item"),
    ("redirects", "1"),
];

#[async_trait]
impl KnowledgeBase for WikipediaClient {
    fn source(&self) -> Source {
        Source::Wikipedia
    }

    async fn search(&self, query: &str, language: &str) -> Result<Option<SourceResult>> {
        let mut params = vec![
            ("generator", "search"),
            ("gsrsearch", query),
            ("gsrlimit", "1"),
        ];
        params.extend_from_slice(PAGE_PROPS);
        let value = self.query(language, &params).await?;
        parse_pages(&value, language)
    }

    async fn lookup(&self, id: &str, language: &str) -> Result<Option<SourceResult>> {
        let title = title_from_id(id);
        let mut params = vec![("titles", title.as_str())];
        params.extend_from_slice(PAGE_PROPS);
        let value = self.query(language, &params).await?;
        parse_pages(&value, language)
    }

    async fn langlink(&self, title: &str, from: &str, to: &str) -> Result<Option<String>> {
        let params = [
            ("titles", title),
            ("prop", "langlinks"),
            ("lllang", to),
            ("redirects", "1"),
        ];
        let value = self.query(from, &params).await?;
        let link = parse_langlink(&value);
        debug!(title, from, to, found = link.is_some(), "Wikipedia langlink lookup");
        Ok(link)
    }
}

/// Accept either a bare title or a full article URL.
fn title_from_id(id: &str) -> String {
    let title = id.rsplit_once("/wiki/").map(|(_, t)| t).unwrap_or(id);
    title.replace('_', " ")
}

/// Parse a `formatversion=2` query response into the first existing page.
pub fn parse_pages(value: &Value, language: &str) -> Result<Option<SourceResult>> {
    let Some(query) = value.get("query") else {
        if value.get("error").is_some() {
            return Err(LinkError::Parse(format!("wikipedia error: {}", value["error"])));
        }
        // A search without hits has no "query" member at all
        return Ok(None);
    };
    let pages = query
        .get("pages")
        .and_then(Value::as_array)
        .ok_or_else(|| LinkError::Parse("wikipedia: missing pages array".to_string()))?;

    let Some(page) = pages
        .iter()
        .filter(|p| p.get("missing").is_none() && p.get("invalid").is_none())
        .min_by_key(|p| p.get("index").and_then(Value::as_i64).unwrap_or(0))
    else {
        return Ok(None);
    };

    let title = page
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| LinkError::Parse("wikipedia: page without title".to_string()))?;

    let url = page
        .get("fullurl")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| {
            format!("https://{}.wikipedia.org/wiki/{}", language, title.replace(' ', "_"))
        });

    let mut result = SourceResult::with_id(url).with_label(language, title);
    if let Some(extract) = page.get("extract").and_then(Value::as_str) {
        let extract = extract.trim();
        if !extract.is_empty() {
            result = result.with_description(language, extract);
        }
    }
    if let Some(item) = page
        .pointer("/pageprops/wikibase_item")
        .and_then(Value::as_str)
    {
        result.cross_refs.insert(Source::Wikidata, item.to_string());
    }
    if language == "en" {
        result
            .cross_refs
            .insert(Source::Dbpedia, title.replace(' ', "_"));
    }
    if let Some(page_id) = page.get("pageid").and_then(Value::as_i64) {
        result
            .external_ids
            .insert(format!("{}wiki_pageid", language), page_id.to_string());
    }

    Ok(Some(result))
}

pub fn parse_langlink(value: &Value) -> Option<String> {
    value
        .pointer("/query/pages")?
        .as_array()?
        .iter()
        .find_map(|page| {
            page.get("langlinks")?
                .as_array()?
                .first()?
                .get("title")?
                .as_str()
                .map(String::from)
        })
        .filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search_page() {
        let value = json!({
            "query": {"pages": [{
                "pageid": 25948,
                "title": "Refraction",
                "index": 1,
                "extract": "In physics, refraction is the redirection of a wave.",
                "fullurl": "https://en.wikipedia.org/wiki/Refraction",
                "pageprops": {"wikibase_item": "Q14620"}
            }]}
        });
        let result = parse_pages(&value, "en").unwrap().unwrap();

        assert_eq!(result.identifier(), Some("https://en.wikipedia.org/wiki/Refraction"));
        assert_eq!(result.label_in("en"), Some("Refraction"));
        assert!(result.is_complete("en"));
        assert_eq!(result.cross_refs.get(&Source::Wikidata).map(String::as_str), Some("Q14620"));
        assert_eq!(result.cross_refs.get(&Source::Dbpedia).map(String::as_str), Some("Refraction"));
        assert_eq!(result.external_ids.get("enwiki_pageid").map(String::as_str), Some("25948"));
    }

    #[test]
    fn test_no_hits_is_none() {
        assert!(parse_pages(&json!({"batchcomplete": true}), "en").unwrap().is_none());
        let missing = json!({"query": {"pages": [{"title": "Nope", "missing": true}]}});
        assert!(parse_pages(&missing, "en").unwrap().is_none());
    }

    #[test]
    fn test_api_error_is_parse_error() {
        let value = json!({"error": {"code": "badvalue"}});
        assert!(matches!(parse_pages(&value, "en"), Err(LinkError::Parse(_))));
    }

    #[test]
    fn test_page_without_extract_is_partial() {
        let value = json!({"query": {"pages": [{"title": "Lichtbrechung", "pageid": 1}]}});
        let result = parse_pages(&value, "de").unwrap().unwrap();
        assert!(!result.is_complete("de"));
        assert_eq!(result.identifier(), Some("https://de.wikipedia.org/wiki/Lichtbrechung"));
        assert!(result.cross_refs.get(&Source::Dbpedia).is_none());
    }

    #[test]
    fn test_parse_langlink() {
        let value = json!({"query": {"pages": [{
            "title": "Lichtbrechung",
            "langlinks": [{"lang": "en", "title": "Refraction"}]
        }]}});
        assert_eq!(parse_langlink(&value), Some("Refraction".to_string()));
        assert_eq!(parse_langlink(&json!({"query": {"pages": [{"title": "X"}]}})), None);
    }

    #[test]
    fn test_title_from_id() {
        assert_eq!(title_from_id("https://en.wikipedia.org/wiki/Speed_of_light"), "Speed of light");
        assert_eq!(title_from_id("Speed of light"), "Speed of light");
    }
}
