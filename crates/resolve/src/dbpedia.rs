use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use model::{GeoPoint, LinkError, Reference, Result, Source, SourceResult};

use crate::config::SourceSettings;
use crate::http::{build_client, get_json};
use crate::knowledge_base::KnowledgeBase;

const DEFAULT_LOOKUP: &str = "https://lookup.dbpedia.org/api/search";
const DEFAULT_DATA: &str = "https://dbpedia.org/data";
const RESOURCE_PREFIX: &str = "http://dbpedia.org/resource/";

const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
const DBO_ABSTRACT: &str = "http://dbpedia.org/ontology/abstract";
const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
const PRIMARY_TOPIC_OF: &str = "http://xmlns.com/foaf/0.1/isPrimaryTopicOf";
const GEO_LAT: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#lat";
const GEO_LONG: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#long";
const DBO_PREFIX: &str = "http://dbpedia.org/ontology/";
const WIKIDATA_PREFIX: &str = "http://www.wikidata.org/entity/";

/// DBpedia Lookup for search, resource JSON documents for records.
#[derive(Clone)]
pub struct DbpediaClient {
    lookup_url: String,
    data_url: String,
    client: reqwest::Client,
}

impl DbpediaClient {
    /// A configured endpoint replaces the lookup URL, and resource documents
    /// are then fetched from `<endpoint-host>/data`.
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        let (lookup_url, data_url) = match settings.endpoint.as_deref() {
            Some(endpoint) => (endpoint.to_string(), data_url_for(endpoint)),
            None => (DEFAULT_LOOKUP.to_string(), DEFAULT_DATA.to_string()),
        };
        Ok(Self {
            lookup_url,
            data_url,
            client: build_client(settings.timeout())?,
        })
    }
}

#[async_trait]
impl KnowledgeBase for DbpediaClient {
    fn source(&self) -> Source {
        Source::Dbpedia
    }

    async fn search(&self, query: &str, language: &str) -> Result<Option<SourceResult>> {
        let params = [("query", query), ("maxResults", "1"), ("format", "JSON")];
        let value = get_json(&self.client, &self.lookup_url, &params, "dbpedia lookup").await?;
        let Some(hit) = parse_lookup_hit(&value, language)? else {
            return Ok(None);
        };

        let Some(name) = hit.identifier().map(resource_name) else {
            return Ok(Some(hit));
        };
        // The lookup index only carries a short comment; the resource document has the abstract.
        match self.lookup(&name, language).await {
            Ok(Some(mut full)) => {
                full.merge(hit);
                Ok(Some(full))
            }
            Ok(None) => Ok(Some(hit)),
            Err(e) => {
                debug!(resource = %name, error = %e, "Falling back to lookup hit");
                Ok(Some(hit))
            }
        }
    }

    async fn lookup(&self, id: &str, language: &str) -> Result<Option<SourceResult>> {
        let name = resource_name(id);
        let url = format!("{}/{}.json", self.data_url, name);
        let value = get_json(&self.client, &url, &[], "dbpedia resource").await?;
        parse_resource(&value, &name, language)
    }
}

/// `http://localhost:8080/api/search` -> `http://localhost:8080/data`
fn data_url_for(endpoint: &str) -> String {
    let origin = match endpoint.find("://") {
        Some(scheme_end) => {
            let host_start = scheme_end + 3;
            match endpoint[host_start..].find('/') {
                Some(path_start) => &endpoint[..host_start + path_start],
                None => endpoint,
            }
        }
        None => endpoint.split('/').next().unwrap_or(endpoint),
    };
    format!("{}/data", origin.trim_end_matches('/'))
}

/// `http://dbpedia.org/resource/Speed_of_light` or `Speed of light` -> `Speed_of_light`
fn resource_name(id: &str) -> String {
    id.trim_start_matches(RESOURCE_PREFIX)
        .trim()
        .replace(' ', "_")
}

/// Lookup marks matched terms with `<B>` tags.
fn strip_highlight(text: &str) -> String {
    text.replace("<B>", "").replace("</B>", "").trim().to_string()
}

fn first_string(doc: &Value, field: &str) -> Option<String> {
    doc.get(field)?
        .as_array()?
        .first()?
        .as_str()
        .map(strip_highlight)
        .filter(|s| !s.is_empty())
}

pub fn parse_lookup_hit(value: &Value, language: &str) -> Result<Option<SourceResult>> {
    let docs = value
        .get("docs")
        .and_then(Value::as_array)
        .ok_or_else(|| LinkError::Parse("dbpedia lookup: missing docs array".to_string()))?;
    let Some(doc) = docs.first() else {
        return Ok(None);
    };
    let Some(resource) = first_string(doc, "resource") else {
        return Ok(None);
    };

    let mut result = SourceResult::with_id(resource);
    if let Some(label) = first_string(doc, "label") {
        result = result.with_label(language, label);
    }
    if let Some(comment) = first_string(doc, "comment") {
        result = result.with_description(language, comment);
    }
    Ok(Some(result))
}

/// Parse a `/data/<Name>.json` resource document.
pub fn parse_resource(value: &Value, name: &str, language: &str) -> Result<Option<SourceResult>> {
    let document = value
        .as_object()
        .ok_or_else(|| LinkError::Parse("dbpedia resource: not an object".to_string()))?;
    let uri = format!("{}{}", RESOURCE_PREFIX, name);
    let Some(subject) = document.get(&uri) else {
        return Ok(None);
    };

    let mut result = SourceResult::with_id(uri.clone());
    if let Some(label) = literal(subject, RDFS_LABEL, language) {
        result = result.with_label(language, label);
    }
    if let Some(text) = literal(subject, DBO_ABSTRACT, language).or_else(|| literal(subject, RDFS_COMMENT, language)) {
        result = result.with_description(language, text);
    }

    for type_uri in uris(subject, RDF_TYPE) {
        if let Some(class) = type_uri.strip_prefix(DBO_PREFIX) {
            result.types.insert(Reference::labeled(type_uri, class));
        }
    }
    if let Some(wikidata) = uris(subject, OWL_SAME_AS).find_map(|u| u.strip_prefix(WIKIDATA_PREFIX)) {
        result.cross_refs.insert(Source::Wikidata, wikidata.to_string());
    }
    if let Some(title) = uris(subject, PRIMARY_TOPIC_OF).find_map(|u| u.rsplit_once("/wiki/").map(|(_, t)| t)) {
        result
            .cross_refs
            .insert(Source::Wikipedia, title.replace('_', " "));
    }

    let lat = number(subject, GEO_LAT);
    let long = number(subject, GEO_LONG);
    if let (Some(latitude), Some(longitude)) = (lat, long) {
        result.coordinates = Some(GeoPoint { latitude, longitude });
    }

    Ok(Some(result))
}

fn values<'a>(subject: &'a Value, predicate: &str) -> impl Iterator<Item = &'a Value> {
    subject
        .get(predicate)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn literal(subject: &Value, predicate: &str, language: &str) -> Option<String> {
    values(subject, predicate)
        .find(|v| v.get("lang").and_then(Value::as_str) == Some(language))
        .and_then(|v| v.get("value")?.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn uris<'a>(subject: &'a Value, predicate: &str) -> impl Iterator<Item = &'a str> {
    values(subject, predicate)
        .filter(|v| v.get("type").and_then(Value::as_str) == Some("uri"))
        .filter_map(|v| v.get("value")?.as_str())
}

fn number(subject: &Value, predicate: &str) -> Option<f64> {
    let value = values(subject, predicate).next()?.get("value")?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
