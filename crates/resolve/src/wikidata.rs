use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use model::{GeoPoint, LinkError, Reference, Result, Source, SourceResult};

use crate::config::SourceSettings;
use crate::http::{build_client, get_json};
use crate::knowledge_base::KnowledgeBase;

const DEFAULT_ENDPOINT: &str = "https://www.wikidata.org/w/api.php";
const ENTITY_PREFIX: &str = "http://www.wikidata.org/entity/";

const INSTANCE_OF: &str = "P31";
const PART_OF: &str = "P361";
const HAS_PART: &str = "P527";
const COORDINATES: &str = "P625";
const INCEPTION: &str = "P571";

/// `wbgetentities` accepts at most this many ids per call.
const IDS_PER_REQUEST: usize = 50;

/// Authority identifiers copied into `external_ids`.
const AUTHORITY_IDS: &[(&str, &str)] = &[("P214", "viaf"), ("P227", "gnd"), ("P244", "loc"), ("P646", "freebase")];

/// Wikibase API client: `wbsearchentities` for search, `wbgetentities` for records.
#[derive(Clone)]
pub struct WikidataClient {
    endpoint: String,
    client: reqwest::Client,
}

impl WikidataClient {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        Ok(Self {
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client: build_client(settings.timeout())?,
        })
    }

    async fn search_id(&self, query: &str, language: &str) -> Result<Option<String>> {
        let params = [
            ("action", "wbsearchentities"),
            ("format", "json"),
            ("type", "item"),
            ("limit", "1"),
            ("search", query),
            ("language", language),
            ("uselang", language),
        ];
        let value = get_json(&self.client, &self.endpoint, &params, "wikidata search").await?;
        parse_search_hit(&value)
    }

    async fn get_entity(&self, id: &str, languages: &str) -> Result<Value> {
        let params = [
            ("action", "wbgetentities"),
            ("format", "json"),
            ("ids", id),
            ("languages", languages),
            ("props", "labels|descriptions|claims|sitelinks"),
        ];
        get_json(&self.client, &self.endpoint, &params, "wikidata entity").await
    }

    /// Best effort: references keep their bare id when the label fetch fails.
    async fn label_references(&self, result: &mut SourceResult, language: &str) {
        let ids = unlabeled_references(result);
        for chunk in ids.chunks(IDS_PER_REQUEST) {
            let joined = chunk.join("|");
            let params = [
                ("action", "wbgetentities"),
                ("format", "json"),
                ("ids", joined.as_str()),
                ("languages", language),
                ("props", "labels"),
            ];
            match get_json(&self.client, &self.endpoint, &params, "wikidata labels").await {
                Ok(value) => apply_reference_labels(result, &value, language),
                Err(e) => debug!(count = chunk.len(), error = %e, "Reference labels unavailable"),
            }
        }
    }
}

#[async_trait]
impl KnowledgeBase for WikidataClient {
    fn source(&self) -> Source {
        Source::Wikidata
    }

    async fn search(&self, query: &str, language: &str) -> Result<Option<SourceResult>> {
        match self.search_id(query, language).await? {
            Some(id) => self.lookup(&id, language).await,
            None => Ok(None),
        }
    }

    async fn lookup(&self, id: &str, language: &str) -> Result<Option<SourceResult>> {
        let id = id.trim_start_matches(ENTITY_PREFIX);
        let value = self.get_entity(id, language).await?;
        let Some(mut result) = parse_entity(&value, id, language)? else {
            return Ok(None);
        };
        self.label_references(&mut result, language).await;
        Ok(Some(result))
    }

    async fn langlink(&self, title: &str, from: &str, to: &str) -> Result<Option<String>> {
        let Some(id) = self.search_id(title, from).await? else {
            return Ok(None);
        };
        let value = self.get_entity(&id, to).await?;
        let label = value
            .pointer(&format!("/entities/{}/labels/{}/value", id, to))
            .and_then(Value::as_str)
            .map(String::from);
        debug!(title, from, to, id = %id, found = label.is_some(), "Wikidata label translation");
        Ok(label)
    }
}

pub fn parse_search_hit(value: &Value) -> Result<Option<String>> {
    if value.get("error").is_some() {
        return Err(LinkError::Parse(format!("wikidata error: {}", value["error"])));
    }
    let hits = value
        .get("search")
        .and_then(Value::as_array)
        .ok_or_else(|| LinkError::Parse("wikidata: missing search array".to_string()))?;
    Ok(hits
        .first()
        .and_then(|hit| hit.get("id"))
        .and_then(Value::as_str)
        .map(String::from))
}

/// Parse one entity out of a `wbgetentities` response.
pub fn parse_entity(value: &Value, id: &str, language: &str) -> Result<Option<SourceResult>> {
    if value.get("error").is_some() {
        return Err(LinkError::Parse(format!("wikidata error: {}", value["error"])));
    }
    let entity = value
        .get("entities")
        .and_then(|e| e.get(id))
        .ok_or_else(|| LinkError::Parse(format!("wikidata: entity {} absent from response", id)))?;
    if entity.get("missing").is_some() {
        return Ok(None);
    }

    let mut result = SourceResult::with_id(format!("{}{}", ENTITY_PREFIX, id));
    if let Some(label) = localized(entity, "labels", language) {
        result = result.with_label(language, label);
    }
    if let Some(description) = localized(entity, "descriptions", language) {
        result = result.with_description(language, description);
    }

    let claims = entity.get("claims");
    result.types.extend(item_claims(claims, INSTANCE_OF));
    result.part_of = item_claims(claims, PART_OF);
    result.has_part = item_claims(claims, HAS_PART);
    result.coordinates = claim_values(claims, COORDINATES)
        .next()
        .and_then(|v| {
            Some(GeoPoint {
                latitude: v.get("latitude")?.as_f64()?,
                longitude: v.get("longitude")?.as_f64()?,
            })
        });
    result.inception = claim_values(claims, INCEPTION)
        .next()
        .and_then(|v| v.get("time")?.as_str())
        .map(|t| t.trim_start_matches('+').to_string());
    for (property, scheme) in AUTHORITY_IDS {
        if let Some(ext) = claim_values(claims, property).next().and_then(Value::as_str) {
            result.external_ids.insert(scheme.to_string(), ext.to_string());
        }
    }

    if let Some(title) = entity
        .pointer(&format!("/sitelinks/{}wiki/title", language))
        .and_then(Value::as_str)
    {
        result.cross_refs.insert(Source::Wikipedia, title.to_string());
    }
    if let Some(title) = entity.pointer("/sitelinks/enwiki/title").and_then(Value::as_str) {
        result
            .cross_refs
            .insert(Source::Dbpedia, title.replace(' ', "_"));
    }

    Ok(Some(result))
}

/// Ids of type and part references that still lack a label.
fn unlabeled_references(result: &SourceResult) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let refs = result.types.iter().chain(&result.part_of).chain(&result.has_part);
    for reference in refs.filter(|r| r.label.is_none()) {
        if !ids.contains(&reference.id) {
            ids.push(reference.id.clone());
        }
    }
    ids
}

/// Fill reference labels from a `wbgetentities` labels response.
pub fn apply_reference_labels(result: &mut SourceResult, value: &Value, language: &str) {
    let Some(entities) = value.get("entities") else {
        return;
    };
    let label = |reference: Reference| -> Reference {
        if reference.label.is_some() {
            return reference;
        }
        match entities.get(&reference.id).and_then(|e| localized(e, "labels", language)) {
            Some(text) => Reference::labeled(reference.id, text),
            None => reference,
        }
    };

    result.types = std::mem::take(&mut result.types).into_iter().map(label).collect();
    result.part_of = std::mem::take(&mut result.part_of).into_iter().map(label).collect();
    result.has_part = std::mem::take(&mut result.has_part).into_iter().map(label).collect();
}

fn localized<'a>(entity: &'a Value, field: &str, language: &str) -> Option<&'a str> {
    entity
        .get(field)?
        .get(language)?
        .get("value")?
        .as_str()
}

fn claim_values<'a>(claims: Option<&'a Value>, property: &str) -> impl Iterator<Item = &'a Value> {
    claims
        .and_then(|c| c.get(property))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|claim| claim.pointer("/mainsnak/datavalue/value"))
}

fn item_claims(claims: Option<&Value>, property: &str) -> Vec<Reference> {
    let mut refs: Vec<Reference> = Vec::new();
    for value in claim_values(claims, property) {
        if let Some(id) = value.get("id").and_then(Value::as_str) {
            if !refs.iter().any(|r| r.id == id) {
                refs.push(Reference::new(id));
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str) -> Value {
        json!({"mainsnak": {"datavalue": {"value": {"id": id}}}})
    }

    fn refraction_entity() -> Value {
        json!({"entities": {"Q14620": {
            "id": "Q14620",
            "labels": {"en": {"language": "en", "value": "refraction"}},
            "descriptions": {"en": {"language": "en", "value": "change in direction of a wave"}},
            "claims": {
                "P31": [item("Q1322005"), item("Q1322005")],
                "P361": [item("Q11413")],
                "P646": [{"mainsnak": {"datavalue": {"value": "/m/06bgb"}}}]
            },
            "sitelinks": {"enwiki": {"title": "Refraction"}, "dewiki": {"title": "Brechung (Physik)"}}
        }}})
    }

    #[test]
    fn test_parse_entity() {
        let result = parse_entity(&refraction_entity(), "Q14620", "en").unwrap().unwrap();

        assert_eq!(result.identifier(), Some("http://www.wikidata.org/entity/Q14620"));
        assert!(result.is_complete("en"));
        assert_eq!(result.types.len(), 1);
        assert_eq!(result.part_of, vec![Reference::new("Q11413")]);
        assert_eq!(result.external_ids.get("freebase").map(String::as_str), Some("/m/06bgb"));
        assert_eq!(result.cross_refs.get(&Source::Wikipedia).map(String::as_str), Some("Refraction"));
    }

    #[test]
    fn test_parse_entity_other_language_is_partial() {
        let result = parse_entity(&refraction_entity(), "Q14620", "de").unwrap().unwrap();
        assert!(result.label_in("de").is_none());
        assert!(!result.is_complete("de"));
        assert_eq!(
            result.cross_refs.get(&Source::Wikipedia).map(String::as_str),
            Some("Brechung (Physik)")
        );
    }

    #[test]
    fn test_parse_coordinates_and_inception() {
        let value = json!({"entities": {"Q64": {
            "labels": {}, "descriptions": {},
            "claims": {
                "P625": [{"mainsnak": {"datavalue": {"value": {"latitude": 52.52, "longitude": 13.405}}}}],
                "P571": [{"mainsnak": {"datavalue": {"value": {"time": "+1237-01-01T00:00:00Z"}}}}]
            }
        }}});
        let result = parse_entity(&value, "Q64", "en").unwrap().unwrap();
        assert_eq!(result.coordinates.unwrap().latitude, 52.52);
        assert_eq!(result.inception.as_deref(), Some("1237-01-01T00:00:00Z"));
    }

    #[test]
    fn test_missing_entity() {
        let value = json!({"entities": {"Q0": {"id": "Q0", "missing": ""}}});
        assert!(parse_entity(&value, "Q0", "en").unwrap().is_none());
        assert!(parse_entity(&json!({}), "Q0", "en").is_err());
    }

    #[test]
    fn test_reference_labels_filled_where_known() {
        let mut result = parse_entity(&refraction_entity(), "Q14620", "en").unwrap().unwrap();
        assert_eq!(unlabeled_references(&result), vec!["Q1322005", "Q11413"]);

        let labels = json!({"entities": {
            "Q1322005": {"labels": {"en": {"language": "en", "value": "optical phenomenon"}}},
            "Q11413": {"labels": {}}
        }});
        apply_reference_labels(&mut result, &labels, "en");

        assert!(result.types.contains(&Reference::labeled("Q1322005", "optical phenomenon")));
        assert_eq!(result.part_of, vec![Reference::new("Q11413")]);
        assert_eq!(unlabeled_references(&result), vec!["Q11413"]);
    }

    #[test]
    fn test_parse_search_hit() {
        let value = json!({"search": [{"id": "Q14620", "label": "refraction"}]});
        assert_eq!(parse_search_hit(&value).unwrap(), Some("Q14620".to_string()));
        assert_eq!(parse_search_hit(&json!({"search": []})).unwrap(), None);
        assert!(parse_search_hit(&json!({"unexpected": 1})).is_err());
    }
}
