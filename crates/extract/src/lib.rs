pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use llm::{complete_json, extract_json, CompletionRequest, LanguageModel, OllamaClient};
pub use normalizer::EntityNormalizer;
pub use schema::{ExtractedEntity, ExtractedRelation, ExtractionResult};

use std::sync::Arc;
use tracing::{debug, info};

use model::{normalize_key, EntityRecord, LinkError, Provenance, Relationship, Result};

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_json_retries: usize,
    pub temperature: f32,
    pub model: Option<String>,
    /// Used when the model omits a confidence for a stated relationship
    pub explicit_confidence: f32,
    /// Used when the model omits a confidence for an inferred relationship
    pub implicit_confidence: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_json_retries: 3,
            temperature: 0.0,
            model: None,
            explicit_confidence: 0.9,
            implicit_confidence: 0.6,
        }
    }
}

/// Relationship extraction over source text (explicit) and general knowledge (implicit).
pub struct RelationshipExtractor {
    llm: Arc<dyn LanguageModel>,
    config: ExtractorConfig,
}

impl RelationshipExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, config: ExtractorConfig) -> Self {
        Self { llm, config }
    }

    /// Relationships the text states directly between known entities.
    pub async fn extract_explicit(
        &self,
        text: &str,
        entities: &[EntityRecord],
    ) -> Result<Vec<Relationship>> {
        if text.trim().is_empty() || entities.len() < 2 {
            return Ok(Vec::new());
        }
        let prompt = prompt::build_explicit_prompt(text, &entity_pairs(entities));
        let result = self.run(prompt::EXTRACTION_SYSTEM, prompt).await?;

        let relationships = self.to_relationships(result.relationships, entities, Provenance::Explicit);
        info!(count = relationships.len(), "Explicit relationships extracted");
        Ok(relationships)
    }

    /// Relationships inferred from general knowledge about the entities.
    pub async fn infer_implicit(&self, entities: &[EntityRecord]) -> Result<Vec<Relationship>> {
        if entities.len() < 2 {
            return Ok(Vec::new());
        }
        let prompt = prompt::build_implicit_prompt(&entity_pairs(entities));
        let result = self.run(prompt::KNOWLEDGE_SYSTEM, prompt).await?;

        let relationships = self.to_relationships(result.relationships, entities, Provenance::Implicit);
        info!(count = relationships.len(), "Implicit relationships inferred");
        Ok(relationships)
    }

    /// Entities and stated relationships together, for runs without a fixed entity list.
    pub async fn extract_generative(&self, text: &str) -> Result<ExtractionResult> {
        if text.trim().is_empty() {
            return Ok(ExtractionResult::default());
        }
        let prompt = prompt::build_generative_prompt(text);
        let mut result = self.run(prompt::EXTRACTION_SYSTEM, prompt).await?;
        result.entities.retain(|e| !e.name.trim().is_empty());
        info!(
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            "Generative extraction finished"
        );
        Ok(result)
    }

    /// Map extracted names onto entity IDs. Names that match no entity keep
    /// the raw name as their ID; validity filtering decides their fate later.
    pub fn to_relationships(
        &self,
        relations: Vec<ExtractedRelation>,
        entities: &[EntityRecord],
        provenance: Provenance,
    ) -> Vec<Relationship> {
        let default_confidence = match provenance {
            Provenance::Explicit => self.config.explicit_confidence,
            Provenance::Implicit => self.config.implicit_confidence,
        };

        relations
            .into_iter()
            .filter_map(|rel| {
                let subject = find_entity(&rel.subject, entities);
                let object = find_entity(&rel.object, entities);

                let subject_id = subject.map(|e| e.id.clone()).unwrap_or_else(|| rel.subject.trim().to_string());
                let object_id = object.map(|e| e.id.clone()).unwrap_or_else(|| rel.object.trim().to_string());

                if subject_id.is_empty() || object_id.is_empty() || subject_id == object_id {
                    debug!(subject = %rel.subject, object = %rel.object, "Skipping degenerate relationship");
                    return None;
                }

                let mut relationship = Relationship::new(subject_id, &rel.predicate, object_id, provenance)
                    .with_confidence(rel.confidence.unwrap_or(default_confidence))
                    .with_types(
                        subject.and_then(|e| e.entity_type.clone()),
                        object.and_then(|e| e.entity_type.clone()),
                    );
                if let Some(evidence) = rel.evidence {
                    relationship = relationship.with_evidence(evidence);
                }
                (!relationship.predicate.is_empty()).then_some(relationship)
            })
            .collect()
    }

    async fn run(&self, system: &str, prompt: String) -> Result<ExtractionResult> {
        let mut request = CompletionRequest::new(system, prompt).with_temperature(self.config.temperature);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }

        let value = complete_json(self.llm.as_ref(), &request, self.config.max_json_retries)
            .await
            .ok_or_else(|| LinkError::Transport("language model returned no usable JSON".to_string()))?;

        serde_json::from_value(value)
            .map_err(|e| LinkError::Parse(format!("extraction result: {}", e)))
    }
}

fn entity_pairs(entities: &[EntityRecord]) -> Vec<(String, Option<String>)> {
    entities
        .iter()
        .map(|e| (e.name.clone(), e.entity_type.clone()))
        .collect()
}

/// Find the entity a name refers to: exact name, then ID, then case-insensitive, then normalized key.
pub fn find_entity<'a>(name: &str, entities: &'a [EntityRecord]) -> Option<&'a EntityRecord> {
    let name = name.trim();
    entities
        .iter()
        .find(|e| e.name == name)
        .or_else(|| entities.iter().find(|e| e.id == name))
        .or_else(|| {
            let lower = name.to_lowercase();
            entities.iter().find(|e| e.name.to_lowercase() == lower)
        })
        .or_else(|| {
            let key = normalize_key(name);
            entities.iter().find(|e| normalize_key(&e.name) == key)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(Option<String>);

    #[async_trait]
    impl LanguageModel for Fixed {
        async fn complete(&self, _request: &CompletionRequest) -> Option<String> {
            self.0.clone()
        }
    }

    fn extractor(reply: Option<&str>) -> RelationshipExtractor {
        RelationshipExtractor::new(
            Arc::new(Fixed(reply.map(String::from))),
            ExtractorConfig::default(),
        )
    }

    fn entities() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new("Light", Some("phenomenon".into())),
            EntityRecord::new("Glass", Some("material".into())),
        ]
    }

    #[tokio::test]
    async fn test_explicit_maps_names_to_ids() {
        let reply = r#"{"relationships": [
            {"subject": "light", "predicate": "Passes_Through", "object": "Glass", "evidence": "Light passes through glass"}
        ]}"#;
        let entities = entities();
        let rels = extractor(Some(reply))
            .extract_explicit("Light passes through glass.", &entities)
            .await
            .unwrap();

        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].subject_id, entities[0].id);
        assert_eq!(rels[0].object_id, entities[1].id);
        assert_eq!(rels[0].predicate, "passes through");
        assert_eq!(rels[0].provenance, Provenance::Explicit);
        assert_eq!(rels[0].confidence, 0.9);
        assert_eq!(rels[0].subject_type.as_deref(), Some("phenomenon"));
    }

    #[tokio::test]
    async fn test_unknown_names_are_kept_raw() {
        let reply = r#"{"relationships": [{"subject": "Light", "predicate": "bends in", "object": "Water", "confidence": 0.4}]}"#;
        let entities = entities();
        let rels = extractor(Some(reply)).infer_implicit(&entities).await.unwrap();

        assert_eq!(rels[0].object_id, "Water");
        assert_eq!(rels[0].provenance, Provenance::Implicit);
        assert_eq!(rels[0].confidence, 0.4);
    }

    #[tokio::test]
    async fn test_self_loops_dropped() {
        let reply = r#"{"relationships": [{"subject": "Light", "predicate": "is", "object": "light"}]}"#;
        let rels = extractor(Some(reply)).infer_implicit(&entities()).await.unwrap();
        assert!(rels.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_model_is_transport_error() {
        let err = extractor(None).infer_implicit(&entities()).await.unwrap_err();
        assert!(matches!(err, LinkError::Transport(_)));
    }

    #[tokio::test]
    async fn test_no_call_without_pairs() {
        let rels = extractor(None)
            .extract_explicit("text", &entities()[..1])
            .await
            .unwrap();
        assert!(rels.is_empty());
    }

    #[tokio::test]
    async fn test_generative_drops_blank_entities() {
        let reply = r#"{"entities": [{"name": "Prism"}, {"name": " "}], "relationships": []}"#;
        let result = extractor(Some(reply)).extract_generative("A prism.").await.unwrap();
        assert_eq!(result.entities.len(), 1);
    }

    #[test]
    fn test_find_entity_order() {
        let entities = entities();
        assert!(find_entity("GLASS", &entities).is_some());
        assert!(find_entity(&entities[0].id, &entities).is_some());
        assert!(find_entity("  light ", &entities).is_some());
        assert!(find_entity("Water", &entities).is_none());
    }
}
