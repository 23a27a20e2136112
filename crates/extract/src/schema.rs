use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub subject: String,
    #[serde(alias = "relation")]
    pub predicate: String,
    pub object: String,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default, alias = "relations")]
    pub relationships: Vec<ExtractedRelation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationResponse {
    #[serde(default)]
    pub translation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynonymResponse {
    #[serde(default)]
    pub synonyms: Vec<String>,
}
