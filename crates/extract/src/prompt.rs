pub const EXTRACTION_SYSTEM: &str =
    "You are a precise information extraction engine. You output only valid JSON.";

pub const KNOWLEDGE_SYSTEM: &str =
    "You are a careful knowledge engineer. You state only well-established facts and output only valid JSON.";

pub const LEXICON_SYSTEM: &str =
    "You are a multilingual terminology assistant. You output only valid JSON.";

fn entity_lines(entities: &[(String, Option<String>)]) -> String {
    entities
        .iter()
        .map(|(name, entity_type)| match entity_type {
            Some(t) => format!("- {} ({})", name, t),
            None => format!("- {}", name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Explicit pass: relationships stated in the text between known entities.
pub fn build_explicit_prompt(text: &str, entities: &[(String, Option<String>)]) -> String {
    format!(
        r#"Extract relationships that the text states directly between the listed entities.

ENTITIES:
{}

SCHEMA:
{{
  "relationships": [
    {{"subject": "EntityName", "predicate": "verb phrase", "object": "EntityName", "evidence": "quote from text", "confidence": 0.0-1.0}}
  ]
}}

RULES:
- Subject and object must be copied exactly from the ENTITIES list
- Predicates are lower-case, third-person singular verb phrases: "causes", "is part of", "discovered"
- Evidence must be a direct quote from the text
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{}

JSON OUTPUT:"#,
        entity_lines(entities),
        text
    )
}

/// Implicit pass: relationships known from general knowledge, not from the text.
pub fn build_implicit_prompt(entities: &[(String, Option<String>)]) -> String {
    format!(
        r#"Using general knowledge, list well-established relationships between the entities below.

ENTITIES:
{}

SCHEMA:
{{
  "relationships": [
    {{"subject": "EntityName", "predicate": "verb phrase", "object": "EntityName", "confidence": 0.0-1.0}}
  ]
}}

RULES:
- Subject and object must be copied exactly from the ENTITIES list
- Predicates are lower-case, third-person singular verb phrases
- Only include relationships you are confident about; set confidence accordingly
- Output ONLY the JSON object

JSON OUTPUT:"#,
        entity_lines(entities)
    )
}

/// Generative mode: entities are not fixed in advance.
pub fn build_generative_prompt(text: &str) -> String {
    format!(
        r#"Extract the key entities and the relationships between them from the text.

SCHEMA:
{{
  "entities": [
    {{"name": "EntityName", "type": "category", "description": "brief description"}}
  ],
  "relationships": [
    {{"subject": "EntityName", "predicate": "verb phrase", "object": "EntityName", "evidence": "quote from text", "confidence": 0.0-1.0}}
  ]
}}

RULES:
- Every subject and object must appear in "entities"
- Predicates are lower-case, third-person singular verb phrases
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{}

JSON OUTPUT:"#,
        text
    )
}

pub fn build_translation_prompt(term: &str, from: Option<&str>, to: &str) -> String {
    let from = from
        .map(|l| format!("from language code '{}' ", l))
        .unwrap_or_default();
    format!(
        r#"Translate the term "{}" {}into language code '{}'.
Give the name an encyclopedia in that language would use as an article title.

SCHEMA:
{{"translation": "translated term or null if none exists"}}

JSON OUTPUT:"#,
        term, from, to
    )
}

pub fn build_synonym_prompt(term: &str, entity_type: Option<&str>, language: &str, max: usize) -> String {
    let context = entity_type
        .map(|t| format!(" (a {})", t))
        .unwrap_or_default();
    format!(
        r#"List up to {} alternative names for "{}"{} that an encyclopedia in language code '{}' might use as an article title: synonyms, full names, common spellings.

SCHEMA:
{{"synonyms": ["alternative 1", "alternative 2"]}}

RULES:
- Most likely article title first
- Do not repeat the original term

JSON OUTPUT:"#,
        max, term, context, language
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
