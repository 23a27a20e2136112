use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use cache::TermCache;
use extract::{complete_json, prompt, CompletionRequest, LanguageModel};
use extract::schema::{SynonymResponse, TranslationResponse};
use model::normalize_key;

use crate::knowledge_base::KnowledgeBase;

/// Marker for LLM translations whose source language is unknown.
const ANY_LANGUAGE: &str = "*";
/// LLM translations are shared by every source.
const LLM_SCOPE: &str = "llm";

/// Translates entity names for the language-fallback tier: interlanguage links
/// first, the LLM only when no link exists. Results are memoized for the run.
pub struct Translator {
    llm: Option<Arc<dyn LanguageModel>>,
    terms: TermCache,
    temperature: f32,
}

impl Translator {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>, terms: TermCache, temperature: f32) -> Self {
        Self {
            llm,
            terms,
            temperature,
        }
    }

    /// Interlanguage-link translation of `term` from `from` into `to`.
    /// Lookup failures count as "no link". Answers are memoized per source.
    pub async fn langlink(
        &self,
        kb: &dyn KnowledgeBase,
        term: &str,
        from: &str,
        to: &str,
        timeout: Duration,
    ) -> Option<String> {
        let scope = kb.source().as_str();
        if let Some(cached) = self.terms.get_translation(scope, term, from, to) {
            return cached;
        }

        let link = match tokio::time::timeout(timeout, kb.langlink(term, from, to)).await {
            Ok(Ok(link)) => link.filter(|l| !l.trim().is_empty()),
            Ok(Err(e)) => {
                debug!(term, from, to, error = %e, "Langlink lookup failed");
                return None;
            }
            Err(_) => {
                debug!(term, from, to, "Langlink lookup timed out");
                return None;
            }
        };

        // Only definitive answers are memoized.
        self.terms.set_translation(scope, term, from, to, link.clone());
        link
    }

    /// LLM translation into `to`, source language left for the model to detect.
    pub async fn translate_with_llm(&self, term: &str, to: &str) -> Option<String> {
        if let Some(cached) = self.terms.get_translation(LLM_SCOPE, term, ANY_LANGUAGE, to) {
            return cached;
        }
        let llm = self.llm.as_ref()?;

        let request = CompletionRequest::new(
            prompt::LEXICON_SYSTEM,
            prompt::build_translation_prompt(term, None, to),
        )
        .with_temperature(self.temperature);

        let value = complete_json(llm.as_ref(), &request, 2).await?;
        let translation = serde_json::from_value::<TranslationResponse>(value)
            .ok()
            .and_then(|r| r.translation)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && normalize_key(t) != normalize_key(term));

        debug!(term, to, translation = ?translation, "LLM translation");
        self.terms.set_translation(LLM_SCOPE, term, ANY_LANGUAGE, to, translation.clone());
        translation
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }
}

/// Alternate phrasings for the synonym tier, memoized for the run.
pub struct SynonymProvider {
    llm: Option<Arc<dyn LanguageModel>>,
    terms: TermCache,
    temperature: f32,
}

impl SynonymProvider {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>, terms: TermCache, temperature: f32) -> Self {
        Self {
            llm,
            terms,
            temperature,
        }
    }

    /// Up to `max` distinct alternatives, most likely first. Empty when the LLM is unavailable.
    pub async fn synonyms(
        &self,
        term: &str,
        entity_type: Option<&str>,
        language: &str,
        max: usize,
    ) -> Vec<String> {
        if max == 0 {
            return Vec::new();
        }
        if let Some(cached) = self.terms.get_synonyms(term) {
            return cached.into_iter().take(max).collect();
        }
        let Some(llm) = self.llm.as_ref() else {
            return Vec::new();
        };

        let request = CompletionRequest::new(
            prompt::LEXICON_SYSTEM,
            prompt::build_synonym_prompt(term, entity_type, language, max),
        )
        .with_temperature(self.temperature);

        let Some(value) = complete_json(llm.as_ref(), &request, 2).await else {
            return Vec::new();
        };
        let raw = match serde_json::from_value::<SynonymResponse>(value) {
            Ok(response) => response.synonyms,
            Err(e) => {
                debug!(term, error = %e, "Unparseable synonym response");
                return Vec::new();
            }
        };

        let original = normalize_key(term);
        let mut seen = vec![original];
        let mut synonyms = Vec::new();
        for candidate in raw {
            let candidate = candidate.trim().to_string();
            let key = normalize_key(&candidate);
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            synonyms.push(candidate);
            if synonyms.len() == max {
                break;
            }
        }

        debug!(term, count = synonyms.len(), "Synonyms generated");
        self.terms.set_synonyms(term, synonyms.clone());
        synonyms
    }
}
