use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use model::normalize_key;

/// Process-lifetime memo of LLM-derived terms (translations, synonyms).
///
/// Never persisted. Writes only add keys, so concurrent readers are safe.
#[derive(Clone, Default)]
pub struct TermCache {
    translations: Arc<DashMap<String, Option<String>>>,
    synonyms: Arc<DashMap<String, Vec<String>>>,
}

impl TermCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` inside the returned option means "looked up before, no translation exists".
    ///
    /// `scope` names who answered (a source's langlinks, or the LLM); answers never cross scopes.
    pub fn get_translation(&self, scope: &str, term: &str, from: &str, to: &str) -> Option<Option<String>> {
        let key = self.translation_key(scope, term, from, to);
        self.translations.get(&key).map(|r| r.value().clone())
    }

    pub fn set_translation(
        &self,
        scope: &str,
        term: &str,
        from: &str,
        to: &str,
        translation: Option<String>,
    ) {
        let key = self.translation_key(scope, term, from, to);
        self.translations.entry(key).or_insert(translation);
    }

    pub fn get_synonyms(&self, term: &str) -> Option<Vec<String>> {
        let key = self.hash_text(&normalize_key(term));
        self.synonyms.get(&key).map(|r| r.value().clone())
    }

    pub fn set_synonyms(&self, term: &str, synonyms: Vec<String>) {
        let key = self.hash_text(&normalize_key(term));
        self.synonyms.entry(key).or_insert(synonyms);
    }

    fn translation_key(&self, scope: &str, term: &str, from: &str, to: &str) -> String {
        self.hash_text(&format!("{}|{}|{}|{}", scope, from, to, normalize_key(term)))
    }

    fn hash_text(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn stats(&self) -> TermCacheStats {
        TermCacheStats {
            translations_cached: self.translations.len(),
            synonyms_cached: self.synonyms.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct TermCacheStats {
    pub translations_cached: usize,
    pub synonyms_cached: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_roundtrip() {
        let cache = TermCache::new();
        assert!(cache.get_translation("wikipedia", "Lichtbrechung", "de", "en").is_none());

        cache.set_translation("wikipedia", "Lichtbrechung", "de", "en", Some("Refraction".into()));
        assert_eq!(
            cache.get_translation("wikipedia", "lichtbrechung", "de", "en"),
            Some(Some("Refraction".to_string()))
        );
        assert!(cache.get_translation("wikipedia", "Lichtbrechung", "fr", "en").is_none());
    }

    #[test]
    fn test_negative_translation_is_remembered() {
        let cache = TermCache::new();
        cache.set_translation("wikipedia", "Xyzzy", "de", "en", None);
        assert_eq!(cache.get_translation("wikipedia", "Xyzzy", "de", "en"), Some(None));
    }

    #[test]
    fn test_translation_scopes_are_separate() {
        let cache = TermCache::new();
        cache.set_translation("wikipedia", "Lichtbrechung", "de", "en", None);
        assert!(cache.get_translation("wikidata", "Lichtbrechung", "de", "en").is_none());

        cache.set_translation("wikidata", "Lichtbrechung", "de", "en", Some("Refraction".into()));
        assert_eq!(
            cache.get_translation("wikidata", "Lichtbrechung", "de", "en"),
            Some(Some("Refraction".to_string()))
        );
        assert_eq!(cache.get_translation("wikipedia", "Lichtbrechung", "de", "en"), Some(None));
    }

    #[test]
    fn test_writes_only_add() {
        let cache = TermCache::new();
        cache.set_synonyms("car", vec!["automobile".into()]);
        cache.set_synonyms("car", vec!["motorcar".into()]);
        assert_eq!(cache.get_synonyms("Car"), Some(vec!["automobile".to_string()]));
        assert_eq!(cache.stats().synonyms_cached, 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let cache = TermCache::new();
        let clone = cache.clone();
        clone.set_synonyms("car", vec!["auto".into()]);
        assert!(cache.get_synonyms("car").is_some());
    }
}
