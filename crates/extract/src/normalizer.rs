use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.,!?;:'"()\[\]]"#).expect("valid punctuation pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Legal-form suffixes dropped before comparing organisation names.
const LEGAL_SUFFIXES: &[&str] = &["inc", "ltd", "llc", "corp", "co", "gmbh", "ag", "plc", "sa"];

/// Collapses spelling variants of the same mention onto one canonical key.
///
/// Only names whose cleaned forms are identical are variants; overlapping
/// words alone never merge two mentions.
pub struct EntityNormalizer {
    /// Maps normalized name -> first spelling seen
    aliases: HashMap<String, String>,
}

impl EntityNormalizer {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Normalize a mention: lowercase, strip punctuation and legal-form
    /// suffixes, collapse whitespace.
    pub fn normalize(&mut self, name: &str) -> String {
        let normalized = Self::clean(name);
        self.aliases
            .entry(normalized.clone())
            .or_insert_with(|| name.trim().to_string());
        normalized
    }

    fn clean(name: &str) -> String {
        let lowered = name.to_lowercase();
        let stripped = PUNCTUATION.replace_all(lowered.trim(), "");
        let collapsed = WHITESPACE.replace_all(stripped.trim(), " ").to_string();

        let mut words: Vec<&str> = collapsed.split(' ').collect();
        while words.len() > 1 && words.last().is_some_and(|w| LEGAL_SUFFIXES.contains(w)) {
            words.pop();
        }
        words.join(" ")
    }

    pub fn get_aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
