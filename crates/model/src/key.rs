use sha2::{Digest, Sha256};

/// Cache and lookup key for an entity name: lower-case, whitespace collapsed.
pub fn normalize_key(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate a stable entity ID from its normalized name
pub fn generate_entity_id(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_key(name).as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
