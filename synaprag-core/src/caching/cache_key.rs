//! Stable cache keys: `"{stage}:{adapter}:{sha256}"`
//!
//! The hash is SHA-256 over the ordered texts, each prefixed with its byte
//! length, so keys are reproducible across processes and `["ab", "c"]` never
//! collides with `["a", "bc"]`.

use sha2::{Digest, Sha256};

/// Stage label used for embedding cache entries
pub const EMBEDDINGS_STAGE: &str = "embeddings";

/// Hex SHA-256 over an ordered text sequence
pub fn fingerprint<S: AsRef<str>>(texts: &[S]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((texts.len() as u64).to_le_bytes());
    for text in texts {
        let bytes = text.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// Full cache key for a stage output
pub fn cache_key<S: AsRef<str>>(stage: &str, adapter: &str, texts: &[S]) -> String {
    format!("{}{}", key_prefix(stage, adapter), fingerprint(texts))
}

/// Prefix shared by every key of one stage and adapter
pub fn key_prefix(stage: &str, adapter: &str) -> String {
    format!("{stage}:{adapter}:")
}
