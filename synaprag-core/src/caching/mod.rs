//! In-memory caching of expensive stage outputs

pub mod cache_key;
pub mod ttl_cache;

pub use cache_key::{cache_key, fingerprint, key_prefix, EMBEDDINGS_STAGE};
pub use ttl_cache::{CacheStats, TtlCache};

/// Cache of embedding batches, keyed by [`cache_key`]
pub type EmbeddingCache = TtlCache<Vec<Vec<f32>>>;
