//! Built-in offline adapters
//!
//! | Category | Adapter | Settings |
//! |---|---|---|
//! | Inputs | `json_loader` | `path` |
//! | Inputs | `inline_loader` | `documents` |
//! | Embeddings | `hash_embedder` | `dimension` (64) |
//! | VectorStores | `memory_store` | `dimension` (64) |
//! | LLMs | `template_generator` | `template` (`"{prompt}"`) |

/// Hash-based embedder
pub mod embeddings;
pub mod inputs;
/// Template generator
pub mod llms;
/// In-memory vector store
pub mod vector_stores;

pub use embeddings::{HashEmbedder, DEFAULT_DIMENSION};
pub use inputs::{InlineLoader, JsonLoader};
pub use llms::TemplateGenerator;
pub use vector_stores::{cosine_similarity, MemoryStore};

use crate::registry::{AdapterFactory, AdapterNamespace};

/// Namespace holding every built-in adapter
pub fn builtin_namespace() -> AdapterNamespace {
    register_builtins(AdapterNamespace::new())
}

/// Add the built-in adapters to `namespace`
pub fn register_builtins(namespace: AdapterNamespace) -> AdapterNamespace {
    namespace
        .with_adapter(
            "json_loader",
            inputs::json_loader_metadata(),
            AdapterFactory::input(JsonLoader::from_context),
        )
        .with_adapter(
            "inline_loader",
            inputs::inline_loader_metadata(),
            AdapterFactory::input(InlineLoader::from_context),
        )
        .with_adapter(
            "hash_embedder",
            embeddings::hash_embedder_metadata(),
            AdapterFactory::embedding(HashEmbedder::from_context),
        )
        .with_adapter(
            "memory_store",
            vector_stores::memory_store_metadata(),
            AdapterFactory::vector_store(MemoryStore::from_context),
        )
        .with_adapter(
            "template_generator",
            llms::template_generator_metadata(),
            AdapterFactory::llm(|ctx| Ok(TemplateGenerator::from_context(ctx))),
        )
}
