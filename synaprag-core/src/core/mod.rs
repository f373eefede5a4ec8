//! Core types: errors, documents, the lifecycle contract and capability traits

pub mod document;
pub mod error;
pub mod lifecycle;
pub mod metadata;
pub mod traits;

pub use document::{AdapterOptions, Document, DocumentMetadata, LoadArgs, RawDocument, ScoredDocument};
pub use error::{ErrorSeverity, RagError, Result, StageContext};
pub use lifecycle::{Component, ComponentState, Lifecycle};
pub use metadata::{check_compatibility, CompatibilityRequirement, PluginMetadata};
pub use traits::{Adapter, EmbeddingModel, InputSource, LlmModel, TextStream, VectorStore};
