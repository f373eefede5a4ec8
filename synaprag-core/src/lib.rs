//! # synaprag core
//!
//! Lifecycle, discovery and resilience infrastructure for pluggable
//! retrieval-augmented-generation pipelines.
//!
//! - **Lifecycle**: every adapter moves through
//!   `CREATED → INITIALIZED → VALIDATED → SHUTDOWN`; capability calls are
//!   only accepted while `VALIDATED`
//! - **Registry**: adapters register typed factories per category
//!   (Inputs, Embeddings, VectorStores, LLMs) and are discovered at runtime
//! - **Pipeline**: load → preprocess → embed (cached) → index → retrieve →
//!   generate, with optional pre-context consolidation
//! - **Resilience**: per-adapter circuit breakers with retry and backoff, a
//!   TTL cache for embeddings and an availability gate
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use synaprag_core::{Orchestrator, RagConfig, RagContext};
//!
//! # async fn example() -> synaprag_core::Result<()> {
//! let ctx = RagContext::with_defaults(RagConfig::from_env()?)?;
//! let answer = Orchestrator::new(ctx).run("hola", None).await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Built-in offline adapters
pub mod adapters;
pub mod availability;
pub mod caching;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod registry;
pub mod resilience;

pub use crate::availability::{AvailabilityGate, EnvironmentGate};
pub use crate::caching::{CacheStats, TtlCache};
pub use crate::config::{load_config, RagConfig};
pub use crate::core::{
    Adapter, Component, ComponentState, Document, EmbeddingModel, InputSource, Lifecycle,
    LlmModel, PluginMetadata, RagError, RawDocument, Result, ScoredDocument, VectorStore,
};
pub use crate::pipeline::{Orchestrator, PipelineRun, PipelineStage, RagContext};
pub use crate::registry::{
    AdapterFactory, AdapterNamespace, AdapterRegistry, Category, LoadOutcome,
};
pub use crate::resilience::{BreakerConfig, CircuitBreaker, CircuitState};
