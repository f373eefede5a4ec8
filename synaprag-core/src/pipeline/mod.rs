//! Retrieval-augmented generation pipeline
//!
//! [`RagContext`] holds the process-wide shared state (registry, embedding
//! cache, circuit breakers, availability gate). An [`Orchestrator`] runs
//! queries against it; each run gets its own [`PipelineRun`] owning the
//! components it activates.
//!
//! ```ignore
//! let ctx = RagContext::with_defaults(RagConfig::from_env()?)?;
//! let answer = Orchestrator::new(ctx).run("hola", None).await?;
//! ```

pub mod context;
pub mod orchestrator;
pub mod pre_context;
pub mod preprocess;
/// Pipeline stage identifiers
pub mod stage;

pub use context::{RagContext, RagContextBuilder};
pub use orchestrator::{build_prompt, ActiveComponent, Orchestrator, PipelineRun};
pub use pre_context::{consolidate_pre_context, PreContext};
pub use preprocess::{preprocess, DropReason};
pub use stage::PipelineStage;
