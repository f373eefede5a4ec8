//! Unified error handling for the synaprag pipeline
//!
//! Every fallible operation in the crate returns [`Result`]. Lifecycle misuse,
//! contract violations and configuration problems are never retried; only
//! errors flagged as transient are fed back into the circuit breaker's retry
//! loop.

use crate::core::lifecycle::ComponentState;
use crate::pipeline::PipelineStage;
use crate::registry::Category;

/// Main error type for the synaprag system
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// A lifecycle method was called from a state that does not allow it
    #[error("invalid transition for component '{component}': cannot {operation} from state {from}")]
    InvalidTransition {
        /// Component name
        component: String,
        /// State the component was in
        from: ComponentState,
        /// Lifecycle operation that was attempted
        operation: &'static str,
    },

    /// A capability operation was called before `validate()` or after `shutdown()`
    #[error(
        "component '{component}' is not ready for {operation}: requires state {required}, found {actual}"
    )]
    NotReady {
        /// Component name
        component: String,
        /// Capability operation that was attempted
        operation: &'static str,
        /// State the operation requires
        required: ComponentState,
        /// State the component was in
        actual: ComponentState,
    },

    /// Vector length disagrees with the vector store's configured dimension
    #[error("dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured on the store
        expected: usize,
        /// Length of the offending vector
        actual: usize,
    },

    /// The circuit breaker guarding a dependency is open
    #[error("circuit '{breaker}' is open: {reason}")]
    CircuitOpen {
        /// Breaker (call-site) name
        breaker: String,
        /// Why the call was rejected
        reason: String,
        /// Failure that tripped the breaker, when the trip happened during this call
        #[source]
        source: Option<Box<RagError>>,
    },

    /// Loading and preprocessing produced no usable documents
    #[error("no documents available after loading and preprocessing")]
    NoDocuments,

    /// No adapter is registered under the configured name
    #[error("adapter '{name}' not found in category {category}")]
    AdapterNotFound {
        /// Category that was searched
        category: Category,
        /// Adapter name
        name: String,
    },

    /// A module registered a factory for a different category than its own
    #[error("adapter '{name}' is registered under {expected} but provides a {actual} factory")]
    CategoryMismatch {
        /// Adapter name
        name: String,
        /// Category directory the module was found in
        expected: Category,
        /// Category of the factory the module returned
        actual: Category,
    },

    /// The availability gate reported the service as unavailable
    #[error("service '{service}' is not available")]
    ServiceUnavailable {
        /// Service name that was checked
        service: String,
    },

    /// Failure reported by an adapter while talking to its dependency
    #[error("adapter '{adapter}' failed: {message}")]
    Adapter {
        /// Adapter name
        adapter: String,
        /// Error message
        message: String,
        /// Whether retrying the call can succeed
        transient: bool,
    },

    /// Data or contract validation errors
    #[error("validation error: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// Configuration-related errors
    #[error("configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Plugin metadata is incomplete or incompatible
    #[error("metadata error for plugin '{plugin}': {message}")]
    Metadata {
        /// Plugin name (or `unknown`)
        plugin: String,
        /// Error message
        message: String,
    },

    /// I/O errors from file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// An error attributed to the pipeline stage it originated in
    #[error("stage {stage} failed: {source}")]
    Stage {
        /// Stage the error surfaced from
        stage: PipelineStage,
        /// Originating error
        #[source]
        source: Box<RagError>,
    },
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, RagError>;

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Something unexpected but recoverable; a later retry may succeed
    Warning,
    /// Operation failed; the run is aborted
    Error,
    /// Programming or configuration error that will not go away on retry
    Critical,
}

impl RagError {
    /// Transient adapter failure; retried by the circuit breaker
    pub fn transient(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Adapter {
            adapter: adapter.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Permanent adapter failure; returned to the caller without retry
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Adapter {
            adapter: adapter.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Shorthand for a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        RagError::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        RagError::Config {
            message: message.into(),
        }
    }

    /// Attribute this error to a pipeline stage.
    ///
    /// Errors that already carry a stage keep the innermost attribution.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            already @ RagError::Stage { .. } => already,
            other => RagError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage this error was attributed to, if any
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            RagError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The originating error with stage attribution removed
    pub fn root_cause(&self) -> &RagError {
        match self {
            RagError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the failure came from the dependency behind an adapter.
    ///
    /// These are the failures a circuit breaker counts. Local contract
    /// errors (`NotReady`, `DimensionMismatch`, `Validation`, `Config`, ...)
    /// are not.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self.root_cause(), RagError::Adapter { .. } | RagError::Io(_))
    }

    /// Whether the circuit breaker may retry the failed call
    pub fn is_transient(&self) -> bool {
        match self.root_cause() {
            RagError::Adapter { transient, .. } => *transient,
            RagError::Io(_) => true,
            _ => false,
        }
    }

    /// Get the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self.root_cause() {
            RagError::InvalidTransition { .. }
            | RagError::NotReady { .. }
            | RagError::CategoryMismatch { .. }
            | RagError::Config { .. }
            | RagError::Metadata { .. } => ErrorSeverity::Critical,
            RagError::CircuitOpen { .. } | RagError::ServiceUnavailable { .. } => {
                ErrorSeverity::Warning
            },
            RagError::Adapter { transient: true, .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get error category for metrics/monitoring
    pub fn category(&self) -> &'static str {
        match self.root_cause() {
            RagError::InvalidTransition { .. } => "invalid_transition",
            RagError::NotReady { .. } => "not_ready",
            RagError::DimensionMismatch { .. } => "dimension_mismatch",
            RagError::CircuitOpen { .. } => "circuit_open",
            RagError::NoDocuments => "no_documents",
            RagError::AdapterNotFound { .. } => "adapter_not_found",
            RagError::CategoryMismatch { .. } => "category_mismatch",
            RagError::ServiceUnavailable { .. } => "service_unavailable",
            RagError::Adapter { .. } => "adapter",
            RagError::Validation { .. } => "validation",
            RagError::Config { .. } => "config",
            RagError::Metadata { .. } => "metadata",
            RagError::Io(_) => "io",
            RagError::Json(_) | RagError::Toml(_) => "serialization",
            RagError::Stage { .. } => "stage",
        }
    }
}

/// Attach stage attribution to a `Result`
pub trait StageContext<T> {
    /// Attribute any error to `stage`
    fn at_stage(self, stage: PipelineStage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn at_stage(self, stage: PipelineStage) -> Result<T> {
        self.map_err(|e| e.at_stage(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_attribution_keeps_innermost_stage() {
        let err = RagError::NoDocuments
            .at_stage(PipelineStage::LoadData)
            .at_stage(PipelineStage::RetrieveAndGenerate);

        assert_eq!(err.stage(), Some(PipelineStage::LoadData));
        assert!(matches!(err.root_cause(), RagError::NoDocuments));
        assert_eq!(err.category(), "no_documents");
    }

    #[test]
    fn test_transient_classification() {
        assert!(RagError::transient("openai_embedder", "timeout").is_transient());
        assert!(!RagError::adapter("openai_embedder", "bad key").is_transient());
        assert!(!RagError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_transient());

        let wrapped = RagError::transient("x", "blip").at_stage(PipelineStage::ComputeEmbeddings);
        assert!(wrapped.is_transient());
    }

    #[test]
    fn test_dependency_failure_classification() {
        assert!(RagError::adapter("openai_embedder", "bad key").is_dependency_failure());
        assert!(RagError::transient("openai_embedder", "timeout")
            .at_stage(PipelineStage::ComputeEmbeddings)
            .is_dependency_failure());
        assert!(!RagError::validation("3 vectors for 2 texts").is_dependency_failure());
        assert!(!RagError::config("search_k must be greater than 0").is_dependency_failure());
    }

    #[test]
    fn test_error_display() {
        let err = RagError::NotReady {
            component: "memory_store".to_string(),
            operation: "search",
            required: ComponentState::Validated,
            actual: ComponentState::Initialized,
        };
        assert_eq!(
            err.to_string(),
            "component 'memory_store' is not ready for search: requires state VALIDATED, found INITIALIZED"
        );
    }

    #[test]
    fn test_error_severity() {
        let config_error = RagError::config("search_k must be > 0");
        assert_eq!(config_error.severity(), ErrorSeverity::Critical);

        let open = RagError::CircuitOpen {
            breaker: "LLMs:openai".to_string(),
            reason: "open".to_string(),
            source: None,
        };
        assert_eq!(open.severity(), ErrorSeverity::Warning);
    }
}
