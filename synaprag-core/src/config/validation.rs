use crate::config::RagConfig;
use crate::resilience::BreakerConfig;

/// Outcome of validating a configuration
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the configuration is valid
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<String>,
    /// Warnings (don't affect validity)
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Empty, valid result
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error and mark validation as failed
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    /// Add a warning
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for configuration validation
pub trait Validatable {
    /// Validate with standard checks
    fn validate(&self) -> ValidationResult;
}

impl Validatable for BreakerConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.failure_threshold == 0 {
            result.add_error("circuit_breaker.failure_threshold must be greater than 0");
        }
        if self.success_threshold == 0 {
            result.add_error("circuit_breaker.success_threshold must be greater than 0");
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            result.add_error(format!(
                "circuit_breaker.backoff_factor must be a finite number of at least 1.0, got {}",
                self.backoff_factor
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            result.add_warning(format!(
                "circuit_breaker.max_backoff_ms ({}) is below initial_backoff_ms ({}), retries wait {} ms",
                self.max_backoff_ms, self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        if self.recovery_timeout_ms == 0 {
            result.add_warning("circuit_breaker.recovery_timeout_ms is 0, open breakers probe immediately");
        }

        result
    }
}

impl Validatable for RagConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        for (field, name) in [
            ("adapters.input", &self.adapters.input),
            ("adapters.embedder", &self.adapters.embedder),
            ("adapters.vector_store", &self.adapters.vector_store),
            ("adapters.llm", &self.adapters.llm),
        ] {
            if name.trim().is_empty() {
                result.add_error(format!("{field} cannot be empty"));
            }
        }

        if self.search_k == 0 {
            result.add_error("search_k must be greater than 0");
        }

        if self.cache.max_entries == Some(0) {
            result.add_error("cache.max_entries must be greater than 0 when set");
        }
        if self.cache.embedding_ttl_secs.is_none() && self.cache.max_entries.is_none() {
            result.add_warning("embedding cache has neither a TTL nor a size bound and grows without limit");
        }

        result.merge(self.circuit_breaker.validate());
        result
    }
}
