//! Process-wide shared state of the pipeline

use std::fmt;
use std::sync::Arc;

use crate::adapters::builtin_namespace;
use crate::availability::{AvailabilityGate, EnvironmentGate};
use crate::caching::{EmbeddingCache, TtlCache};
use crate::config::RagConfig;
use crate::core::Result;
use crate::registry::{AdapterContext, AdapterNamespace, AdapterRegistry, Category};
use crate::resilience::{CircuitBreaker, CircuitBreakers};

/// Owns the registry, the embedding cache, the circuit breakers and the
/// availability gate; built once and shared by every orchestrator.
pub struct RagContext {
    config: RagConfig,
    registry: Arc<AdapterRegistry>,
    cache: EmbeddingCache,
    breakers: CircuitBreakers,
    gate: Arc<dyn AvailabilityGate>,
}

impl RagContext {
    /// Start building a context from `config`
    pub fn builder(config: RagConfig) -> RagContextBuilder {
        RagContextBuilder::new(config)
    }

    /// Context with built-in adapters and the process environment gate
    pub fn with_defaults(config: RagConfig) -> Result<Arc<Self>> {
        Self::builder(config).build()
    }

    /// Configuration
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Adapter registry
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Embedding cache
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Circuit breakers
    pub fn breakers(&self) -> &CircuitBreakers {
        &self.breakers
    }

    /// Breaker guarding calls into one adapter, named `"{category}:{adapter}"`
    pub fn breaker(&self, category: Category, adapter: &str) -> Arc<CircuitBreaker> {
        self.breakers.get(&format!("{category}:{adapter}"))
    }

    /// Availability gate
    pub fn gate(&self) -> &Arc<dyn AvailabilityGate> {
        &self.gate
    }

    /// Factory input for `adapter`, with its configured settings
    pub fn adapter_context(&self, adapter: &str) -> AdapterContext {
        AdapterContext::new(adapter, self.config.settings_for(adapter), self.gate.clone())
    }
}

impl fmt::Debug for RagContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagContext")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("breakers", &self.breakers.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RagContext`]
pub struct RagContextBuilder {
    config: RagConfig,
    registry: Option<Arc<AdapterRegistry>>,
    gate: Option<Arc<dyn AvailabilityGate>>,
}

impl RagContextBuilder {
    /// Create a builder from `config`
    pub fn new(config: RagConfig) -> Self {
        Self {
            config,
            registry: None,
            gate: None,
        }
    }

    /// Discover adapters from `namespace` instead of the built-ins
    pub fn namespace(mut self, namespace: AdapterNamespace) -> Self {
        self.registry = Some(Arc::new(AdapterRegistry::new(namespace)));
        self
    }

    /// Share an existing registry
    pub fn registry(mut self, registry: Arc<AdapterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a custom availability gate
    pub fn gate(mut self, gate: impl AvailabilityGate + 'static) -> Self {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// Validate the configuration and build the context
    pub fn build(self) -> Result<Arc<RagContext>> {
        self.config.ensure_valid()?;

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(AdapterRegistry::new(builtin_namespace())));
        let gate = self
            .gate
            .unwrap_or_else(|| Arc::new(EnvironmentGate::new()));

        Ok(Arc::new(RagContext {
            cache: TtlCache::with_capacity(self.config.cache.max_entries),
            breakers: CircuitBreakers::new(self.config.circuit_breaker.clone()),
            registry,
            gate,
            config: self.config,
        }))
    }
}
