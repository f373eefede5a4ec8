//! Pipeline configuration
//!
//! [`RagConfig`] names the adapter bound to each pipeline stage and carries
//! the tuning knobs of the orchestrator, the embedding cache and the circuit
//! breakers. It is read from TOML or JSON by [`loader::load_config`] and can
//! be overridden through `SYNAPRAG_*` environment variables.

/// Configuration file loading
pub mod loader;
/// Configuration validation
pub mod validation;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{AdapterOptions, RagError, Result};
use crate::resilience::BreakerConfig;

pub use loader::{load_config, load_config_with, parse_config, ConfigFormat};
pub use validation::{Validatable, ValidationResult};

/// Adapter name bound to each stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSelection {
    /// Inputs adapter
    pub input: String,
    /// Embeddings adapter
    pub embedder: String,
    /// VectorStores adapter
    pub vector_store: String,
    /// LLMs adapter
    pub llm: String,
}

impl Default for AdapterSelection {
    fn default() -> Self {
        Self {
            input: "json_loader".to_string(),
            embedder: "hash_embedder".to_string(),
            vector_store: "memory_store".to_string(),
            llm: "template_generator".to_string(),
        }
    }
}

/// Embedding cache settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of cached embeddings in seconds; `None` keeps them forever
    pub embedding_ttl_secs: Option<u64>,
    /// LRU bound on stored entries; `None` is unbounded
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    /// TTL as a `Duration`
    pub fn embedding_ttl(&self) -> Option<Duration> {
        self.embedding_ttl_secs.map(Duration::from_secs)
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Adapter bound to each stage
    pub adapters: AdapterSelection,

    /// Documents retrieved per query
    pub search_k: usize,

    /// Whether pre-context consolidation runs when a context path is given
    pub pre_context_enabled: bool,

    /// Settings handed to each adapter's factory, keyed by adapter name
    pub adapter_settings: HashMap<String, AdapterOptions>,

    /// Embedding cache
    pub cache: CacheConfig,

    /// Parameters shared by every circuit breaker
    pub circuit_breaker: BreakerConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            adapters: AdapterSelection::default(),
            search_k: 5,
            pre_context_enabled: true,
            adapter_settings: HashMap::new(),
            cache: CacheConfig::default(),
            circuit_breaker: BreakerConfig::default(),
        }
    }
}

impl RagConfig {
    /// Defaults with the process environment's overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `SYNAPRAG_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(input) = var("SYNAPRAG_INPUT") {
            self.adapters.input = input;
        }
        if let Some(embedder) = var("SYNAPRAG_EMBEDDER") {
            self.adapters.embedder = embedder;
        }
        if let Some(store) = var("SYNAPRAG_VECTOR_STORE") {
            self.adapters.vector_store = store;
        }
        if let Some(llm) = var("SYNAPRAG_LLM") {
            self.adapters.llm = llm;
        }
        if let Some(k) = var("SYNAPRAG_SEARCH_K") {
            self.search_k = k.trim().parse().map_err(|_| {
                RagError::config(format!("SYNAPRAG_SEARCH_K must be an integer, got '{k}'"))
            })?;
        }
        if let Some(flag) = var("SYNAPRAG_PRE_CONTEXT") {
            self.pre_context_enabled = parse_flag(&flag).ok_or_else(|| {
                RagError::config(format!("SYNAPRAG_PRE_CONTEXT must be a boolean, got '{flag}'"))
            })?;
        }
        Ok(())
    }

    /// Settings of one adapter; empty when none are configured
    pub fn settings_for(&self, adapter: &str) -> AdapterOptions {
        self.adapter_settings.get(adapter).cloned().unwrap_or_default()
    }

    /// Fail with `RagError::Config` listing every validation error
    pub fn ensure_valid(&self) -> Result<()> {
        let result = self.validate();
        for warning in &result.warnings {
            tracing::warn!(%warning, "configuration warning");
        }
        if result.is_valid {
            Ok(())
        } else {
            Err(RagError::config(result.errors.join("; ")))
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.search_k, 5);
        assert!(config.pre_context_enabled);
        assert_eq!(config.adapters.llm, "template_generator");
        assert!(config.ensure_valid().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RagConfig::default();
        config
            .apply_env_overrides(env(&[
                ("SYNAPRAG_LLM", "openai_generator"),
                ("SYNAPRAG_SEARCH_K", " 3 "),
                ("SYNAPRAG_PRE_CONTEXT", "No"),
                ("SYNAPRAG_INPUT", ""),
            ]))
            .unwrap();

        assert_eq!(config.adapters.llm, "openai_generator");
        assert_eq!(config.adapters.input, "json_loader");
        assert_eq!(config.search_k, 3);
        assert!(!config.pre_context_enabled);
    }

    #[test]
    fn test_bad_env_values_are_config_errors() {
        let mut config = RagConfig::default();
        let err = config
            .apply_env_overrides(env(&[("SYNAPRAG_SEARCH_K", "many")]))
            .unwrap_err();
        assert!(matches!(err, RagError::Config { .. }));

        let err = config
            .apply_env_overrides(env(&[("SYNAPRAG_PRE_CONTEXT", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("SYNAPRAG_PRE_CONTEXT"));
    }

    #[test]
    fn test_settings_for_unknown_adapter_is_empty() {
        let config = RagConfig::default();
        assert!(config.settings_for("memory_store").is_empty());
    }
}
