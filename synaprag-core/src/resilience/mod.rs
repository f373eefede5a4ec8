//! Fault tolerance for calls into external dependencies

pub mod circuit_breaker;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

pub use circuit_breaker::{BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitState};

/// One breaker per protected call site, created on first use
#[derive(Debug, Default)]
pub struct CircuitBreakers {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    /// Empty set; every breaker gets `config`
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Breaker for `name`, created CLOSED if it does not exist yet
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }
        self.breakers
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    /// Counters of every breaker, sorted by name
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.read().values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Close every breaker
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    /// Number of breakers created so far
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// Whether no breaker was created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakers_are_shared_per_name() {
        let breakers = CircuitBreakers::new(BreakerConfig::default());
        let a = breakers.get("LLMs:template_generator");
        let b = breakers.get("LLMs:template_generator");
        let c = breakers.get("Embeddings:hash_embedder");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(breakers.len(), 2);

        let names: Vec<_> = breakers.snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Embeddings:hash_embedder", "LLMs:template_generator"]);
    }
}
