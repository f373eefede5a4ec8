//! Service availability gate
//!
//! A precondition check consulted before a dependency is invoked: adapters
//! call it from `do_validate`, the orchestrator calls it before retrieval and
//! generation. A gate answers `false` when the environment or configuration
//! a service needs is missing.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Checks whether a named service can be used
pub trait AvailabilityGate: Send + Sync {
    /// `true` when the service's preconditions are met
    fn check_available(&self, service: &str) -> bool;
}

impl<F> AvailabilityGate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn check_available(&self, service: &str) -> bool {
        self(service)
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Default directory holding pre-context JSON files
pub const DEFAULT_PRE_CONTEXT_DIR: &str = "pre_rag";

/// Gate driven by environment variables and local files.
///
/// | service | precondition |
/// |---|---|
/// | `openai`, `openai_generator`, `openai_embedder` | `OPENAI_API_KEY` set |
/// | `local_llm_generator`, `gguf` | `GGUF_MODEL_PATH` set to an existing file |
/// | `pre_rag` | pre-context directory contains a `*.json` file |
/// | `db`, `database` | `DB_CONNECTION` set |
/// | anything else | always available |
#[derive(Clone)]
pub struct EnvironmentGate {
    lookup: EnvLookup,
    pre_context_dir: PathBuf,
}

impl EnvironmentGate {
    /// Gate reading the process environment
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Gate reading variables through a custom lookup
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
            pre_context_dir: PathBuf::from(DEFAULT_PRE_CONTEXT_DIR),
        }
    }

    /// Gate over a fixed set of variables
    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_lookup(move |key| vars.get(key).cloned())
    }

    /// Override the directory checked for the `pre_rag` service
    pub fn with_pre_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pre_context_dir = dir.into();
        self
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn require_var(&self, key: &str, service: &str) -> bool {
        if self.var(key).is_some() {
            return true;
        }
        tracing::error!(service, variable = key, "required environment variable not set");
        false
    }

    fn check_model_file(&self, service: &str) -> bool {
        let Some(path) = self.var("GGUF_MODEL_PATH") else {
            tracing::error!(service, "GGUF_MODEL_PATH not set");
            return false;
        };
        if !Path::new(&path).is_file() {
            tracing::error!(service, path = %path, "model file not found");
            return false;
        }
        true
    }

    fn check_pre_context_dir(&self) -> bool {
        let entries = match std::fs::read_dir(&self.pre_context_dir) {
            Ok(entries) => entries,
            Err(_) => {
                tracing::error!(dir = %self.pre_context_dir.display(), "pre-context directory missing");
                return false;
            },
        };
        let has_json = entries
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.path().extension().is_some_and(|ext| ext == "json"));
        if !has_json {
            tracing::error!(dir = %self.pre_context_dir.display(), "no JSON files in pre-context directory");
        }
        has_json
    }
}

impl Default for EnvironmentGate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvironmentGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentGate")
            .field("pre_context_dir", &self.pre_context_dir)
            .finish_non_exhaustive()
    }
}

impl AvailabilityGate for EnvironmentGate {
    fn check_available(&self, service: &str) -> bool {
        let service = service.to_lowercase();
        match service.as_str() {
            "openai" | "openai_generator" | "openai_embedder" => {
                self.require_var("OPENAI_API_KEY", &service)
            },
            "local_llm_generator" | "gguf" => self.check_model_file(&service),
            "pre_rag" => self.check_pre_context_dir(),
            "db" | "database" => self.require_var("DB_CONNECTION", &service),
            _ => {
                tracing::debug!(service = %service, "no availability checks defined, assuming available");
                true
            },
        }
    }
}
