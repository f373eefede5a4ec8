use std::fs;
use std::path::Path;

use crate::config::RagConfig;
use crate::core::{RagError, Result};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML configuration format
    Toml,
    /// JSON configuration format
    Json,
}

impl ConfigFormat {
    /// Determine configuration format from file extension
    pub fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml, // Default
        }
    }
}

/// Parse configuration text without applying overrides
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<RagConfig> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| RagError::Config {
            message: format!("Failed to parse TOML config: {e}"),
        }),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| RagError::Config {
            message: format!("Failed to parse JSON config: {e}"),
        }),
    }
}

/// Load configuration from file, apply process environment overrides and validate
pub fn load_config(path: impl AsRef<Path>) -> Result<RagConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Load configuration from file with a custom environment lookup
pub fn load_config_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<RagConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(RagError::Config {
            message: format!("Configuration file not found: {}", path.display()),
        });
    }

    let content = fs::read_to_string(path)?;
    let mut config = parse_config(&content, ConfigFormat::from_extension(path))?;
    config.apply_env_overrides(lookup)?;
    config.ensure_valid()?;

    tracing::info!(
        path = %path.display(),
        input = %config.adapters.input,
        embedder = %config.adapters.embedder,
        vector_store = %config.adapters.vector_store,
        llm = %config.adapters.llm,
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TOML_CONFIG: &str = r#"
search_k = 3
pre_context_enabled = false

[adapters]
input = "inline_loader"
llm = "template_generator"

[adapter_settings.memory_store]
dimension = 16

[cache]
embedding_ttl_secs = 600

[circuit_breaker]
failure_threshold = 2
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_toml_with_partial_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(TOML_CONFIG.as_bytes()).unwrap();

        let config = load_config_with(file.path(), no_env).unwrap();
        assert_eq!(config.search_k, 3);
        assert!(!config.pre_context_enabled);
        assert_eq!(config.adapters.input, "inline_loader");
        // unspecified fields keep their defaults
        assert_eq!(config.adapters.embedder, "hash_embedder");
        assert_eq!(config.settings_for("memory_store")["dimension"], 16);
        assert_eq!(config.cache.embedding_ttl_secs, Some(600));
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.success_threshold, 2);
    }

    #[test]
    fn test_load_json_and_env_override_wins() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"search_k": 7, "adapters": {"vector_store": "memory_store"}}"#)
            .unwrap();

        let config = load_config_with(file.path(), |key| {
            (key == "SYNAPRAG_SEARCH_K").then(|| "2".to_string())
        })
        .unwrap();
        assert_eq!(config.search_k, 2);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"search_k = 0\n").unwrap();

        let err = load_config_with(file.path(), no_env).unwrap_err();
        assert!(err.to_string().contains("search_k"));
    }

    #[test]
    fn test_missing_file_and_parse_errors() {
        let err = load_config_with("/nonexistent/synaprag.toml", no_env).unwrap_err();
        assert!(err.to_string().contains("not found"));

        let err = parse_config("search_k = [", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, RagError::Config { .. }));
        assert_eq!(
            ConfigFormat::from_extension(Path::new("rag.json")),
            ConfigFormat::Json
        );
    }
}
