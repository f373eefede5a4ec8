//! Input sources: JSON files and inline documents

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::availability::AvailabilityGate;
use crate::core::{
    InputSource, Lifecycle, LoadArgs, PluginMetadata, RagError, RawDocument, Result,
};
use crate::registry::AdapterContext;

fn require_available(gate: &dyn AvailabilityGate, name: &str) -> Result<()> {
    if gate.check_available(name) {
        Ok(())
    } else {
        Err(RagError::ServiceUnavailable {
            service: name.to_string(),
        })
    }
}

/// Metadata of [`JsonLoader`]
pub fn json_loader_metadata() -> PluginMetadata {
    PluginMetadata::new(
        "json_loader",
        env!("CARGO_PKG_VERSION"),
        "Loads a JSON array of documents from a file",
    )
    .with_dependencies(["serde_json"])
    .with_compatibility(">=0.1")
}

/// Reads a JSON array of `{id, text, metadata}` records from setting `path`.
///
/// A `path` entry in the load arguments overrides the configured file.
pub struct JsonLoader {
    name: String,
    path: Option<PathBuf>,
    gate: Arc<dyn AvailabilityGate>,
}

impl JsonLoader {
    /// Build from factory context
    pub fn from_context(ctx: &AdapterContext) -> Result<Self> {
        Ok(Self {
            name: ctx.name.clone(),
            path: ctx.setting_str("path").map(PathBuf::from),
            gate: ctx.gate.clone(),
        })
    }

    fn resolve_path(&self, args: &LoadArgs) -> Result<PathBuf> {
        args.get("path")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .or_else(|| self.path.clone())
            .ok_or_else(|| RagError::config(format!("adapter '{}' needs a 'path' setting", self.name)))
    }
}

#[async_trait]
impl Lifecycle for JsonLoader {
    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> PluginMetadata {
        json_loader_metadata()
    }

    async fn do_initialize(&self) -> Result<()> {
        tracing::debug!(adapter = %self.name, path = ?self.path, "json loader initialized");
        Ok(())
    }

    async fn do_validate(&self) -> Result<()> {
        require_available(self.gate.as_ref(), &self.name)?;
        let Some(path) = &self.path else {
            return Err(RagError::config(format!("adapter '{}' needs a 'path' setting", self.name)));
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(RagError::config(format!(
                "adapter '{}': input file {} not found",
                self.name,
                path.display()
            )));
        }
        Ok(())
    }

    async fn do_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl InputSource for JsonLoader {
    async fn load_data(&self, args: &LoadArgs) -> Result<Vec<RawDocument>> {
        let path = self.resolve_path(args)?;
        let content = tokio::fs::read_to_string(&path).await?;
        let documents: Vec<RawDocument> = serde_json::from_str(&content)?;
        tracing::debug!(adapter = %self.name, path = %path.display(), documents = documents.len(), "read documents");
        Ok(documents)
    }
}

/// Metadata of [`InlineLoader`]
pub fn inline_loader_metadata() -> PluginMetadata {
    PluginMetadata::new(
        "inline_loader",
        env!("CARGO_PKG_VERSION"),
        "Serves documents embedded in the adapter settings",
    )
    .with_dependencies(Vec::<String>::new())
    .with_min_requirements("none")
    .with_compatibility(">=0.1")
}

/// Serves the documents listed in setting `documents`
pub struct InlineLoader {
    name: String,
    documents: Vec<RawDocument>,
    gate: Arc<dyn AvailabilityGate>,
}

impl InlineLoader {
    /// Build from factory context; `documents` must be an array of records
    pub fn from_context(ctx: &AdapterContext) -> Result<Self> {
        let documents = match ctx.settings.get("documents") {
            None => Vec::new(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                RagError::config(format!("adapter '{}': invalid 'documents': {e}", ctx.name))
            })?,
        };
        Ok(Self {
            name: ctx.name.clone(),
            documents,
            gate: ctx.gate.clone(),
        })
    }

    /// Loader serving `documents`
    pub fn new(documents: Vec<RawDocument>, gate: Arc<dyn AvailabilityGate>) -> Self {
        Self {
            name: "inline_loader".to_string(),
            documents,
            gate,
        }
    }
}

#[async_trait]
impl Lifecycle for InlineLoader {
    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> PluginMetadata {
        inline_loader_metadata()
    }

    async fn do_initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn do_validate(&self) -> Result<()> {
        require_available(self.gate.as_ref(), &self.name)?;
        if self.documents.is_empty() {
            tracing::warn!(adapter = %self.name, "inline loader has no documents");
        }
        Ok(())
    }

    async fn do_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl InputSource for InlineLoader {
    async fn load_data(&self, _args: &LoadArgs) -> Result<Vec<RawDocument>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::AdapterOptions;

    fn context(name: &str, settings: Value) -> AdapterContext {
        let settings: AdapterOptions = serde_json::from_value(settings).unwrap();
        AdapterContext::new(name, settings, Arc::new(|_: &str| true))
    }

    #[tokio::test]
    async fn test_json_loader_reads_file_and_keeps_malformed_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        std::fs::write(
            &path,
            r#"[{"id": "1", "text": "uno", "metadata": {}}, {"text": "sin id"}]"#,
        )
        .unwrap();

        let loader = JsonLoader::from_context(&context("json_loader", json!({"path": path}))).unwrap();
        loader.do_validate().await.unwrap();
        let documents = loader.load_data(&LoadArgs::new()).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].id, None);
    }

    #[tokio::test]
    async fn test_json_loader_validation_needs_existing_file() {
        let loader = JsonLoader::from_context(&context("json_loader", json!({}))).unwrap();
        assert!(matches!(loader.do_validate().await, Err(RagError::Config { .. })));

        let loader = JsonLoader::from_context(&context(
            "json_loader",
            json!({"path": "/nonexistent/docs.json"}),
        ))
        .unwrap();
        assert!(loader.do_validate().await.is_err());
    }

    #[tokio::test]
    async fn test_inline_loader_parses_settings() {
        let ctx = context(
            "inline_loader",
            json!({"documents": [{"id": "a", "text": "alpha", "metadata": {"lang": "en"}}]}),
        );
        let loader = InlineLoader::from_context(&ctx).unwrap();
        let documents = loader.load_data(&LoadArgs::new()).await.unwrap();
        assert_eq!(documents[0].text.as_deref(), Some("alpha"));

        let bad = context("inline_loader", json!({"documents": "nope"}));
        assert!(InlineLoader::from_context(&bad).is_err());
    }
}
