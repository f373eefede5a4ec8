//! Pre-context consolidation
//!
//! Project context prepared ahead of a run lives as JSON objects in a
//! directory. They are merged into a single map by top-level key, reading
//! files in file-name order so later files win on conflicts.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::core::{RagError, Result};

/// Merged pre-context object
pub type PreContext = Map<String, Value>;

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Merge every `*.json` object in `dir`.
///
/// A missing directory yields an empty map. A file that is not valid JSON,
/// or not a JSON object, fails the consolidation.
pub async fn consolidate_pre_context(dir: &Path) -> Result<PreContext> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        tracing::info!(dir = %dir.display(), "no pre-context directory, skipping consolidation");
        return Ok(PreContext::new());
    }

    let mut merged = PreContext::new();
    let files = json_files(dir).await?;
    for file in &files {
        let content = tokio::fs::read_to_string(file).await?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(object) => merged.extend(object),
            _ => {
                return Err(RagError::validation(format!(
                    "pre-context file {} must contain a JSON object",
                    file.display()
                )))
            },
        }
    }

    tracing::info!(
        dir = %dir.display(),
        files = files.len(),
        keys = merged.len(),
        "pre-context consolidated"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_later_files_win() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01-project.json"), r#"{"name": "alpha", "lang": "es"}"#)
            .unwrap();
        std::fs::write(dir.path().join("02-override.json"), r#"{"name": "beta"}"#).unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let merged = consolidate_pre_context(dir.path()).await.unwrap();
        assert_eq!(merged["name"], json!("beta"));
        assert_eq!(merged["lang"], json!("es"));
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let merged = consolidate_pre_context(&dir.path().join("pre_rag")).await.unwrap();
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn test_non_object_and_malformed_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("list.json"), "[1, 2]").unwrap();
        let err = consolidate_pre_context(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::Validation { .. }));

        std::fs::write(dir.path().join("list.json"), "{ nope").unwrap();
        let err = consolidate_pre_context(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::Json(_)));
    }
}
