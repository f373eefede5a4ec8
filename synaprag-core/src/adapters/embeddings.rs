use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::availability::AvailabilityGate;
use crate::core::{AdapterOptions, EmbeddingModel, Lifecycle, PluginMetadata, RagError, Result};
use crate::registry::AdapterContext;

/// Default vector dimension of the built-in embedder and store
pub const DEFAULT_DIMENSION: usize = 64;

/// Metadata of [`HashEmbedder`]
pub fn hash_embedder_metadata() -> PluginMetadata {
    PluginMetadata::new(
        "hash_embedder",
        env!("CARGO_PKG_VERSION"),
        "Deterministic SHA-256 based embeddings for offline pipelines",
    )
    .with_dependencies(["sha2"])
    .with_min_requirements("none")
    .with_compatibility(">=0.1")
}

/// Deterministic embedder.
///
/// The SHA-256 digest of the text is expanded with an incrementing counter
/// until `dimension` bytes are available; each byte is mapped to
/// `[-1.0, 1.0]` and the vector is L2-normalised. Identical text always
/// yields the identical vector.
pub struct HashEmbedder {
    name: String,
    dimension: usize,
    gate: Arc<dyn AvailabilityGate>,
}

impl HashEmbedder {
    /// Build from factory context, reading setting `dimension`
    pub fn from_context(ctx: &AdapterContext) -> Result<Self> {
        let dimension = ctx.setting_usize("dimension", DEFAULT_DIMENSION)?;
        if dimension == 0 {
            return Err(RagError::config(format!(
                "adapter '{}': dimension must be greater than 0",
                ctx.name
            )));
        }
        Ok(Self {
            name: ctx.name.clone(),
            dimension,
            gate: ctx.gate.clone(),
        })
    }

    /// Output dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut counter: u32 = 0;

        while vector.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();

            let missing = self.dimension - vector.len();
            vector.extend(digest.iter().take(missing).map(|byte| (*byte as f32 / 127.5) - 1.0));
            counter += 1;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Lifecycle for HashEmbedder {
    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> PluginMetadata {
        hash_embedder_metadata()
    }

    async fn do_initialize(&self) -> Result<()> {
        tracing::debug!(adapter = %self.name, dimension = self.dimension, "hash embedder initialized");
        Ok(())
    }

    async fn do_validate(&self) -> Result<()> {
        if !self.gate.check_available(&self.name) {
            return Err(RagError::ServiceUnavailable {
                service: self.name.clone(),
            });
        }
        Ok(())
    }

    async fn do_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    async fn embed(&self, texts: &[String], _options: &AdapterOptions) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.hash_to_vector(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn embedder(dimension: usize) -> HashEmbedder {
        let mut settings = AdapterOptions::new();
        settings.insert("dimension".to_string(), json!(dimension));
        HashEmbedder::from_context(&AdapterContext::new(
            "hash_embedder",
            settings,
            Arc::new(|_: &str| true),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_vectors_are_deterministic_and_normalised() {
        let embedder = embedder(40);
        let texts = vec!["hola".to_string(), "mundo".to_string(), "hola".to_string()];
        let vectors = embedder.embed(&texts, &AdapterOptions::new()).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 40));
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);

        let norm: f32 = vectors[1].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        let mut settings = AdapterOptions::new();
        settings.insert("dimension".to_string(), json!(0));
        let ctx = AdapterContext::new("hash_embedder", settings, Arc::new(|_: &str| true));
        assert!(HashEmbedder::from_context(&ctx).is_err());
    }
}
