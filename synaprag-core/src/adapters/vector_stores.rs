use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::adapters::embeddings::DEFAULT_DIMENSION;
use crate::availability::AvailabilityGate;
use crate::core::{Document, Lifecycle, PluginMetadata, RagError, Result, ScoredDocument, VectorStore};
use crate::registry::AdapterContext;

/// Metadata of [`MemoryStore`]
pub fn memory_store_metadata() -> PluginMetadata {
    PluginMetadata::new(
        "memory_store",
        env!("CARGO_PKG_VERSION"),
        "In-process vector store with exhaustive cosine search",
    )
    .with_dependencies(["indexmap"])
    .with_min_requirements("memory proportional to indexed vectors")
    .with_compatibility(">=0.1")
}

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

struct IndexedVector {
    document: Document,
    vector: Vec<f32>,
}

/// Vectors kept in insertion order; re-adding an id replaces it in place
pub struct MemoryStore {
    name: String,
    dimension: usize,
    entries: RwLock<IndexMap<String, IndexedVector>>,
    gate: Arc<dyn AvailabilityGate>,
}

impl MemoryStore {
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
            entries: RwLock::new(IndexMap::new()),
            gate: ctx.gate.clone(),
        })
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Lifecycle for MemoryStore {
    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> PluginMetadata {
        memory_store_metadata()
    }

    async fn do_initialize(&self) -> Result<()> {
        self.entries.write().clear();
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
        let mut entries = self.entries.write();
        tracing::debug!(adapter = %self.name, released = entries.len(), "memory store released");
        entries.clear();
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn add(&self, document: &Document, vector: &[f32]) -> Result<()> {
        self.entries.write().insert(
            document.id.clone(),
            IndexedVector {
                document: document.clone(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.entries.write().shift_remove(id).is_some())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let entries = self.entries.read();
        let mut scored: Vec<ScoredDocument> = entries
            .values()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn reindex(&self) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.vector.iter().all(|x| x.is_finite()));
        entries.shrink_to_fit();
        tracing::debug!(adapter = %self.name, documents = entries.len(), "memory store reindexed");
        Ok(())
    }
}
