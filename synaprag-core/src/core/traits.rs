//! Capability interfaces for pluggable adapters
//!
//! Four capability contracts extend [`Lifecycle`]: [`InputSource`],
//! [`EmbeddingModel`], [`VectorStore`] and [`LlmModel`]. The registry and the
//! orchestrator only ever deal with these trait objects, wrapped in a
//! [`Component`] that enforces the lifecycle.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::core::lifecycle::{Component, Lifecycle};
use crate::core::{
    AdapterOptions, Document, LoadArgs, RagError, RawDocument, Result, ScoredDocument,
};
use crate::registry::Category;

/// Incremental text output from a streaming generator
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Source of raw documents (files, databases, HTTP APIs)
#[async_trait]
pub trait InputSource: Lifecycle {
    /// Load documents
    async fn load_data(&self, args: &LoadArgs) -> Result<Vec<RawDocument>>;

    /// Adapter-specific post-processing after a successful load.
    ///
    /// Side effects only; the orchestrator does not consume anything from it.
    async fn post_load_data(&self, _documents: &[RawDocument]) -> Result<()> {
        Ok(())
    }
}

/// Text embedding model
#[async_trait]
pub trait EmbeddingModel: Lifecycle {
    /// Embed `texts`; the output has the same length and order as the input
    async fn embed(&self, texts: &[String], options: &AdapterOptions) -> Result<Vec<Vec<f32>>>;
}

/// Vector index over documents
#[async_trait]
pub trait VectorStore: Lifecycle {
    /// Configured vector dimension
    fn dimension(&self) -> usize;

    /// Index a document under its vector
    async fn add(&self, document: &Document, vector: &[f32]) -> Result<()>;

    /// Remove a document by id; returns whether it was present
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Return up to `k` documents closest to `query`, best first
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Rebuild internal index structures
    async fn reindex(&self) -> Result<()>;
}

/// Text generation model
#[async_trait]
pub trait LlmModel: Lifecycle {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, options: &AdapterOptions) -> Result<String>;

    /// Stream a completion; `Ok(None)` means streaming is unsupported
    async fn generate_stream(
        &self,
        _prompt: &str,
        _options: &AdapterOptions,
    ) -> Result<Option<TextStream>> {
        Ok(None)
    }

    /// Output filter applied to every non-streamed completion
    fn post_generate(&self, text: String) -> String {
        text
    }
}

/// An adapter instance: exactly one of the four capability sets
pub enum Adapter {
    /// Input source
    Input(Box<dyn InputSource>),
    /// Embedding model
    Embedding(Box<dyn EmbeddingModel>),
    /// Vector store
    VectorStore(Box<dyn VectorStore>),
    /// Generator
    Llm(Box<dyn LlmModel>),
}

impl Adapter {
    /// Category this adapter belongs to
    pub fn category(&self) -> Category {
        match self {
            Adapter::Input(_) => Category::Inputs,
            Adapter::Embedding(_) => Category::Embeddings,
            Adapter::VectorStore(_) => Category::VectorStores,
            Adapter::Llm(_) => Category::Llms,
        }
    }

    fn mismatch(&self, name: &str, expected: Category) -> RagError {
        RagError::CategoryMismatch {
            name: name.to_string(),
            expected,
            actual: self.category(),
        }
    }

    /// Wrap as an input component
    pub fn into_input(self, name: &str) -> Result<Component<dyn InputSource>> {
        match self {
            Adapter::Input(inner) => Ok(Component::new(name, Category::Inputs, inner)),
            other => Err(other.mismatch(name, Category::Inputs)),
        }
    }

    /// Wrap as an embedding component
    pub fn into_embedding(self, name: &str) -> Result<Component<dyn EmbeddingModel>> {
        match self {
            Adapter::Embedding(inner) => Ok(Component::new(name, Category::Embeddings, inner)),
            other => Err(other.mismatch(name, Category::Embeddings)),
        }
    }

    /// Wrap as a vector store component
    pub fn into_vector_store(self, name: &str) -> Result<Component<dyn VectorStore>> {
        match self {
            Adapter::VectorStore(inner) => {
                Ok(Component::new(name, Category::VectorStores, inner))
            },
            other => Err(other.mismatch(name, Category::VectorStores)),
        }
    }

    /// Wrap as a generator component
    pub fn into_llm(self, name: &str) -> Result<Component<dyn LlmModel>> {
        match self {
            Adapter::Llm(inner) => Ok(Component::new(name, Category::Llms, inner)),
            other => Err(other.mismatch(name, Category::Llms)),
        }
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Adapter({})", self.category())
    }
}

impl Component<dyn InputSource> {
    /// Load documents, then run the adapter's `post_load_data` hook
    pub async fn load_data(&self, args: &LoadArgs) -> Result<Vec<RawDocument>> {
        let _ready = self.ensure_ready("load_data").await?;
        let documents = self.inner.load_data(args).await?;
        self.inner.post_load_data(&documents).await?;
        Ok(documents)
    }
}

impl Component<dyn EmbeddingModel> {
    /// Embed texts, checking the output matches the input one-to-one
    pub async fn embed(&self, texts: &[String], options: &AdapterOptions) -> Result<Vec<Vec<f32>>> {
        let _ready = self.ensure_ready("embed").await?;
        let vectors = self.inner.embed(texts, options).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::validation(format!(
                "embedder '{}' returned {} vectors for {} texts",
                self.name(),
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

impl Component<dyn VectorStore> {
    /// Configured vector dimension
    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        let expected = self.inner.dimension();
        if vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Index a document
    pub async fn add(&self, document: &Document, vector: &[f32]) -> Result<()> {
        let _ready = self.ensure_ready("add").await?;
        self.check_dimension(vector)?;
        self.inner.add(document, vector).await
    }

    /// Remove a document by id
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _ready = self.ensure_ready("remove").await?;
        self.inner.remove(id).await
    }

    /// Nearest-neighbour search
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let _ready = self.ensure_ready("search").await?;
        self.check_dimension(query)?;
        self.inner.search(query, k).await
    }

    /// Rebuild the index
    pub async fn reindex(&self) -> Result<()> {
        let _ready = self.ensure_ready("reindex").await?;
        self.inner.reindex().await
    }
}

impl Component<dyn LlmModel> {
    /// Generate a completion and apply the adapter's output filter
    pub async fn generate(&self, prompt: &str, options: &AdapterOptions) -> Result<String> {
        let _ready = self.ensure_ready("generate").await?;
        let text = self.inner.generate(prompt, options).await?;
        Ok(self.inner.post_generate(text))
    }

    /// Stream a completion; `None` when the adapter does not stream
    pub async fn generate_stream(
        &self,
        prompt: &str,
        options: &AdapterOptions,
    ) -> Result<Option<TextStream>> {
        let _ready = self.ensure_ready("generate_stream").await?;
        self.inner.generate_stream(prompt, options).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::core::{ComponentState, PluginMetadata};

    struct FixedStore;

    #[async_trait]
    impl Lifecycle for FixedStore {
        fn version(&self) -> &str {
            "0.1.0"
        }

        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new("fixed_store", "0.1.0", "three-dimensional store")
        }

        async fn do_initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn do_validate(&self) -> Result<()> {
            Ok(())
        }

        async fn do_shutdown(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        fn dimension(&self) -> usize {
            3
        }

        async fn add(&self, _document: &Document, _vector: &[f32]) -> Result<()> {
            Ok(())
        }

        async fn remove(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }

        async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<ScoredDocument>> {
            Ok(Vec::new())
        }

        async fn reindex(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl EmbeddingModel for FixedStore {
        async fn embed(
            &self,
            _texts: &[String],
            _options: &AdapterOptions,
        ) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0; 3]])
        }
    }

    async fn ready<A: ?Sized + Lifecycle>(component: Component<A>) -> Component<A> {
        component.initialize().await.unwrap();
        component.validate().await.unwrap();
        component
    }

    #[tokio::test]
    async fn test_store_enforces_dimension() {
        let adapter = Adapter::VectorStore(Box::new(FixedStore));
        let store = ready(adapter.into_vector_store("fixed").unwrap()).await;
        let document = Document::new("a", "text");

        store.add(&document, &[1.0, 2.0, 3.0]).await.unwrap();
        let err = store.add(&document, &[1.0, 2.0]).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));

        let err = store.search(&[1.0; 4], 1).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 4 }));
    }

    #[tokio::test]
    async fn test_embedding_output_must_match_input_length() {
        let adapter = Adapter::Embedding(Box::new(FixedStore));
        let embedder = ready(adapter.into_embedding("fixed").unwrap()).await;
        let texts = vec!["one".to_string(), "two".to_string()];

        let err = embedder.embed(&texts, &AdapterOptions::new()).await.unwrap_err();
        assert!(matches!(err, RagError::Validation { .. }));
        assert_eq!(embedder.embed(&texts[..1], &AdapterOptions::new()).await.unwrap().len(), 1);
    }

    struct SlowEmbedder {
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Lifecycle for SlowEmbedder {
        fn version(&self) -> &str {
            "0.1.0"
        }

        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new("slow_embedder", "0.1.0", "takes its time")
        }

        async fn do_initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn do_validate(&self) -> Result<()> {
            Ok(())
        }

        async fn do_shutdown(&self) -> Result<()> {
            self.events.lock().push("shutdown");
            Ok(())
        }
    }

    #[async_trait]
    impl EmbeddingModel for SlowEmbedder {
        async fn embed(&self, texts: &[String], _options: &AdapterOptions) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.events.lock().push("embed");
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_calls() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let adapter = Adapter::Embedding(Box::new(SlowEmbedder {
            events: events.clone(),
        }));
        let embedder = ready(adapter.into_embedding("slow").unwrap()).await;
        let texts = vec!["one".to_string()];
        let options = AdapterOptions::new();

        let (embedded, shut_down) =
            tokio::join!(embedder.embed(&texts, &options), embedder.shutdown());
        embedded.unwrap();
        shut_down.unwrap();
        assert_eq!(*events.lock(), ["embed", "shutdown"]);

        let err = embedder.embed(&texts, &options).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::NotReady {
                actual: ComponentState::Shutdown,
                ..
            }
        ));
    }

    #[test]
    fn test_wrong_category_is_a_mismatch() {
        let err = Adapter::VectorStore(Box::new(FixedStore)).into_llm("fixed").unwrap_err();
        assert!(matches!(
            err,
            RagError::CategoryMismatch {
                expected: Category::Llms,
                actual: Category::VectorStores,
                ..
            }
        ));
    }
}
