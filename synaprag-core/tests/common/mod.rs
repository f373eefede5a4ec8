//! Test doubles shared by the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use synaprag_core::config::AdapterSelection;
use synaprag_core::core::{AdapterOptions, DocumentMetadata, LoadArgs};
use synaprag_core::{
    AdapterFactory, AdapterNamespace, BreakerConfig, Document, EmbeddingModel, InputSource,
    Lifecycle, LlmModel, PluginMetadata, RagConfig, RagContext, RagError, RawDocument, Result,
    ScoredDocument, VectorStore,
};
use tracing_subscriber::EnvFilter;

pub const INPUT: &str = "dummy_input";
pub const EMBEDDER: &str = "dummy_embedder";
pub const STORE: &str = "dummy_store";
pub const LLM: &str = "dummy_llm";

/// Ordered record of lifecycle hook invocations, e.g. `"shutdown:dummy_llm"`
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Route pipeline logs to the test output; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn metadata(name: &str) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::new();
    metadata.insert("source".to_string(), json!(name));
    metadata
}

pub fn doc(id: &str, text: &str) -> RawDocument {
    RawDocument::new(id, text).with_metadata(metadata("fixture"))
}

/// Knobs and probes shared between a test and the adapters it registers
#[derive(Clone)]
pub struct Fixture {
    pub journal: Journal,
    pub documents: Vec<RawDocument>,
    pub embed_calls: Arc<AtomicUsize>,
    /// Transient embedding failures still to inject
    pub embed_failures: Arc<AtomicUsize>,
    pub embed_always_fails: Arc<AtomicBool>,
    /// Index of the `add` call that fails, if any
    pub fail_add_at: Option<usize>,
    pub stored: Arc<Mutex<Vec<String>>>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            journal: Arc::default(),
            documents: vec![
                doc("doc-1", "Rust ownership rules"),
                doc("doc-2", "Circuit breakers isolate failures"),
            ],
            embed_calls: Arc::default(),
            embed_failures: Arc::default(),
            embed_always_fails: Arc::default(),
            fail_add_at: None,
            stored: Arc::default(),
        }
    }
}

impl Fixture {
    pub fn with_documents(documents: Vec<RawDocument>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn journal_entries(&self, prefix: &str) -> Vec<String> {
        self.journal
            .lock()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn namespace(&self) -> AdapterNamespace {
        let input = self.clone();
        let embedder = self.clone();
        let store = self.clone();
        let llm = self.clone();

        AdapterNamespace::new()
            .with_adapter(
                INPUT,
                PluginMetadata::new(INPUT, "1.0.0", "fixture documents"),
                AdapterFactory::input(move |_| {
                    Ok(DummyInput {
                        fixture: input.clone(),
                    })
                }),
            )
            .with_adapter(
                EMBEDDER,
                PluginMetadata::new(EMBEDDER, "1.0.0", "two-element embeddings"),
                AdapterFactory::embedding(move |_| {
                    Ok(DummyEmbedder {
                        fixture: embedder.clone(),
                    })
                }),
            )
            .with_adapter(
                STORE,
                PluginMetadata::new(STORE, "1.0.0", "recording vector store"),
                AdapterFactory::vector_store(move |_| {
                    Ok(DummyStore {
                        fixture: store.clone(),
                        documents: Mutex::new(Vec::new()),
                    })
                }),
            )
            .with_adapter(
                LLM,
                PluginMetadata::new(LLM, "1.0.0", "echoing generator"),
                AdapterFactory::llm(move |_| {
                    Ok(DummyLlm {
                        fixture: llm.clone(),
                    })
                }),
            )
    }

    pub fn config(&self) -> RagConfig {
        RagConfig {
            adapters: AdapterSelection {
                input: INPUT.to_string(),
                embedder: EMBEDDER.to_string(),
                vector_store: STORE.to_string(),
                llm: LLM.to_string(),
            },
            search_k: 2,
            circuit_breaker: BreakerConfig {
                failure_threshold: 3,
                recovery_timeout_ms: 1_000,
                success_threshold: 2,
                backoff_factor: 2.0,
                initial_backoff_ms: 10,
                max_backoff_ms: 1_000,
            },
            ..RagConfig::default()
        }
    }

    pub fn context(&self) -> Arc<RagContext> {
        self.context_with(self.config())
    }

    pub fn context_with(&self, config: RagConfig) -> Arc<RagContext> {
        init_tracing();
        RagContext::builder(config)
            .namespace(self.namespace())
            .gate(|_: &str| true)
            .build()
            .expect("fixture context")
    }
}

macro_rules! fixture_lifecycle {
    ($adapter:ty, $name:expr) => {
        #[async_trait]
        impl Lifecycle for $adapter {
            fn version(&self) -> &str {
                "1.0.0"
            }

            fn metadata(&self) -> PluginMetadata {
                PluginMetadata::new($name, "1.0.0", "test double")
            }

            async fn do_initialize(&self) -> Result<()> {
                self.fixture.journal.lock().push(format!("init:{}", $name));
                Ok(())
            }

            async fn do_validate(&self) -> Result<()> {
                self.fixture.journal.lock().push(format!("validate:{}", $name));
                Ok(())
            }

            async fn do_shutdown(&self) -> Result<()> {
                self.fixture.journal.lock().push(format!("shutdown:{}", $name));
                Ok(())
            }
        }
    };
}

pub struct DummyInput {
    fixture: Fixture,
}

fixture_lifecycle!(DummyInput, INPUT);

#[async_trait]
impl InputSource for DummyInput {
    async fn load_data(&self, _args: &LoadArgs) -> Result<Vec<RawDocument>> {
        Ok(self.fixture.documents.clone())
    }
}

pub struct DummyEmbedder {
    fixture: Fixture,
}

fixture_lifecycle!(DummyEmbedder, EMBEDDER);

#[async_trait]
impl EmbeddingModel for DummyEmbedder {
    async fn embed(&self, texts: &[String], _options: &AdapterOptions) -> Result<Vec<Vec<f32>>> {
        self.fixture.embed_calls.fetch_add(1, Ordering::SeqCst);

        if self.fixture.embed_always_fails.load(Ordering::SeqCst) {
            return Err(RagError::transient(EMBEDDER, "upstream unavailable"));
        }
        let injected = self
            .fixture
            .embed_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(RagError::transient(EMBEDDER, "connection reset"));
        }

        Ok(texts
            .iter()
            .map(|text| vec![text.len() as f32, 1.0])
            .collect())
    }
}

pub struct DummyStore {
    fixture: Fixture,
    documents: Mutex<Vec<Document>>,
}

fixture_lifecycle!(DummyStore, STORE);

#[async_trait]
impl VectorStore for DummyStore {
    fn dimension(&self) -> usize {
        2
    }

    async fn add(&self, document: &Document, _vector: &[f32]) -> Result<()> {
        let mut stored = self.fixture.stored.lock();
        if self.fixture.fail_add_at == Some(stored.len()) {
            return Err(RagError::adapter(STORE, "disk full"));
        }
        stored.push(document.id.clone());
        self.documents.lock().push(document.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut documents = self.documents.lock();
        let before = documents.len();
        documents.retain(|d| d.id != id);
        Ok(documents.len() != before)
    }

    async fn search(&self, _query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        Ok(self
            .documents
            .lock()
            .iter()
            .take(k)
            .map(|document| ScoredDocument {
                document: document.clone(),
                score: 1.0,
            })
            .collect())
    }

    async fn reindex(&self) -> Result<()> {
        Ok(())
    }
}

pub struct DummyLlm {
    fixture: Fixture,
}

fixture_lifecycle!(DummyLlm, LLM);

#[async_trait]
impl LlmModel for DummyLlm {
    async fn generate(&self, prompt: &str, _options: &AdapterOptions) -> Result<String> {
        Ok(format!("Respuesta-Dummy para: {prompt}"))
    }
}
