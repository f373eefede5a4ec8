//! Pipeline orchestration
//!
//! One run walks
//! `[ConsolidatePreContext] → LoadData → Preprocess → ComputeEmbeddings →
//! StoreVectors → RetrieveAndGenerate → Done`. Each stage resolves its
//! adapter from the registry, drives it through the lifecycle on first use
//! and calls it through the circuit breaker of that adapter. Any failure
//! aborts the run and is returned with the stage it came from.

use std::path::Path;
use std::sync::Arc;

use futures::stream;

use crate::caching::{cache_key, key_prefix, EMBEDDINGS_STAGE};
use crate::core::{
    Adapter, AdapterOptions, Component, ComponentState, Document, EmbeddingModel, InputSource,
    Lifecycle, LlmModel, LoadArgs, RagError, RawDocument, Result, StageContext, TextStream,
    VectorStore,
};
use crate::pipeline::pre_context::{consolidate_pre_context, PreContext};
use crate::pipeline::preprocess::preprocess;
use crate::pipeline::{PipelineStage, RagContext};
use crate::registry::Category;

/// Prompt sent to the generator
pub fn build_prompt(context: &str, query: &str) -> String {
    format!("Context: {context}\nQuery: {query}")
}

/// Entry point for external callers
#[derive(Debug, Clone)]
pub struct Orchestrator {
    ctx: Arc<RagContext>,
}

impl Orchestrator {
    /// Orchestrator over a shared context
    pub fn new(ctx: Arc<RagContext>) -> Self {
        Self { ctx }
    }

    /// Shared context
    pub fn context(&self) -> &Arc<RagContext> {
        &self.ctx
    }

    /// Fresh run; components are activated lazily by its stages
    pub fn session(&self) -> PipelineRun {
        PipelineRun::new(self.ctx.clone())
    }

    /// Execute a full run and shut its components down, also on failure
    pub async fn run(&self, query: &str, context_path: Option<&Path>) -> Result<String> {
        let mut run = self.session();
        let result = run.execute(query, context_path).await;

        if let Err(e) = &result {
            tracing::error!(stage = ?e.stage(), category = e.category(), error = %e, "pipeline run failed");
        }
        if let Err(e) = run.shutdown().await {
            tracing::warn!(error = %e, "component shutdown failed after run");
        }
        result
    }

    /// Drop every cached embedding of `adapter`; returns how many were removed
    pub fn invalidate_embeddings(&self, adapter: &str) -> usize {
        self.ctx
            .cache()
            .clear_prefix(&key_prefix(EMBEDDINGS_STAGE, adapter))
    }
}

/// A component activated by a run
#[derive(Debug, Clone)]
pub enum ActiveComponent {
    /// Input source
    Input(Arc<Component<dyn InputSource>>),
    /// Embedding model
    Embedding(Arc<Component<dyn EmbeddingModel>>),
    /// Vector store
    VectorStore(Arc<Component<dyn VectorStore>>),
    /// Generator
    Llm(Arc<Component<dyn LlmModel>>),
}

impl ActiveComponent {
    /// Adapter name
    pub fn name(&self) -> &str {
        match self {
            ActiveComponent::Input(c) => c.name(),
            ActiveComponent::Embedding(c) => c.name(),
            ActiveComponent::VectorStore(c) => c.name(),
            ActiveComponent::Llm(c) => c.name(),
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> ComponentState {
        match self {
            ActiveComponent::Input(c) => c.state(),
            ActiveComponent::Embedding(c) => c.state(),
            ActiveComponent::VectorStore(c) => c.state(),
            ActiveComponent::Llm(c) => c.state(),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        match self {
            ActiveComponent::Input(c) => c.shutdown().await,
            ActiveComponent::Embedding(c) => c.shutdown().await,
            ActiveComponent::VectorStore(c) => c.shutdown().await,
            ActiveComponent::Llm(c) => c.shutdown().await,
        }
    }
}

/// State of a single run: the current stage and the components it owns
#[derive(Debug)]
pub struct PipelineRun {
    ctx: Arc<RagContext>,
    stage: PipelineStage,
    pre_context: PreContext,
    activated: Vec<ActiveComponent>,
}

impl PipelineRun {
    fn new(ctx: Arc<RagContext>) -> Self {
        Self {
            ctx,
            stage: PipelineStage::Pending,
            pre_context: PreContext::new(),
            activated: Vec::new(),
        }
    }

    /// Stage currently (or last) executing
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Pre-context merged by [`consolidate_pre_context`](Self::consolidate_pre_context)
    pub fn pre_context(&self) -> &PreContext {
        &self.pre_context
    }

    /// Components activated so far, in activation order
    pub fn components(&self) -> &[ActiveComponent] {
        &self.activated
    }

    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!(%stage, "entering stage");
        self.stage = stage;
    }

    async fn activate<A, F>(&self, category: Category, name: &str, wrap: F) -> Result<Arc<Component<A>>>
    where
        A: ?Sized + Lifecycle,
        F: FnOnce(Adapter, &str) -> Result<Component<A>>,
    {
        let entry = self.ctx.registry().get(category, name)?;
        let adapter = entry.instantiate(&self.ctx.adapter_context(name))?;
        let component = wrap(adapter, name)?;

        component.initialize().await?;
        if let Err(e) = component.validate().await {
            if let Err(shutdown_error) = component.shutdown().await {
                tracing::warn!(component = name, error = %shutdown_error, "shutdown after failed validation failed");
            }
            return Err(e);
        }

        tracing::info!(component = name, %category, version = component.version(), "component activated");
        Ok(Arc::new(component))
    }

    async fn input(&mut self) -> Result<Arc<Component<dyn InputSource>>> {
        if let Some(c) = self.activated.iter().find_map(|c| match c {
            ActiveComponent::Input(c) => Some(c.clone()),
            _ => None,
        }) {
            return Ok(c);
        }
        let name = self.ctx.config().adapters.input.clone();
        let c = self.activate(Category::Inputs, &name, Adapter::into_input).await?;
        self.activated.push(ActiveComponent::Input(c.clone()));
        Ok(c)
    }

    async fn embedder(&mut self) -> Result<Arc<Component<dyn EmbeddingModel>>> {
        if let Some(c) = self.activated.iter().find_map(|c| match c {
            ActiveComponent::Embedding(c) => Some(c.clone()),
            _ => None,
        }) {
            return Ok(c);
        }
        let name = self.ctx.config().adapters.embedder.clone();
        let c = self
            .activate(Category::Embeddings, &name, Adapter::into_embedding)
            .await?;
        self.activated.push(ActiveComponent::Embedding(c.clone()));
        Ok(c)
    }

    async fn vector_store(&mut self) -> Result<Arc<Component<dyn VectorStore>>> {
        if let Some(c) = self.activated.iter().find_map(|c| match c {
            ActiveComponent::VectorStore(c) => Some(c.clone()),
            _ => None,
        }) {
            return Ok(c);
        }
        let name = self.ctx.config().adapters.vector_store.clone();
        let c = self
            .activate(Category::VectorStores, &name, Adapter::into_vector_store)
            .await?;
        self.activated.push(ActiveComponent::VectorStore(c.clone()));
        Ok(c)
    }

    async fn llm(&mut self) -> Result<Arc<Component<dyn LlmModel>>> {
        if let Some(c) = self.activated.iter().find_map(|c| match c {
            ActiveComponent::Llm(c) => Some(c.clone()),
            _ => None,
        }) {
            return Ok(c);
        }
        let name = self.ctx.config().adapters.llm.clone();
        let c = self.activate(Category::Llms, &name, Adapter::into_llm).await?;
        self.activated.push(ActiveComponent::Llm(c.clone()));
        Ok(c)
    }

    /// Merge the pre-context JSON files under `dir`
    pub async fn consolidate_pre_context(&mut self, dir: &Path) -> Result<&PreContext> {
        self.enter(PipelineStage::ConsolidatePreContext);
        if !self.ctx.config().pre_context_enabled {
            tracing::info!("pre-context consolidation disabled");
            return Ok(&self.pre_context);
        }
        self.pre_context = consolidate_pre_context(dir)
            .await
            .at_stage(PipelineStage::ConsolidatePreContext)?;
        Ok(&self.pre_context)
    }

    /// Load documents from the input adapter and preprocess them
    pub async fn load_data(&mut self) -> Result<Vec<Document>> {
        self.enter(PipelineStage::LoadData);
        let raw = self.fetch_documents().await.at_stage(PipelineStage::LoadData)?;

        self.enter(PipelineStage::Preprocess);
        let documents = preprocess(raw);
        if documents.is_empty() {
            return Err(RagError::NoDocuments.at_stage(PipelineStage::Preprocess));
        }
        Ok(documents)
    }

    async fn fetch_documents(&mut self) -> Result<Vec<RawDocument>> {
        let input = self.input().await?;
        let breaker = self.ctx.breaker(Category::Inputs, input.name());
        let args = LoadArgs::new();
        let raw = breaker.call(|| input.load_data(&args)).await?;
        tracing::info!(component = input.name(), documents = raw.len(), "documents loaded");
        Ok(raw)
    }

    /// Embed `texts`, serving repeated batches from the cache
    pub async fn compute_embeddings(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.enter(PipelineStage::ComputeEmbeddings);
        self.embed_cached(texts)
            .await
            .at_stage(PipelineStage::ComputeEmbeddings)
    }

    async fn embed_cached(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedder = self.embedder().await?;
        let key = cache_key(EMBEDDINGS_STAGE, embedder.name(), texts);

        if let Some(vectors) = self.ctx.cache().get(&key) {
            tracing::debug!(component = embedder.name(), texts = texts.len(), "embedding cache hit");
            return Ok(vectors);
        }

        let breaker = self.ctx.breaker(Category::Embeddings, embedder.name());
        let options = AdapterOptions::new();
        let vectors = breaker.call(|| embedder.embed(texts, &options)).await?;

        self.ctx
            .cache()
            .set(key, vectors.clone(), self.ctx.config().cache.embedding_ttl());
        Ok(vectors)
    }

    /// Index each document under its vector, in order.
    ///
    /// Stops at the first failing pair. Pairs stored before the failure are
    /// kept; nothing is rolled back.
    pub async fn store_vectors(&mut self, documents: &[Document], vectors: &[Vec<f32>]) -> Result<()> {
        self.enter(PipelineStage::StoreVectors);
        if documents.len() != vectors.len() {
            return Err(RagError::validation(format!(
                "{} documents but {} vectors",
                documents.len(),
                vectors.len()
            ))
            .at_stage(PipelineStage::StoreVectors));
        }

        let store = self.vector_store().await.at_stage(PipelineStage::StoreVectors)?;
        let breaker = self.ctx.breaker(Category::VectorStores, store.name());

        for (stored, (document, vector)) in documents.iter().zip(vectors).enumerate() {
            if let Err(e) = breaker.call(|| store.add(document, vector)).await {
                tracing::warn!(
                    component = store.name(),
                    stored,
                    total = documents.len(),
                    failed_id = %document.id,
                    "vector insertion aborted"
                );
                return Err(e.at_stage(PipelineStage::StoreVectors));
            }
        }

        tracing::info!(component = store.name(), stored = documents.len(), "vectors stored");
        Ok(())
    }

    fn ensure_available(&self, service: &str) -> Result<()> {
        if self.ctx.gate().check_available(service) {
            Ok(())
        } else {
            Err(RagError::ServiceUnavailable {
                service: service.to_string(),
            })
        }
    }

    async fn retrieve_prompt(&mut self, query: &str) -> Result<String> {
        let adapters = &self.ctx.config().adapters;
        self.ensure_available(&adapters.vector_store)?;
        self.ensure_available(&adapters.llm)?;

        let query_vector = self
            .embed_cached(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::validation("embedder returned no query vector"))?;

        let store = self.vector_store().await?;
        let breaker = self.ctx.breaker(Category::VectorStores, store.name());
        let k = self.ctx.config().search_k;
        let hits = breaker.call(|| store.search(&query_vector, k)).await?;
        tracing::debug!(component = store.name(), k, hits = hits.len(), "retrieved documents");

        let context = hits
            .iter()
            .map(|hit| hit.document.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(build_prompt(&context, query))
    }

    /// Retrieve context for `query` and generate the answer
    pub async fn retrieve_and_generate(&mut self, query: &str) -> Result<String> {
        self.enter(PipelineStage::RetrieveAndGenerate);
        self.generate_answer(query)
            .await
            .at_stage(PipelineStage::RetrieveAndGenerate)
    }

    async fn generate_answer(&mut self, query: &str) -> Result<String> {
        let prompt = self.retrieve_prompt(query).await?;
        let llm = self.llm().await?;
        let breaker = self.ctx.breaker(Category::Llms, llm.name());
        let options = AdapterOptions::new();
        breaker.call(|| llm.generate(&prompt, &options)).await
    }

    /// Like [`retrieve_and_generate`](Self::retrieve_and_generate), streaming
    /// the answer; generators without streaming yield one chunk
    pub async fn retrieve_and_stream(&mut self, query: &str) -> Result<TextStream> {
        self.enter(PipelineStage::RetrieveAndGenerate);
        self.stream_answer(query)
            .await
            .at_stage(PipelineStage::RetrieveAndGenerate)
    }

    async fn stream_answer(&mut self, query: &str) -> Result<TextStream> {
        let prompt = self.retrieve_prompt(query).await?;
        let llm = self.llm().await?;
        let breaker = self.ctx.breaker(Category::Llms, llm.name());
        let options = AdapterOptions::new();

        if let Some(stream) = breaker.call(|| llm.generate_stream(&prompt, &options)).await? {
            return Ok(stream);
        }
        let answer = breaker.call(|| llm.generate(&prompt, &options)).await?;
        Ok(Box::pin(stream::once(async move { Ok(answer) })))
    }

    /// Run every stage in order
    pub async fn execute(&mut self, query: &str, context_path: Option<&Path>) -> Result<String> {
        if let Some(dir) = context_path {
            self.consolidate_pre_context(dir).await?;
        }

        let documents = self.load_data().await?;
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.compute_embeddings(&texts).await?;
        self.store_vectors(&documents, &vectors).await?;
        let answer = self.retrieve_and_generate(query).await?;

        self.enter(PipelineStage::Done);
        tracing::info!(documents = documents.len(), "pipeline run completed");
        Ok(answer)
    }

    /// Shut down every activated component, most recent first.
    ///
    /// All components are attempted; the first failure is returned.
    pub async fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        for component in self.activated.iter().rev() {
            if component.state() == ComponentState::Shutdown {
                continue;
            }
            if let Err(e) = component.shutdown().await {
                tracing::warn!(component = component.name(), error = %e, "component shutdown failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
