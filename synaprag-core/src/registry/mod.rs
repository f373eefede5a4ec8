//! Adapter registry
//!
//! Maps `(category, name)` to a typed adapter factory. The registry is
//! populated by [`discovery::discover`] on first use (or explicitly through
//! [`AdapterRegistry::load`]) and is read-mostly afterwards: readers clone an
//! `Arc` snapshot under a short read lock, while reloads build a complete new
//! snapshot off to the side and swap it in with a single assignment.

pub mod discovery;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::availability::AvailabilityGate;
use crate::core::{
    Adapter, AdapterOptions, EmbeddingModel, InputSource, LlmModel, PluginMetadata, RagError,
    Result, VectorStore,
};

pub use discovery::{
    discover, is_eligible, AdapterNamespace, DiscoveryError, DiscoveryReport, LoadedModule,
    ModuleLoader, ModuleSpec, RegistryMap,
};

/// Adapter categories; fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Document sources
    Inputs,
    /// Embedding models
    Embeddings,
    /// Vector stores
    VectorStores,
    /// Generators
    #[serde(rename = "LLMs")]
    Llms,
}

impl Category {
    /// Every category, in pipeline order
    pub const ALL: [Category; 4] = [
        Category::Inputs,
        Category::Embeddings,
        Category::VectorStores,
        Category::Llms,
    ];

    /// Directory name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Inputs => "Inputs",
            Category::Embeddings => "Embeddings",
            Category::VectorStores => "VectorStores",
            Category::Llms => "LLMs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RagError::config(format!("unknown adapter category '{s}'")))
    }
}

/// Everything a factory gets to build one adapter instance
#[derive(Clone)]
pub struct AdapterContext {
    /// Registered adapter name
    pub name: String,
    /// Adapter settings from configuration
    pub settings: AdapterOptions,
    /// Gate the adapter consults in `do_validate`
    pub gate: Arc<dyn AvailabilityGate>,
}

impl AdapterContext {
    /// Context with the given settings
    pub fn new(
        name: impl Into<String>,
        settings: AdapterOptions,
        gate: Arc<dyn AvailabilityGate>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            gate,
        }
    }

    /// String setting
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    /// Unsigned integer setting with a default; present but invalid values fail
    pub fn setting_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.settings.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    RagError::config(format!(
                        "adapter '{}': setting '{key}' must be a non-negative integer",
                        self.name
                    ))
                }),
        }
    }
}

impl fmt::Debug for AdapterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterContext")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

type FactoryFn<T> = Arc<dyn Fn(&AdapterContext) -> Result<Box<T>> + Send + Sync>;

/// Typed constructor for one capability
#[derive(Clone)]
pub enum AdapterFactory {
    /// Builds input sources
    Input(FactoryFn<dyn InputSource>),
    /// Builds embedding models
    Embedding(FactoryFn<dyn EmbeddingModel>),
    /// Builds vector stores
    VectorStore(FactoryFn<dyn VectorStore>),
    /// Builds generators
    Llm(FactoryFn<dyn LlmModel>),
}

impl AdapterFactory {
    /// Factory for an input source
    pub fn input<F, A>(build: F) -> Self
    where
        F: Fn(&AdapterContext) -> Result<A> + Send + Sync + 'static,
        A: InputSource + 'static,
    {
        AdapterFactory::Input(Arc::new(move |ctx: &AdapterContext| {
            Ok(Box::new(build(ctx)?) as Box<dyn InputSource>)
        }))
    }

    /// Factory for an embedding model
    pub fn embedding<F, A>(build: F) -> Self
    where
        F: Fn(&AdapterContext) -> Result<A> + Send + Sync + 'static,
        A: EmbeddingModel + 'static,
    {
        AdapterFactory::Embedding(Arc::new(move |ctx: &AdapterContext| {
            Ok(Box::new(build(ctx)?) as Box<dyn EmbeddingModel>)
        }))
    }

    /// Factory for a vector store
    pub fn vector_store<F, A>(build: F) -> Self
    where
        F: Fn(&AdapterContext) -> Result<A> + Send + Sync + 'static,
        A: VectorStore + 'static,
    {
        AdapterFactory::VectorStore(Arc::new(move |ctx: &AdapterContext| {
            Ok(Box::new(build(ctx)?) as Box<dyn VectorStore>)
        }))
    }

    /// Factory for a generator
    pub fn llm<F, A>(build: F) -> Self
    where
        F: Fn(&AdapterContext) -> Result<A> + Send + Sync + 'static,
        A: LlmModel + 'static,
    {
        AdapterFactory::Llm(Arc::new(move |ctx: &AdapterContext| {
            Ok(Box::new(build(ctx)?) as Box<dyn LlmModel>)
        }))
    }

    /// Category of the adapters this factory builds
    pub fn category(&self) -> Category {
        match self {
            AdapterFactory::Input(_) => Category::Inputs,
            AdapterFactory::Embedding(_) => Category::Embeddings,
            AdapterFactory::VectorStore(_) => Category::VectorStores,
            AdapterFactory::Llm(_) => Category::Llms,
        }
    }

    /// Build a fresh adapter instance
    pub fn build(&self, ctx: &AdapterContext) -> Result<Adapter> {
        Ok(match self {
            AdapterFactory::Input(f) => Adapter::Input(f(ctx)?),
            AdapterFactory::Embedding(f) => Adapter::Embedding(f(ctx)?),
            AdapterFactory::VectorStore(f) => Adapter::VectorStore(f(ctx)?),
            AdapterFactory::Llm(f) => Adapter::Llm(f(ctx)?),
        })
    }
}

impl fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdapterFactory({})", self.category())
    }
}

/// A registered adapter
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Category directory
    pub category: Category,
    /// Unique name within the category
    pub name: String,
    /// Validated plugin metadata
    pub metadata: PluginMetadata,
    /// Instance factory
    pub factory: AdapterFactory,
}

impl RegistryEntry {
    /// Build a fresh adapter instance
    pub fn instantiate(&self, ctx: &AdapterContext) -> Result<Adapter> {
        self.factory.build(ctx)
    }
}

/// Result of [`AdapterRegistry::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Discovery already ran and no reload was requested
    AlreadyLoaded,
    /// A discovery pass ran
    Loaded {
        /// Units registered
        units: usize,
        /// Units that failed to load
        errors: usize,
    },
}

/// Category name → entry map handed out to readers
pub type CategoryMap = Arc<BTreeMap<String, RegistryEntry>>;

#[derive(Debug, Default)]
struct Snapshot {
    categories: BTreeMap<Category, CategoryMap>,
    errors: Vec<DiscoveryError>,
    loaded_at: Option<DateTime<Utc>>,
    generation: u64,
}

/// Thread-safe runtime index of adapters
pub struct AdapterRegistry {
    namespace: AdapterNamespace,
    snapshot: RwLock<Arc<Snapshot>>,
    // serializes discovery passes and removals
    load_lock: Mutex<()>,
    loaded: AtomicBool,
}

impl AdapterRegistry {
    /// Registry over `namespace`; nothing is discovered until first use
    pub fn new(namespace: AdapterNamespace) -> Self {
        Self {
            namespace,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            load_lock: Mutex::new(()),
            loaded: AtomicBool::new(false),
        }
    }

    /// The namespace discovery scans
    pub fn namespace(&self) -> &AdapterNamespace {
        &self.namespace
    }

    /// Run discovery.
    ///
    /// Without `force_reload` this is a no-op once a pass has completed.
    /// With it, the whole registry is rebuilt and replaced atomically;
    /// concurrent readers see either the old or the new map, never a mix.
    pub fn load(&self, force_reload: bool) -> LoadOutcome {
        if !force_reload && self.is_loaded() {
            return LoadOutcome::AlreadyLoaded;
        }

        let _guard = self.load_lock.lock();
        // another caller may have finished discovery while we waited
        if !force_reload && self.is_loaded() {
            return LoadOutcome::AlreadyLoaded;
        }

        let report = discover(&self.namespace);
        let units = report.unit_count();
        let errors = report.errors.len();
        let generation = self.snapshot.read().generation + 1;

        let next = Snapshot {
            categories: report
                .registry
                .into_iter()
                .map(|(category, entries)| (category, Arc::new(entries)))
                .collect(),
            errors: report.errors,
            loaded_at: Some(Utc::now()),
            generation,
        };
        *self.snapshot.write() = Arc::new(next);
        self.loaded.store(true, Ordering::Release);

        tracing::info!(units, errors, generation, force_reload, "adapter registry loaded");
        LoadOutcome::Loaded { units, errors }
    }

    fn current(&self) -> Arc<Snapshot> {
        self.load(false);
        self.snapshot.read().clone()
    }

    /// All adapters of `category`; triggers the first discovery if needed
    pub fn get_available(&self, category: Category) -> CategoryMap {
        self.current()
            .categories
            .get(&category)
            .cloned()
            .unwrap_or_default()
    }

    /// Look up one adapter
    pub fn get(&self, category: Category, name: &str) -> Result<RegistryEntry> {
        self.get_available(category)
            .get(name)
            .cloned()
            .ok_or_else(|| RagError::AdapterNotFound {
                category,
                name: name.to_string(),
            })
    }

    /// Remove an adapter until the next forced reload
    pub fn remove(&self, category: Category, name: &str) -> Option<RegistryEntry> {
        self.load(false);
        let _guard = self.load_lock.lock();

        let current = self.snapshot.read().clone();
        let entries = current.categories.get(&category)?;
        if !entries.contains_key(name) {
            return None;
        }

        let mut remaining = BTreeMap::clone(entries);
        let removed = remaining.remove(name);
        let mut categories = current.categories.clone();
        categories.insert(category, Arc::new(remaining));

        *self.snapshot.write() = Arc::new(Snapshot {
            categories,
            errors: current.errors.clone(),
            loaded_at: current.loaded_at,
            generation: current.generation,
        });
        tracing::info!(%category, adapter = name, "adapter removed from registry");
        removed
    }

    /// Units that failed during the last discovery pass
    pub fn discovery_errors(&self) -> Vec<DiscoveryError> {
        self.snapshot.read().errors.clone()
    }

    /// Whether a discovery pass has completed
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// When the last discovery pass completed
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().loaded_at
    }

    /// Number of completed discovery passes
    pub fn generation(&self) -> u64 {
        self.snapshot.read().generation
    }

    /// Total registered adapters across categories
    pub fn len(&self) -> usize {
        let snapshot = self.current();
        snapshot.categories.values().map(|entries| entries.len()).sum()
    }

    /// Whether no adapter is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot.read();
        f.debug_struct("AdapterRegistry")
            .field("loaded", &self.is_loaded())
            .field("generation", &snapshot.generation)
            .field(
                "categories",
                &snapshot
                    .categories
                    .iter()
                    .map(|(category, entries)| (*category, entries.len()))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}
