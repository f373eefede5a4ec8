//! Adapter discovery over an explicit registration namespace
//!
//! Adapter modules are registered up front into an [`AdapterNamespace`]: one
//! "directory" per [`Category`], each holding uniquely named [`ModuleSpec`]s.
//! [`discover`] walks the namespace, loads every eligible unit and indexes
//! the resulting factories. A failing unit is recorded and skipped; it never
//! aborts the rest of its category. Units older than a minimum version
//! registered with [`AdapterNamespace::require`] fail the same way.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{
    check_compatibility, CompatibilityRequirement, PluginMetadata, RagError, Result,
};
use crate::registry::{AdapterFactory, Category, RegistryEntry};

/// Unit names that act as an index/manifest for their directory
const INDEX_UNITS: &[&str] = &["index", "mod", "__init__"];

/// What a module yields when it is loaded
#[derive(Clone)]
pub struct LoadedModule {
    /// Module metadata, validated before registration
    pub metadata: PluginMetadata,
    /// Factory creating adapter instances
    pub factory: AdapterFactory,
}

/// Loader run once per discovery pass
pub type ModuleLoader = Arc<dyn Fn() -> Result<LoadedModule> + Send + Sync>;

/// A loadable unit inside a category directory
#[derive(Clone)]
pub struct ModuleSpec {
    name: String,
    loader: ModuleLoader,
}

impl ModuleSpec {
    /// Create a unit from a loader closure
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<LoadedModule> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader: Arc::new(loader),
        }
    }

    /// Unit name, unique within its category
    pub fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<LoadedModule> {
        (self.loader)()
    }
}

impl fmt::Debug for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSpec").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Root namespace: category directories of registered modules
#[derive(Debug, Clone, Default)]
pub struct AdapterNamespace {
    directories: BTreeMap<Category, Vec<ModuleSpec>>,
    requirements: Vec<CompatibilityRequirement>,
}

impl AdapterNamespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit under `category`
    pub fn register(&mut self, category: Category, module: ModuleSpec) {
        self.directories.entry(category).or_default().push(module);
    }

    /// Register a unit and continue building
    pub fn with_module<F>(mut self, category: Category, name: &str, loader: F) -> Self
    where
        F: Fn() -> Result<LoadedModule> + Send + Sync + 'static,
    {
        self.register(category, ModuleSpec::new(name, loader));
        self
    }

    /// Register an adapter factory in the category it provides
    pub fn with_adapter(self, name: &str, metadata: PluginMetadata, factory: AdapterFactory) -> Self {
        let category = factory.category();
        let module = LoadedModule { metadata, factory };
        self.with_module(category, name, move || Ok(module.clone()))
    }

    /// Reject units named `name` whose metadata version is below `min_version`
    pub fn require(mut self, name: &str, min_version: &str) -> Self {
        self.requirements.push(CompatibilityRequirement {
            name: name.to_string(),
            min_version: min_version.to_string(),
        });
        self
    }

    /// Minimum versions checked during discovery
    pub fn requirements(&self) -> &[CompatibilityRequirement] {
        &self.requirements
    }

    /// Units registered under `category`, in registration order
    pub fn units(&self, category: Category) -> &[ModuleSpec] {
        self.directories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of registered units, eligible or not
    pub fn len(&self) -> usize {
        self.directories.values().map(Vec::len).sum()
    }

    /// Whether no unit is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A unit that failed to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryError {
    /// Category directory of the unit
    pub category: Category,
    /// Unit name
    pub unit: String,
    /// Failure description
    pub message: String,
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.category, self.unit, self.message)
    }
}

/// Category maps produced by a discovery pass
pub type RegistryMap = BTreeMap<Category, BTreeMap<String, RegistryEntry>>;

/// Result of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Every category, each mapping unit name to its entry
    pub registry: RegistryMap,
    /// Units that failed to load
    pub errors: Vec<DiscoveryError>,
}

impl DiscoveryReport {
    /// Number of registered units across categories
    pub fn unit_count(&self) -> usize {
        self.registry.values().map(BTreeMap::len).sum()
    }
}

/// Whether a unit name takes part in discovery.
///
/// Index/manifest units and private (`_`-prefixed) units are skipped.
pub fn is_eligible(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('_') && !INDEX_UNITS.contains(&name)
}

fn load_unit(
    category: Category,
    module: &ModuleSpec,
    requirements: &[CompatibilityRequirement],
) -> Result<RegistryEntry> {
    let loaded = module.load()?;
    loaded.metadata.validate()?;
    if !check_compatibility(&loaded.metadata, requirements) {
        return Err(RagError::Metadata {
            plugin: loaded.metadata.name.clone(),
            message: format!(
                "version {} is below the required minimum",
                loaded.metadata.version
            ),
        });
    }

    let provided = loaded.factory.category();
    if provided != category {
        return Err(RagError::CategoryMismatch {
            name: module.name().to_string(),
            expected: category,
            actual: provided,
        });
    }

    Ok(RegistryEntry {
        category,
        name: module.name().to_string(),
        metadata: loaded.metadata,
        factory: loaded.factory,
    })
}

/// Walk `namespace` and index every loadable unit by category and name
pub fn discover(namespace: &AdapterNamespace) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    for category in Category::ALL {
        let entries = report.registry.entry(category).or_default();

        for module in namespace.units(category) {
            if !is_eligible(module.name()) {
                tracing::debug!(%category, unit = module.name(), "skipping ineligible unit");
                continue;
            }
            if entries.contains_key(module.name()) {
                let error = DiscoveryError {
                    category,
                    unit: module.name().to_string(),
                    message: "duplicate unit name".to_string(),
                };
                tracing::error!(%error, "discovery failed for unit");
                report.errors.push(error);
                continue;
            }

            match load_unit(category, module, namespace.requirements()) {
                Ok(entry) => {
                    tracing::info!(%category, unit = module.name(), version = %entry.metadata.version, "discovered adapter");
                    entries.insert(entry.name.clone(), entry);
                },
                Err(e) => {
                    let error = DiscoveryError {
                        category,
                        unit: module.name().to_string(),
                        message: e.to_string(),
                    };
                    tracing::error!(%error, "discovery failed for unit");
                    report.errors.push(error);
                },
            }
        }
    }

    tracing::info!(
        units = report.unit_count(),
        errors = report.errors.len(),
        "discovery finished"
    );
    report
}
