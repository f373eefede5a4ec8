//! Plugin metadata for adapters
//!
//! Every adapter module describes itself with a [`PluginMetadata`] record.
//! Discovery validates the required fields before a module is admitted to
//! the registry, and [`check_compatibility`] compares the declared version
//! against externally published minimum versions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::{RagError, Result};

/// Metadata describing an adapter plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name, normally the adapter name
    pub name: String,

    /// Plugin version (dotted numeric, e.g. "1.2.0")
    pub version: String,

    /// Short human readable description
    pub description: String,

    /// Libraries or services this plugin relies on
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,

    /// Minimum runtime requirements (memory, GPU, ...)
    #[serde(default)]
    pub min_requirements: Option<String>,

    /// Compatibility range of the host this plugin was written against
    #[serde(default)]
    pub compatibility: Option<String>,
}

impl PluginMetadata {
    /// Create metadata with the required fields
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Set the dependency list
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    /// Set the minimum requirements
    pub fn with_min_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.min_requirements = Some(requirements.into());
        self
    }

    /// Set the compatibility range
    pub fn with_compatibility(mut self, compatibility: impl Into<String>) -> Self {
        self.compatibility = Some(compatibility.into());
        self
    }

    /// Validate that the required fields are present.
    ///
    /// Missing optional fields are logged and tolerated.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("name", &self.name),
            ("version", &self.version),
            ("description", &self.description),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| *field)
        .collect();

        if !missing.is_empty() {
            let plugin = if self.name.trim().is_empty() {
                "unknown".to_string()
            } else {
                self.name.clone()
            };
            tracing::error!(plugin = %plugin, ?missing, "plugin metadata incomplete");
            return Err(RagError::Metadata {
                plugin,
                message: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        for (field, present) in [
            ("dependencies", self.dependencies.is_some()),
            ("min_requirements", self.min_requirements.is_some()),
            ("compatibility", self.compatibility.is_some()),
        ] {
            if !present {
                tracing::warn!(plugin = %self.name, field, "optional metadata field not present");
            }
        }

        tracing::debug!(plugin = %self.name, version = %self.version, "plugin metadata validated");
        Ok(())
    }
}

/// Minimum version published for a plugin by an external model registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRequirement {
    /// Plugin name the requirement applies to
    pub name: String,
    /// Minimum accepted version
    pub min_version: String,
}

/// Check a plugin against published requirements.
///
/// Returns `false` when a requirement names the plugin and demands a newer
/// version than the one it declares.
pub fn check_compatibility(
    metadata: &PluginMetadata,
    requirements: &[CompatibilityRequirement],
) -> bool {
    for requirement in requirements.iter().filter(|r| r.name == metadata.name) {
        if compare_versions(&metadata.version, &requirement.min_version) == Ordering::Less {
            tracing::warn!(
                plugin = %metadata.name,
                version = %metadata.version,
                required = %requirement.min_version,
                "plugin version below required minimum"
            );
            return false;
        }
    }
    true
}

/// Compare dotted numeric versions ("1.10.0" > "1.9.3").
///
/// Missing components count as zero; non-numeric components compare as
/// strings.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let l: Vec<&str> = left.trim().split('.').collect();
    let r: Vec<&str> = right.trim().split('.').collect();

    for i in 0..l.len().max(r.len()) {
        let a = l.get(i).copied().unwrap_or("0");
        let b = r.get(i).copied().unwrap_or("0");
        let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
