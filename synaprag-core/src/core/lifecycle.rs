//! Component lifecycle contract
//!
//! Every adapter moves through `CREATED → INITIALIZED → VALIDATED → SHUTDOWN`.
//! Adapters implement the [`Lifecycle`] hooks; the [`Component`] handle owns
//! the adapter, enforces the transition order and gates every capability
//! operation on the `VALIDATED` state, so adapters never check state
//! themselves.

use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::{PluginMetadata, RagError, Result};
use crate::registry::Category;

/// Lifecycle state of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    /// Constructed, no resources acquired
    Created,
    /// Resources acquired
    Initialized,
    /// Configuration and dependencies checked; capability operations allowed
    Validated,
    /// Resources released; terminal
    Shutdown,
}

impl ComponentState {
    /// Upper-case state label
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentState::Created => "CREATED",
            ComponentState::Initialized => "INITIALIZED",
            ComponentState::Validated => "VALIDATED",
            ComponentState::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hooks every adapter implements to take part in the lifecycle
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Adapter version, used for compatibility checks and auditing
    fn version(&self) -> &str;

    /// Descriptive metadata (name, description, dependencies, compatibility)
    fn metadata(&self) -> PluginMetadata;

    /// Acquire resources: connections, model handles, buffers
    async fn do_initialize(&self) -> Result<()>;

    /// Optional extension point run after `do_initialize`
    async fn post_initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Check credentials, dependency availability and configuration coherence
    async fn do_validate(&self) -> Result<()>;

    /// Optional extension point run after `do_validate`
    async fn post_validate(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources
    async fn do_shutdown(&self) -> Result<()>;
}

/// An adapter owned together with its lifecycle state.
///
/// `A` is normally one of the capability trait objects, e.g.
/// `Component<dyn VectorStore>`.
pub struct Component<A: ?Sized> {
    name: String,
    category: Category,
    state: RwLock<ComponentState>,
    // transitions hold it exclusively; capability calls hold it shared
    // until they return, so shutdown waits for calls in flight
    transition: tokio::sync::RwLock<()>,
    pub(crate) inner: Box<A>,
}

impl<A: ?Sized + Lifecycle> Component<A> {
    /// Wrap a freshly constructed adapter in state `CREATED`
    pub fn new(name: impl Into<String>, category: Category, inner: Box<A>) -> Self {
        let name = name.into();
        tracing::debug!(component = %name, %category, state = %ComponentState::Created, "component created");
        Self {
            name,
            category,
            state: RwLock::new(ComponentState::Created),
            transition: tokio::sync::RwLock::new(()),
            inner,
        }
    }

    /// Adapter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category the adapter belongs to
    pub fn category(&self) -> Category {
        self.category
    }

    /// Current lifecycle state
    pub fn state(&self) -> ComponentState {
        *self.state.read()
    }

    /// Adapter version
    pub fn version(&self) -> &str {
        self.inner.version()
    }

    /// Adapter metadata
    pub fn metadata(&self) -> PluginMetadata {
        self.inner.metadata()
    }

    /// `CREATED → INITIALIZED`
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.transition.write().await;
        self.expect_state(&[ComponentState::Created], "initialize")?;

        self.inner.do_initialize().await?;
        self.inner.post_initialize().await?;
        self.set_state(ComponentState::Initialized);
        Ok(())
    }

    /// `INITIALIZED → VALIDATED`
    pub async fn validate(&self) -> Result<()> {
        let _guard = self.transition.write().await;
        self.expect_state(&[ComponentState::Initialized], "validate")?;

        self.inner.do_validate().await?;
        self.inner.post_validate().await?;
        self.set_state(ComponentState::Validated);
        Ok(())
    }

    /// `INITIALIZED | VALIDATED → SHUTDOWN`
    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.transition.write().await;
        self.expect_state(
            &[ComponentState::Initialized, ComponentState::Validated],
            "shutdown",
        )?;

        self.inner.do_shutdown().await?;
        self.set_state(ComponentState::Shutdown);
        Ok(())
    }

    /// Fail with `NotReady` unless the component is `VALIDATED`.
    ///
    /// The returned guard blocks lifecycle transitions while it is alive. A
    /// stream returned by a capability call outlives it.
    pub(crate) async fn ensure_ready(
        &self,
        operation: &'static str,
    ) -> Result<tokio::sync::RwLockReadGuard<'_, ()>> {
        let guard = self.transition.read().await;
        let actual = self.state();
        if actual == ComponentState::Validated {
            return Ok(guard);
        }
        Err(RagError::NotReady {
            component: self.name.clone(),
            operation,
            required: ComponentState::Validated,
            actual,
        })
    }

    fn expect_state(&self, allowed: &[ComponentState], operation: &'static str) -> Result<()> {
        let from = self.state();
        if allowed.contains(&from) {
            return Ok(());
        }
        tracing::error!(component = %self.name, state = %from, operation, "illegal lifecycle transition");
        Err(RagError::InvalidTransition {
            component: self.name.clone(),
            from,
            operation,
        })
    }

    fn set_state(&self, next: ComponentState) {
        *self.state.write() = next;
        tracing::debug!(component = %self.name, state = %next, "component state changed");
    }
}

impl<A: ?Sized> fmt::Debug for Component<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}
