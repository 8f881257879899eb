//! View components attached to route records
//!
//! Rendering is the host's business; the router only needs a component's
//! in-component guards and, for lazily loaded views, a way to load it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::guard::{GuardRef, NavigationGuard};

/// A view component and its in-component guards
#[derive(Clone, Default)]
pub struct ComponentDef {
    name: String,
    before_route_enter: Vec<GuardRef>,
    before_route_update: Vec<GuardRef>,
    before_route_leave: Vec<GuardRef>,
}

impl std::fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("enter_guards", &self.before_route_enter.len())
            .field("update_guards", &self.before_route_update.len())
            .field("leave_guards", &self.before_route_leave.len())
            .finish()
    }
}

impl ComponentDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn on_enter(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_route_enter.push(Arc::new(guard));
        self
    }

    pub fn on_update(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_route_update.push(Arc::new(guard));
        self
    }

    pub fn on_leave(mut self, guard: impl NavigationGuard + 'static) -> Self {
        self.before_route_leave.push(Arc::new(guard));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn before_route_enter(&self) -> &[GuardRef] {
        &self.before_route_enter
    }

    pub fn before_route_update(&self) -> &[GuardRef] {
        &self.before_route_update
    }

    pub fn before_route_leave(&self) -> &[GuardRef] {
        &self.before_route_leave
    }
}

/// Loads a component on first activation
#[async_trait]
pub trait ComponentLoader: Send + Sync {
    async fn load(&self) -> Result<ComponentDef, String>;
}

/// Lazily loaded component with its cached resolution
pub struct LazyComponent {
    loader: Arc<dyn ComponentLoader>,
    resolved: RwLock<Option<Arc<ComponentDef>>>,
}

/// A view slot of a route record
#[derive(Clone)]
pub enum ComponentSlot {
    Resolved(Arc<ComponentDef>),
    Lazy(Arc<LazyComponent>),
}

impl std::fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentSlot::Resolved(def) => f.debug_tuple("Resolved").field(def).finish(),
            ComponentSlot::Lazy(lazy) => f
                .debug_tuple("Lazy")
                .field(&lazy.resolved.read().as_ref().map(|d| d.name().to_string()))
                .finish(),
        }
    }
}

impl ComponentSlot {
    pub fn lazy(loader: impl ComponentLoader + 'static) -> Self {
        ComponentSlot::Lazy(Arc::new(LazyComponent {
            loader: Arc::new(loader),
            resolved: RwLock::new(None),
        }))
    }

    /// The component, if it is available without loading
    pub fn resolved(&self) -> Option<Arc<ComponentDef>> {
        match self {
            ComponentSlot::Resolved(def) => Some(def.clone()),
            ComponentSlot::Lazy(lazy) => lazy.resolved.read().clone(),
        }
    }

    pub fn needs_load(&self) -> bool {
        self.resolved().is_none()
    }

    /// Load the component if needed and cache it in the slot
    pub async fn resolve(&self) -> Result<Arc<ComponentDef>, String> {
        match self {
            ComponentSlot::Resolved(def) => Ok(def.clone()),
            ComponentSlot::Lazy(lazy) => {
                let cached = lazy.resolved.read().clone();
                if let Some(def) = cached {
                    return Ok(def);
                }
                let def = Arc::new(lazy.loader.load().await?);
                *lazy.resolved.write() = Some(def.clone());
                Ok(def)
            }
        }
    }
}

impl From<ComponentDef> for ComponentSlot {
    fn from(def: ComponentDef) -> Self {
        ComponentSlot::Resolved(Arc::new(def))
    }
}
