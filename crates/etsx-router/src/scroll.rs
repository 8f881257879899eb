//! Scroll restoration
//!
//! Every session-history entry written by the router carries a state key.
//! Scroll offsets are saved under the key of the entry being left and
//! offered back to the [`ScrollBehavior`] when that entry is popped.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use etsx_router_core::Route;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::window::{BrowserWindow, Position};

/// Where to scroll after a navigation
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    Position(Position),
    /// Scroll to an element, minus `offset`
    Selector { selector: String, offset: Position },
}

impl ScrollTarget {
    pub fn selector(selector: impl Into<String>) -> Self {
        ScrollTarget::Selector {
            selector: selector.into(),
            offset: Position::default(),
        }
    }
}

/// Decides the scroll position after each committed navigation
///
/// `saved` is the position recorded for the entry, passed only for
/// back/forward navigations.
#[async_trait]
pub trait ScrollBehavior: Send + Sync {
    async fn scroll(&self, to: &Route, from: &Route, saved: Option<Position>) -> Option<ScrollTarget>;
}

/// Scroll behavior backed by a plain callback, see [`scroll_fn`]
pub struct FnScroll<F>(F);

/// Wrap a synchronous scroll callback
pub fn scroll_fn<F>(f: F) -> FnScroll<F>
where
    F: Fn(&Route, &Route, Option<Position>) -> Option<ScrollTarget> + Send + Sync,
{
    FnScroll(f)
}

#[async_trait]
impl<F> ScrollBehavior for FnScroll<F>
where
    F: Fn(&Route, &Route, Option<Position>) -> Option<ScrollTarget> + Send + Sync,
{
    async fn scroll(&self, to: &Route, from: &Route, saved: Option<Position>) -> Option<ScrollTarget> {
        (self.0)(to, from, saved)
    }
}

pub(crate) fn gen_state_key() -> String {
    Uuid::new_v4().to_string()
}

/// Saves and restores scroll offsets for the browser backends
pub struct ScrollCoordinator {
    window: Arc<dyn BrowserWindow>,
    behavior: Arc<dyn ScrollBehavior>,
    state_key: Mutex<String>,
    positions: Mutex<HashMap<String, Position>>,
    last_task: Mutex<Option<JoinHandle<()>>>,
}

impl ScrollCoordinator {
    /// Active only with a behavior and a window that supports `pushState`
    pub fn new(window: Arc<dyn BrowserWindow>, behavior: Option<Arc<dyn ScrollBehavior>>) -> Option<Arc<Self>> {
        let behavior = behavior?;
        if !window.supports_push_state() {
            return None;
        }
        Some(Arc::new(Self {
            window,
            behavior,
            state_key: Mutex::new(gen_state_key()),
            positions: Mutex::new(HashMap::new()),
            last_task: Mutex::new(None),
        }))
    }

    /// Tag the current entry with the current state key
    pub fn setup(&self) {
        let key = self.state_key();
        self.window.replace_state(&key, &self.window.location());
    }

    pub fn state_key(&self) -> String {
        self.state_key.lock().clone()
    }

    /// Switch to a fresh key for a new entry
    pub fn next_state_key(&self) -> String {
        let key = gen_state_key();
        *self.state_key.lock() = key.clone();
        key
    }

    /// Record the window offset under the current key
    pub fn save_position(&self) {
        let key = self.state_key();
        let position = self.window.scroll_position();
        self.positions.lock().insert(key, position);
    }

    /// Saved offset of the current entry
    pub fn saved_position(&self) -> Option<Position> {
        let key = self.state_key();
        self.positions.lock().get(&key).copied()
    }

    /// Leaving the active entry through back/forward
    pub fn on_pop(&self, state_key: Option<String>) {
        self.save_position();
        if let Some(key) = state_key {
            *self.state_key.lock() = key;
        }
    }

    /// Ask the behavior where to go and scroll there, off the navigation path
    pub fn handle(&self, to: Arc<Route>, from: Arc<Route>, is_pop: bool) {
        let saved = self.saved_position();
        let behavior = self.behavior.clone();
        let window = self.window.clone();

        let task = tokio::spawn(async move {
            let target = behavior
                .scroll(&to, &from, if is_pop { saved } else { None })
                .await;
            match target {
                Some(target) => apply_scroll(window.as_ref(), target, saved),
                None => debug!(to = %to.full_path(), "Scroll behavior declined to scroll"),
            }
        });
        *self.last_task.lock() = Some(task);
    }

    /// Wait for the most recent scroll to be applied
    pub async fn settled(&self) {
        let task = self.last_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Scroll task failed");
            }
        }
    }
}

fn apply_scroll(window: &dyn BrowserWindow, target: ScrollTarget, saved: Option<Position>) {
    let position = match target {
        ScrollTarget::Selector { selector, offset } => match window.element_position(&selector) {
            Some(element) => Some(Position::new(element.x - offset.x, element.y - offset.y)),
            None => {
                debug!(%selector, "Scroll selector did not match an element");
                saved
            }
        },
        ScrollTarget::Position(position) if position.is_valid() => Some(position),
        ScrollTarget::Position(position) => {
            warn!(?position, "Invalid scroll position, ignoring");
            None
        }
    };

    if let Some(position) = position {
        window.scroll_to(position);
    }
}
