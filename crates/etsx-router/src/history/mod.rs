//! History backends
//!
//! [`History`] is the navigation state machine shared by every mode. A
//! [`HistoryBackend`] persists what it commits: browser session history,
//! the URL fragment, or an in-memory stack.
//!
//! ```text
//!             ┌──────────── History ─────────────┐
//! push ──────►│ resolve → guards → commit current │──► backend.commit(to, from, kind)
//!             └──────────────▲───────────────────┘
//!                            │ Pop
//!                    backend listener (popstate / hashchange)
//! ```

mod base;
mod html5;
mod hash;
mod abstract_history;

use std::sync::Arc;

use async_trait::async_trait;
use etsx_router_core::Route;
use tokio::task::JoinHandle;

use crate::config::Mode;

pub use base::{ErrorCallback, History, ReadyCallback, ReadyErrorCallback};
pub use html5::Html5History;
pub use hash::HashHistory;
pub use abstract_history::AbstractHistory;

/// How a committed route is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// First navigation after start; the URL is already there
    Initial,
    Push,
    Replace,
    /// Back/forward reported by the window
    Pop,
    /// In-memory traversal to the given stack index
    Traverse(usize),
    /// Re-resolution of the active location after the route table changed
    Reload,
}

/// Persistence strategy behind a [`History`]
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    fn mode(&self) -> Mode;

    /// Persist a committed route
    fn commit(&self, to: &Arc<Route>, from: &Arc<Route>, kind: CommitKind);

    /// Move `n` entries through history
    async fn go(&self, history: &Arc<History>, n: i64);

    /// Bring the URL in line with `current`
    fn ensure_url(&self, current: &Route, push: bool);

    /// Location the host currently shows
    fn current_location(&self) -> String;

    /// Start listening for host-driven navigations
    fn start(&self, history: &Arc<History>) -> Option<ListenerHandle>;

    /// Wait for pending scroll work
    async fn scroll_settled(&self) {}
}

/// Listener task of a backend; detaches when dropped
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
