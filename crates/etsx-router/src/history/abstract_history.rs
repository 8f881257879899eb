//! In-memory backend for hosts without a browser window

use std::sync::Arc;

use async_trait::async_trait;
use etsx_router_core::Route;
use parking_lot::Mutex;
use tracing::debug;

use super::{CommitKind, History, HistoryBackend, ListenerHandle};
use crate::config::Mode;
use crate::error::NavigationOutcome;

#[derive(Default)]
struct Stack {
    entries: Vec<Arc<Route>>,
    index: Option<usize>,
}

/// Backend keeping session history as a route stack
#[derive(Default)]
pub struct AbstractHistory {
    stack: Mutex<Stack>,
}

impl AbstractHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full paths of all entries
    pub fn entries(&self) -> Vec<String> {
        self.stack
            .lock()
            .entries
            .iter()
            .map(|route| route.full_path().to_string())
            .collect()
    }

    /// Index of the active entry; `None` before the first commit
    pub fn index(&self) -> Option<usize> {
        self.stack.lock().index
    }
}

#[async_trait]
impl HistoryBackend for AbstractHistory {
    fn mode(&self) -> Mode {
        Mode::Abstract
    }

    fn commit(&self, to: &Arc<Route>, _from: &Arc<Route>, kind: CommitKind) {
        let mut stack = self.stack.lock();
        match kind {
            CommitKind::Initial | CommitKind::Push | CommitKind::Pop => {
                let keep = stack.index.map_or(0, |i| i + 1);
                stack.entries.truncate(keep);
                stack.entries.push(to.clone());
            }
            CommitKind::Replace => {
                let keep = stack.index.unwrap_or(0);
                stack.entries.truncate(keep);
                stack.entries.push(to.clone());
            }
            CommitKind::Traverse(index) => {
                stack.index = Some(index);
                return;
            }
            CommitKind::Reload => {
                if let Some(index) = stack.index {
                    stack.entries[index] = to.clone();
                    return;
                }
                stack.entries.push(to.clone());
            }
        }
        stack.index = Some(stack.entries.len() - 1);
    }

    async fn go(&self, history: &Arc<History>, n: i64) {
        let (index, route) = {
            let stack = self.stack.lock();
            let Some(index) = stack.index else {
                return;
            };
            let target = index as i64 + n;
            if target < 0 || target >= stack.entries.len() as i64 {
                debug!(index, n, "History go out of range, ignoring");
                return;
            }
            let target = target as usize;
            (target, stack.entries[target].clone())
        };

        // Traversing onto an identical route commits nothing, so move the index here
        if let Ok(NavigationOutcome::Duplicate) = history.confirm_route(route, CommitKind::Traverse(index)).await {
            self.stack.lock().index = Some(index);
        }
    }

    fn ensure_url(&self, _current: &Route, _push: bool) {}

    fn current_location(&self) -> String {
        let stack = self.stack.lock();
        stack
            .index
            .and_then(|index| stack.entries.get(index))
            .map(|route| route.full_path().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    fn start(&self, _history: &Arc<History>) -> Option<ListenerHandle> {
        None
    }
}
