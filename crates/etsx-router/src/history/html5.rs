//! `pushState` backend: routes live in the real URL path under `base`

use std::sync::Arc;

use async_trait::async_trait;
use etsx_router_core::{clean_path, is_start, normalize_base, Location, Route};
use tracing::debug;

use super::{CommitKind, History, HistoryBackend, ListenerHandle};
use crate::config::Mode;
use crate::scroll::{gen_state_key, ScrollBehavior, ScrollCoordinator};
use crate::window::{BrowserWindow, WindowEvent};

/// Router location of a browser URL: the part after `base`
pub(crate) fn get_location(url: &str, base: &str) -> String {
    let mut path = url;
    if !base.is_empty() {
        if let Some(head) = url.get(..base.len()) {
            let rest = &url[base.len()..];
            let on_boundary = rest.is_empty() || rest.starts_with(['/', '?', '#']);
            if head.eq_ignore_ascii_case(base) && on_boundary {
                path = rest;
            }
        }
    }

    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Add a session-history entry under a fresh state key
pub(crate) fn push_entry(window: &dyn BrowserWindow, scroll: Option<&ScrollCoordinator>, url: &str) {
    let key = match scroll {
        Some(scroll) => {
            scroll.save_position();
            scroll.next_state_key()
        }
        None => gen_state_key(),
    };
    window.push_state(&key, url);
}

/// Overwrite the active entry, keeping its state key
pub(crate) fn replace_entry(window: &dyn BrowserWindow, scroll: Option<&ScrollCoordinator>, url: &str) {
    let key = match scroll {
        Some(scroll) => {
            scroll.save_position();
            scroll.state_key()
        }
        None => window.state_key().unwrap_or_else(gen_state_key),
    };
    window.replace_state(&key, url);
}

/// Backend over the HTML5 history API
pub struct Html5History {
    window: Arc<dyn BrowserWindow>,
    base: String,
    scroll: Option<Arc<ScrollCoordinator>>,
    /// Location the page was opened at
    start_location: String,
}

impl Html5History {
    pub fn new(window: Arc<dyn BrowserWindow>, base: &str, scroll_behavior: Option<Arc<dyn ScrollBehavior>>) -> Self {
        let base = normalize_base(base);
        let scroll = ScrollCoordinator::new(window.clone(), scroll_behavior);
        if let Some(scroll) = &scroll {
            scroll.setup();
        }
        let start_location = get_location(&window.location(), &base);

        Self {
            window,
            base,
            scroll,
            start_location,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url_for(&self, full_path: &str) -> String {
        clean_path(&format!("{}{}", self.base, full_path))
    }
}

#[async_trait]
impl HistoryBackend for Html5History {
    fn mode(&self) -> Mode {
        Mode::History
    }

    fn commit(&self, to: &Arc<Route>, from: &Arc<Route>, kind: CommitKind) {
        let url = self.url_for(to.full_path());
        let scroll = self.scroll.as_deref();
        let is_pop = match kind {
            CommitKind::Push => {
                push_entry(self.window.as_ref(), scroll, &url);
                false
            }
            CommitKind::Replace => {
                replace_entry(self.window.as_ref(), scroll, &url);
                false
            }
            CommitKind::Pop => true,
            CommitKind::Initial | CommitKind::Traverse(_) => false,
            CommitKind::Reload => return,
        };

        if let Some(scroll) = &self.scroll {
            scroll.handle(to.clone(), from.clone(), is_pop);
        }
    }

    async fn go(&self, _history: &Arc<History>, n: i64) {
        self.window.go(n);
    }

    fn ensure_url(&self, current: &Route, push: bool) {
        if self.current_location() == current.full_path() {
            return;
        }
        let url = self.url_for(current.full_path());
        if push {
            push_entry(self.window.as_ref(), self.scroll.as_deref(), &url);
        } else {
            replace_entry(self.window.as_ref(), self.scroll.as_deref(), &url);
        }
    }

    fn current_location(&self) -> String {
        get_location(&self.window.location(), &self.base)
    }

    fn start(&self, history: &Arc<History>) -> Option<ListenerHandle> {
        let mut events = self.window.subscribe();
        let history = history.clone();
        let window = self.window.clone();
        let scroll = self.scroll.clone();
        let base = self.base.clone();
        let start_location = self.start_location.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let WindowEvent::PopState { state_key } = event else {
                    continue;
                };
                if let Some(scroll) = &scroll {
                    scroll.on_pop(state_key);
                }

                let location = get_location(&window.location(), &base);
                // Some browsers fire popstate for the initial entry on load
                if is_start(&history.current()) && location == start_location {
                    continue;
                }

                debug!(%location, "Popstate received");
                let history = history.clone();
                tokio::spawn(async move {
                    if let Err(e) = history.transition_to(Location::from(location), CommitKind::Pop).await {
                        debug!(error = %e, "Popstate navigation failed");
                    }
                });
            }
        });

        Some(ListenerHandle::new(task))
    }

    async fn scroll_settled(&self) {
        if let Some(scroll) = &self.scroll {
            scroll.settled().await;
        }
    }
}
