//! Fragment backend: routes live after `#`

use std::sync::Arc;

use async_trait::async_trait;
use etsx_router_core::{clean_path, Location, Route};
use tracing::debug;

use super::html5::{get_location, push_entry, replace_entry};
use super::{CommitKind, History, HistoryBackend, ListenerHandle};
use crate::config::Mode;
use crate::scroll::{ScrollBehavior, ScrollCoordinator};
use crate::window::{BrowserWindow, WindowEvent};

/// Everything after the first `#`
pub(crate) fn get_hash(url: &str) -> String {
    url.find('#').map(|i| url[i + 1..].to_string()).unwrap_or_default()
}

/// `url` with its fragment replaced by `path`
fn get_url(url: &str, path: &str) -> String {
    let head = url.find('#').map(|i| &url[..i]).unwrap_or(url);
    format!("{head}#{path}")
}

/// Backend keeping the route in the URL fragment
pub struct HashHistory {
    window: Arc<dyn BrowserWindow>,
    base: String,
    scroll: Option<Arc<ScrollCoordinator>>,
}

impl HashHistory {
    /// `fallback` is set when history mode was requested but `pushState` is missing
    pub fn new(
        window: Arc<dyn BrowserWindow>,
        base: &str,
        fallback: bool,
        scroll_behavior: Option<Arc<dyn ScrollBehavior>>,
    ) -> Self {
        let scroll = ScrollCoordinator::new(window.clone(), scroll_behavior);
        if let Some(scroll) = &scroll {
            scroll.setup();
        }
        let history = Self {
            window,
            base: etsx_router_core::normalize_base(base),
            scroll,
        };

        if !(fallback && history.check_fallback()) {
            history.ensure_slash();
        }
        history
    }

    /// Move a path-style URL under the fragment; returns true if the page was redirected
    fn check_fallback(&self) -> bool {
        let location = get_location(&self.window.location(), &self.base);
        if location.starts_with("/#") {
            return false;
        }
        let url = clean_path(&format!("{}/#{}", self.base, location));
        debug!(%url, "Falling back to hash mode");
        self.window.replace_location(&url);
        true
    }

    fn ensure_slash(&self) -> bool {
        ensure_slash(self.window.as_ref(), self.scroll.as_deref())
    }

    fn push_hash(&self, path: &str) {
        if self.window.supports_push_state() {
            let url = get_url(&self.window.location(), path);
            push_entry(self.window.as_ref(), self.scroll.as_deref(), &url);
        } else {
            self.window.set_hash(path);
        }
    }

    fn replace_hash(&self, path: &str) {
        replace_hash(self.window.as_ref(), self.scroll.as_deref(), path);
    }
}

fn replace_hash(window: &dyn BrowserWindow, scroll: Option<&ScrollCoordinator>, path: &str) {
    let url = get_url(&window.location(), path);
    if window.supports_push_state() {
        replace_entry(window, scroll, &url);
    } else {
        window.replace_location(&url);
    }
}

/// Make the fragment start with `/`; returns false if it had to be rewritten
fn ensure_slash(window: &dyn BrowserWindow, scroll: Option<&ScrollCoordinator>) -> bool {
    let path = get_hash(&window.location());
    if path.starts_with('/') {
        return true;
    }
    replace_hash(window, scroll, &format!("/{path}"));
    false
}

#[async_trait]
impl HistoryBackend for HashHistory {
    fn mode(&self) -> Mode {
        Mode::Hash
    }

    fn commit(&self, to: &Arc<Route>, from: &Arc<Route>, kind: CommitKind) {
        let is_pop = match kind {
            CommitKind::Push => {
                self.push_hash(to.full_path());
                false
            }
            CommitKind::Replace => {
                self.replace_hash(to.full_path());
                false
            }
            CommitKind::Pop => {
                if !self.window.supports_push_state() {
                    self.replace_hash(to.full_path());
                }
                true
            }
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
        if get_hash(&self.window.location()) == current.full_path() {
            return;
        }
        if push {
            self.push_hash(current.full_path());
        } else {
            self.replace_hash(current.full_path());
        }
    }

    fn current_location(&self) -> String {
        get_hash(&self.window.location())
    }

    fn start(&self, history: &Arc<History>) -> Option<ListenerHandle> {
        let mut events = self.window.subscribe();
        let use_popstate = self.window.supports_push_state();
        let history = history.clone();
        let window = self.window.clone();
        let scroll = self.scroll.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    WindowEvent::PopState { state_key } if use_popstate => {
                        if let Some(scroll) = &scroll {
                            scroll.on_pop(state_key);
                        }
                    }
                    WindowEvent::HashChange if !use_popstate => {}
                    _ => continue,
                }

                if !ensure_slash(window.as_ref(), scroll.as_deref()) {
                    continue;
                }
                let location = get_hash(&window.location());
                debug!(%location, "Hash changed");

                let history = history.clone();
                tokio::spawn(async move {
                    if let Err(e) = history.transition_to(Location::from(location), CommitKind::Pop).await {
                        debug!(error = %e, "Hash navigation failed");
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
