//! Public router API

use std::fmt;
use std::sync::Arc;

use etsx_router_core::{
    clean_path, create_route, is_included_route, is_same_route, is_start, normalize_base, normalize_location,
    ComponentSlot, Location, Matcher, NavigationGuard, Route, RouteConfig, RouterError,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::{Mode, RouterOptions, RouterSettings};
use crate::error::{NavigationError, NavigationResult};
use crate::history::{
    AbstractHistory, CommitKind, HashHistory, History, HistoryBackend, Html5History, ListenerHandle,
};
use crate::history::{ErrorCallback, ReadyErrorCallback};
use crate::hooks::{Hooks, UnHook};

/// Result of [`Router::resolve`]
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The normalized location
    pub location: Location,
    pub route: Arc<Route>,
    /// URL to put in a link's `href`
    pub href: String,
}

/// What a link to some location should render
#[derive(Debug, Clone)]
pub struct LinkState {
    pub href: String,
    pub route: Arc<Route>,
    /// The current route lies under the link target
    pub active: bool,
    /// The current route is the link target
    pub exact_active: bool,
    /// Classes to apply, from the configured link classes
    pub classes: Vec<String>,
}

struct RouterInner {
    settings: RouterSettings,
    mode: Mode,
    matcher: Arc<RwLock<Matcher>>,
    hooks: Arc<Hooks>,
    history: Arc<History>,
    listener: Mutex<Option<ListenerHandle>>,
}

/// Client-side router
///
/// Cheap to clone; all clones drive the same history.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("mode", &self.inner.mode)
            .field("base", &self.inner.settings.base)
            .field("current", &self.current_route().full_path())
            .finish()
    }
}

impl Router {
    /// Compile the route table and pick the history backend
    pub fn new(options: RouterOptions) -> Result<Self, RouterError> {
        let RouterOptions {
            routes,
            settings,
            parse_query,
            stringify_query,
            scroll_behavior,
            window,
        } = options;

        let mut matcher = Matcher::new(parse_query, stringify_query);
        matcher.add_routes(routes)?;

        let mode = settings.effective_mode(window.as_deref());
        let backend: Arc<dyn HistoryBackend> = match (mode, window) {
            (Mode::History, Some(window)) => Arc::new(Html5History::new(window, &settings.base, scroll_behavior)),
            (Mode::Hash, Some(window)) => {
                let fallback = settings.mode == Mode::History;
                Arc::new(HashHistory::new(window, &settings.base, fallback, scroll_behavior))
            }
            _ => Arc::new(AbstractHistory::new()),
        };

        info!(
            %mode,
            base = %settings.base,
            routes = matcher.paths().len(),
            "Router created"
        );

        let matcher = Arc::new(RwLock::new(matcher));
        let hooks = Arc::new(Hooks::default());
        let history = History::new(matcher.clone(), hooks.clone(), backend);

        Ok(Self {
            inner: Arc::new(RouterInner {
                settings,
                mode,
                matcher,
                hooks,
                history,
                listener: Mutex::new(None),
            }),
        })
    }

    /// Effective history mode
    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.inner.settings
    }

    pub fn history(&self) -> &Arc<History> {
        &self.inner.history
    }

    pub fn current_route(&self) -> Arc<Route> {
        self.inner.history.current()
    }

    pub fn pending_route(&self) -> Option<Arc<Route>> {
        self.inner.history.pending()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.history.is_ready()
    }

    /// Receiver that sees every committed route
    pub fn watch_route(&self) -> watch::Receiver<Arc<Route>> {
        self.inner.history.watch()
    }

    /// Navigate to the location the host shows, then follow host navigations
    pub async fn start(&self) -> NavigationResult {
        let history = &self.inner.history;
        let location = history.backend().current_location();
        debug!(%location, "Initial navigation");

        let result = history.transition_to(Location::from(location), CommitKind::Initial).await;
        *self.inner.listener.lock() = history.backend().start(history);
        result
    }

    /// Stop following host navigations
    pub fn shutdown(&self) {
        if self.inner.listener.lock().take().is_some() {
            info!("Router listener detached");
        }
    }

    pub async fn push(&self, to: impl Into<Location>) -> NavigationResult {
        self.inner.history.transition_to(to.into(), CommitKind::Push).await
    }

    pub async fn replace(&self, to: impl Into<Location>) -> NavigationResult {
        self.inner.history.transition_to(to.into(), CommitKind::Replace).await
    }

    /// Move `n` entries through history
    ///
    /// Browser modes return once the move is requested; the navigation
    /// itself follows from the window's event.
    pub async fn go(&self, n: i64) {
        let history = &self.inner.history;
        history.backend().go(history, n).await;
    }

    pub async fn back(&self) {
        self.go(-1).await;
    }

    pub async fn forward(&self) {
        self.go(1).await;
    }

    /// Register a guard run before every navigation
    pub fn before_each(&self, guard: impl NavigationGuard + 'static) -> UnHook {
        self.inner.hooks.add_before_each(Arc::new(guard))
    }

    /// Register a guard run after in-component enter guards and lazy loading
    pub fn before_resolve(&self, guard: impl NavigationGuard + 'static) -> UnHook {
        self.inner.hooks.add_before_resolve(Arc::new(guard))
    }

    /// Register a notification run after every commit
    pub fn after_each<F>(&self, hook: F) -> UnHook
    where
        F: Fn(&Arc<Route>, &Arc<Route>) + Send + Sync + 'static,
    {
        self.inner.hooks.add_after_each(Arc::new(hook))
    }

    /// Run `cb` once the first navigation commits, or `err_cb` if it fails
    pub fn on_ready<F>(&self, cb: F, err_cb: Option<ReadyErrorCallback>)
    where
        F: FnOnce(&Arc<Route>) + Send + 'static,
    {
        self.inner.history.on_ready(Box::new(cb), err_cb);
    }

    pub fn on_error<F>(&self, cb: F)
    where
        F: Fn(&NavigationError) + Send + Sync + 'static,
    {
        let cb: ErrorCallback = Arc::new(cb);
        self.inner.history.on_error(cb);
    }

    /// Add routes at runtime; a started router re-resolves its location against them
    pub async fn add_routes(&self, routes: Vec<RouteConfig>) -> Result<(), NavigationError> {
        self.inner.matcher.write().add_routes(routes)?;

        let history = &self.inner.history;
        if is_start(&history.current()) {
            return Ok(());
        }
        let location = history.backend().current_location();
        history.transition_to(Location::from(location), CommitKind::Reload).await?;
        Ok(())
    }

    /// Resolve `to` without navigating
    pub fn resolve(
        &self,
        to: impl Into<Location>,
        current: Option<&Route>,
        append: bool,
    ) -> Result<Resolved, RouterError> {
        let fallback = self.current_route();
        let current = current.unwrap_or(&fallback);

        let matcher = self.inner.matcher.read();
        let location = normalize_location(&to.into(), Some(current), append, matcher.parse_query())?;
        let route = matcher.match_location(&location, Some(current), None)?;
        let href = self.href(route.redirected_from().unwrap_or(route.full_path()));

        Ok(Resolved { location, route, href })
    }

    /// Views of every record matched by `to`, or by the current route
    pub fn get_matched_components(&self, to: Option<Location>) -> Result<Vec<ComponentSlot>, RouterError> {
        let route = match to {
            Some(to) => self.resolve(to, None, false)?.route,
            None => self.current_route(),
        };
        Ok(route
            .matched()
            .iter()
            .flat_map(|record| record.components().values().cloned())
            .collect())
    }

    /// Link rendering state for `to` against the current route
    pub fn link_state(&self, to: impl Into<Location>, append: bool) -> Result<LinkState, RouterError> {
        let Resolved { route, href, .. } = self.resolve(to, None, append)?;

        // A redirecting link is compared by where it points, not where it lands
        let compare = match route.redirected_from() {
            Some(from) => {
                let matcher = self.inner.matcher.read();
                let location = normalize_location(&Location::from(from), None, false, matcher.parse_query())?;
                create_route(None, &location, None, matcher.stringify_query())
            }
            None => route.clone(),
        };

        let current = self.current_route();
        let exact_active = is_same_route(&current, Some(&*compare));
        let active = exact_active || is_included_route(&current, &compare);

        let settings = &self.inner.settings;
        let mut classes = Vec::new();
        if active {
            classes.push(settings.link_active_class.clone());
        }
        if exact_active {
            classes.push(settings.link_exact_active_class.clone());
        }

        Ok(LinkState {
            href,
            route,
            active,
            exact_active,
            classes,
        })
    }

    /// Wait until the last scroll triggered by a navigation is applied
    pub async fn scroll_settled(&self) {
        self.inner.history.backend().scroll_settled().await;
    }

    fn href(&self, full_path: &str) -> String {
        let path = match self.inner.mode {
            Mode::Hash => format!("#{full_path}"),
            _ => full_path.to_string(),
        };
        let base = normalize_base(&self.inner.settings.base);
        if base.is_empty() {
            path
        } else {
            clean_path(&format!("{base}/{path}"))
        }
    }
}
