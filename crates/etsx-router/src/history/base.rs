//! Navigation state machine shared by all history modes

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use etsx_router_core::{is_same_route, start_route, Location, Matcher, Route, MAX_REDIRECT_HOPS};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

use super::{CommitKind, HistoryBackend};
use crate::error::{NavigationError, NavigationOutcome, NavigationResult};
use crate::hooks::Hooks;
use crate::pipeline::{
    enter_guards, enter_record_guards, leave_guards, resolve_components, resolve_queue, run_guards,
    update_guards, Verdict,
};

/// Called once with the first committed route
pub type ReadyCallback = Box<dyn FnOnce(&Arc<Route>) + Send>;

/// Called once if the router fails before its first commit
pub type ReadyErrorCallback = Box<dyn FnOnce(&NavigationError) + Send>;

/// Called for every navigation error
pub type ErrorCallback = Arc<dyn Fn(&NavigationError) + Send + Sync>;

struct HistoryState {
    current: Arc<Route>,
    pending: Option<Arc<Route>>,
    /// Bumped by every navigation; only the holder of the latest value may commit
    token: u64,
    ready: bool,
    ready_cbs: Vec<ReadyCallback>,
    ready_error_cbs: Vec<ReadyErrorCallback>,
    error_cbs: Vec<ErrorCallback>,
    /// Errors raised while no error callback was registered
    unhandled: Vec<NavigationError>,
}

enum Step {
    Done(NavigationResult),
    Redirect(Location),
}

/// Navigation state machine
///
/// Resolves targets, runs the guard pipeline, commits the winner and hands
/// it to the backend. Only the most recently started navigation commits.
pub struct History {
    matcher: Arc<RwLock<Matcher>>,
    hooks: Arc<Hooks>,
    backend: Arc<dyn HistoryBackend>,
    state: Mutex<HistoryState>,
    route_tx: watch::Sender<Arc<Route>>,
    superseded: Notify,
}

fn same_leaf(a: &Route, b: &Route) -> bool {
    a.matched().len() == b.matched().len()
        && match (a.matched().last(), b.matched().last()) {
            (Some(x), Some(y)) => Arc::ptr_eq(x, y),
            (None, None) => true,
            _ => false,
        }
}

impl History {
    pub(crate) fn new(matcher: Arc<RwLock<Matcher>>, hooks: Arc<Hooks>, backend: Arc<dyn HistoryBackend>) -> Arc<Self> {
        let start = start_route();
        let (route_tx, _) = watch::channel(start.clone());
        Arc::new(Self {
            matcher,
            hooks,
            backend,
            state: Mutex::new(HistoryState {
                current: start,
                pending: None,
                token: 0,
                ready: false,
                ready_cbs: Vec::new(),
                ready_error_cbs: Vec::new(),
                error_cbs: Vec::new(),
                unhandled: Vec::new(),
            }),
            route_tx,
            superseded: Notify::new(),
        })
    }

    pub fn current(&self) -> Arc<Route> {
        self.state.lock().current.clone()
    }

    /// Route of the navigation in flight, if any
    pub fn pending(&self) -> Option<Arc<Route>> {
        self.state.lock().pending.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn backend(&self) -> &Arc<dyn HistoryBackend> {
        &self.backend
    }

    /// Subscribe to committed routes
    pub fn watch(&self) -> watch::Receiver<Arc<Route>> {
        self.route_tx.subscribe()
    }

    pub fn on_ready(&self, cb: ReadyCallback, err_cb: Option<ReadyErrorCallback>) {
        let current = {
            let mut state = self.state.lock();
            if !state.ready {
                state.ready_cbs.push(cb);
                if let Some(err_cb) = err_cb {
                    state.ready_error_cbs.push(err_cb);
                }
                return;
            }
            state.current.clone()
        };
        cb(&current);
    }

    /// Register an error callback; errors raised before any was registered are flushed into it
    pub fn on_error(&self, cb: ErrorCallback) {
        let buffered = {
            let mut state = self.state.lock();
            state.error_cbs.push(cb.clone());
            std::mem::take(&mut state.unhandled)
        };
        for err in &buffered {
            cb(err);
        }
    }

    /// Resolve `location` against the current route and navigate to it
    pub async fn transition_to(&self, location: Location, kind: CommitKind) -> NavigationResult {
        let current = self.current();
        let route = self.resolve(&location, &current, None).map_err(|e| self.report(e))?;
        self.run(route, kind).await
    }

    /// Navigate to an already resolved route
    pub async fn confirm_route(&self, route: Arc<Route>, kind: CommitKind) -> NavigationResult {
        self.run(route, kind).await
    }

    fn resolve(
        &self,
        location: &Location,
        current: &Route,
        redirected_from: Option<&Location>,
    ) -> Result<Arc<Route>, NavigationError> {
        let route = self
            .matcher
            .read()
            .match_location(location, Some(current), redirected_from)?;
        Ok(route)
    }

    async fn run(&self, route: Arc<Route>, kind: CommitKind) -> NavigationResult {
        let mut route = route;
        let mut kind = kind;
        let mut origin: Option<Location> = None;
        let mut hops = 0;

        loop {
            match self.confirm(route.clone(), kind).await {
                Step::Done(result) => return result.map_err(|e| self.report(e)),
                Step::Redirect(target) => {
                    hops += 1;
                    if hops > MAX_REDIRECT_HOPS {
                        return Err(self.report(NavigationError::RedirectLoop {
                            hops,
                            path: route.full_path().to_string(),
                        }));
                    }
                    debug!(
                        from = %route.full_path(),
                        to = ?target.path.as_deref().or(target.name.as_deref()),
                        hops,
                        "Navigation redirected by guard"
                    );

                    let origin = origin.get_or_insert_with(|| route.to_location()).clone();
                    kind = if target.replace {
                        CommitKind::Replace
                    } else {
                        CommitKind::Push
                    };
                    let current = self.current();
                    route = self
                        .resolve(&target, &current, Some(&origin))
                        .map_err(|e| self.report(e))?;
                }
            }
        }
    }

    async fn confirm(&self, route: Arc<Route>, kind: CommitKind) -> Step {
        let current = self.current();

        // Same target: resync the URL, run nothing
        if is_same_route(&route, Some(&*current)) && same_leaf(&route, &current) {
            debug!(path = %route.full_path(), "Duplicate navigation, skipping guards");
            self.backend.ensure_url(&current, false);
            return Step::Done(Ok(NavigationOutcome::Duplicate));
        }

        // Take over from any navigation in flight
        let token = {
            let mut state = self.state.lock();
            state.token += 1;
            state.pending = Some(route.clone());
            state.token
        };
        self.superseded.notify_waiters();
        debug!(
            from = %current.full_path(),
            to = %route.full_path(),
            token,
            "Transition started"
        );

        let is_live = || self.state.lock().token == token;
        let diff = resolve_queue(current.matched(), route.matched());

        // Leave, beforeEach, update, beforeEnter
        let mut queue = leave_guards(&diff);
        queue.extend(self.hooks.before_each());
        queue.extend(update_guards(&diff));
        queue.extend(enter_record_guards(&diff));
        let verdict = run_guards(&queue, &route, &current, is_live).await;
        if !matches!(verdict, Verdict::Proceed) {
            return self.settle(verdict, &route, &current, token).await;
        }

        // Lazy views
        if let Err(err) = resolve_components(&diff.activated).await {
            if !is_live() {
                return Step::Done(Ok(NavigationOutcome::Superseded));
            }
            self.clear_pending(token);
            self.backend.ensure_url(&current, true);
            return Step::Done(Err(err));
        }

        // Enter, beforeResolve
        let mut queue = enter_guards(&diff);
        queue.extend(self.hooks.before_resolve());
        let verdict = run_guards(&queue, &route, &current, is_live).await;
        if !matches!(verdict, Verdict::Proceed) {
            return self.settle(verdict, &route, &current, token).await;
        }

        Step::Done(self.commit(route, kind, token))
    }

    async fn settle(&self, verdict: Verdict, to: &Route, from: &Route, token: u64) -> Step {
        // A late verdict from a navigation that lost its token touches nothing
        let live = self.state.lock().token == token;
        let verdict = match verdict {
            Verdict::Abort | Verdict::Fail(_) | Verdict::Redirect(_) if !live => Verdict::Stale,
            verdict => verdict,
        };
        match verdict {
            Verdict::Proceed => Step::Done(Ok(NavigationOutcome::Superseded)),
            Verdict::Stale => {
                debug!(to = %to.full_path(), token, "Navigation superseded");
                Step::Done(Ok(NavigationOutcome::Superseded))
            }
            Verdict::Stranded => {
                debug!(to = %to.full_path(), token, "Guard dropped its next handle, waiting for a newer navigation");
                self.wait_superseded(token).await;
                Step::Done(Ok(NavigationOutcome::Superseded))
            }
            Verdict::Abort => {
                self.clear_pending(token);
                self.backend.ensure_url(from, true);
                Step::Done(Err(NavigationError::Aborted {
                    from: from.full_path().to_string(),
                    to: to.full_path().to_string(),
                }))
            }
            Verdict::Fail(reason) => {
                self.clear_pending(token);
                self.backend.ensure_url(from, true);
                Step::Done(Err(NavigationError::Guard {
                    from: from.full_path().to_string(),
                    to: to.full_path().to_string(),
                    reason,
                }))
            }
            Verdict::Redirect(target) => {
                self.clear_pending(token);
                Step::Redirect(target)
            }
        }
    }

    fn commit(&self, route: Arc<Route>, kind: CommitKind, token: u64) -> NavigationResult {
        let (prev, ready_cbs) = {
            let mut state = self.state.lock();
            if state.token != token {
                return Ok(NavigationOutcome::Superseded);
            }
            state.pending = None;
            let prev = std::mem::replace(&mut state.current, route.clone());
            let ready_cbs = if state.ready {
                Vec::new()
            } else {
                state.ready = true;
                state.ready_error_cbs.clear();
                std::mem::take(&mut state.ready_cbs)
            };
            (prev, ready_cbs)
        };

        self.route_tx.send_replace(route.clone());
        self.backend.commit(&route, &prev, kind);
        self.backend.ensure_url(&route, false);

        for hook in self.hooks.after_each() {
            if std::panic::catch_unwind(AssertUnwindSafe(|| hook(&route, &prev))).is_err() {
                warn!(to = %route.full_path(), "afterEach hook panicked");
            }
        }
        for cb in ready_cbs {
            cb(&route);
        }

        debug!(
            from = %prev.full_path(),
            to = %route.full_path(),
            ?kind,
            "Navigation committed"
        );
        Ok(NavigationOutcome::Committed(route))
    }

    fn clear_pending(&self, token: u64) {
        let mut state = self.state.lock();
        if state.token == token {
            state.pending = None;
        }
    }

    async fn wait_superseded(&self, token: u64) {
        loop {
            let notified = self.superseded.notified();
            if self.state.lock().token != token {
                return;
            }
            notified.await;
        }
    }

    /// Deliver a navigation error to the registered callbacks
    fn report(&self, err: NavigationError) -> NavigationError {
        let (error_cbs, ready_error_cbs) = {
            let mut state = self.state.lock();
            let ready_error_cbs = if state.ready {
                Vec::new()
            } else {
                state.ready = true;
                state.ready_cbs.clear();
                std::mem::take(&mut state.ready_error_cbs)
            };
            let error_cbs = if !err.is_error() {
                Vec::new()
            } else if state.error_cbs.is_empty() {
                warn!(error = %err, "Uncaught error during route navigation");
                state.unhandled.push(err.clone());
                Vec::new()
            } else {
                state.error_cbs.clone()
            };
            (error_cbs, ready_error_cbs)
        };

        for cb in &error_cbs {
            cb(&err);
        }
        for cb in ready_error_cbs {
            cb(&err);
        }
        err
    }
}
