//! Guard pipeline runner
//!
//! Guards run strictly one after another. Each one gets a fresh [`Next`]
//! handle and the runner waits for that handle, not for the guard call
//! itself, so a guard may resolve it later from another task.
//!
//! ```text
//! leave (deepest first) → beforeEach → update → beforeEnter
//!     → load lazy views → enter → beforeResolve → commit → afterEach
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use etsx_router_core::{ComponentDef, GuardRef, Location, Next, NextAction, Route, RouteRecord};
use futures::future::try_join_all;
use futures::{pin_mut, select, FutureExt};
use tracing::trace;

use crate::error::NavigationError;

/// How the records of the current and the next route relate
#[derive(Debug, Default)]
pub(crate) struct RouteDiff {
    /// Records kept, their views are reused
    pub updated: Vec<Arc<RouteRecord>>,
    /// Records entered
    pub activated: Vec<Arc<RouteRecord>>,
    /// Records left
    pub deactivated: Vec<Arc<RouteRecord>>,
}

/// Split two matched chains at the first differing record
pub(crate) fn resolve_queue(current: &[Arc<RouteRecord>], next: &[Arc<RouteRecord>]) -> RouteDiff {
    let shared = current
        .iter()
        .zip(next.iter())
        .take_while(|(a, b)| Arc::ptr_eq(a, b))
        .count();

    RouteDiff {
        updated: next[..shared].to_vec(),
        activated: next[shared..].to_vec(),
        deactivated: current[shared..].to_vec(),
    }
}

fn component_guards(
    records: &[Arc<RouteRecord>],
    pick: fn(&ComponentDef) -> &[GuardRef],
    deepest_first: bool,
) -> Vec<GuardRef> {
    let mut per_view: Vec<Vec<GuardRef>> = records
        .iter()
        .flat_map(|record| record.components().values())
        .filter_map(|slot| slot.resolved())
        .map(|def| pick(def.as_ref()).to_vec())
        .collect();
    if deepest_first {
        per_view.reverse();
    }
    per_view.into_iter().flatten().collect()
}

/// `beforeRouteLeave` of the views being left, deepest first
pub(crate) fn leave_guards(diff: &RouteDiff) -> Vec<GuardRef> {
    component_guards(&diff.deactivated, ComponentDef::before_route_leave, true)
}

/// `beforeRouteUpdate` of the views being reused
pub(crate) fn update_guards(diff: &RouteDiff) -> Vec<GuardRef> {
    component_guards(&diff.updated, ComponentDef::before_route_update, false)
}

/// `beforeEnter` of the records being entered
pub(crate) fn enter_record_guards(diff: &RouteDiff) -> Vec<GuardRef> {
    diff.activated
        .iter()
        .filter_map(|record| record.before_enter().cloned())
        .collect()
}

/// `beforeRouteEnter` of the views being entered; call after loading them
pub(crate) fn enter_guards(diff: &RouteDiff) -> Vec<GuardRef> {
    component_guards(&diff.activated, ComponentDef::before_route_enter, false)
}

/// Load every lazy view of the entered records
pub(crate) async fn resolve_components(activated: &[Arc<RouteRecord>]) -> Result<(), NavigationError> {
    let loads = activated.iter().flat_map(|record| {
        record
            .components()
            .iter()
            .filter(|(_, slot)| slot.needs_load())
            .map(move |(view, slot)| async move {
                trace!(record = %record.path(), %view, "Loading lazy view");
                slot.resolve().await.map_err(|reason| NavigationError::ComponentLoad {
                    path: record.path().to_string(),
                    view: view.clone(),
                    reason,
                })
            })
    });
    try_join_all(loads).await?;
    Ok(())
}

/// Result of running a guard queue
#[derive(Debug)]
pub(crate) enum Verdict {
    /// Every guard called `next.proceed()`
    Proceed,
    /// A newer navigation took over
    Stale,
    Abort,
    Redirect(Location),
    /// A guard reported an error or panicked
    Fail(String),
    /// A guard dropped its `Next` without resolving it
    Stranded,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("guard panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("guard panicked: {}", msg)
    } else {
        "guard panicked".to_string()
    }
}

/// Run `queue` in order, checking `is_live` around every guard
pub(crate) async fn run_guards<F>(queue: &[GuardRef], to: &Arc<Route>, from: &Arc<Route>, is_live: F) -> Verdict
where
    F: Fn() -> bool + Sync,
{
    for (step, guard) in queue.iter().enumerate() {
        if !is_live() {
            return Verdict::Stale;
        }
        trace!(step, to = %to.full_path(), "Running navigation guard");

        let (next, rx) = Next::channel();
        let call = AssertUnwindSafe(guard.guard(to.clone(), from.clone(), next))
            .catch_unwind()
            .fuse();
        let rx = rx.fuse();
        pin_mut!(call, rx);

        let resolution = loop {
            select! {
                finished = call => {
                    if let Err(panic) = finished {
                        if !is_live() {
                            return Verdict::Stale;
                        }
                        return Verdict::Fail(panic_message(panic.as_ref()));
                    }
                }
                resolution = rx => break resolution,
            }
        };

        if !is_live() {
            return Verdict::Stale;
        }
        let Ok(action) = resolution else {
            return Verdict::Stranded;
        };

        match action {
            NextAction::Proceed => continue,
            NextAction::Abort => return Verdict::Abort,
            NextAction::Redirect(location) => return Verdict::Redirect(location),
            NextAction::Fail(err) => return Verdict::Fail(err.to_string()),
        }
    }
    Verdict::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use etsx_router_core::{create_route, guard_fn, ComponentLoader, ComponentSlot, Matcher, NavigationGuard, RouteConfig};
    use parking_lot::Mutex;

    fn route(path: &str) -> Arc<Route> {
        create_route(None, &Location::path(path), None, None)
    }

    fn counting(calls: &Arc<AtomicUsize>) -> GuardRef {
        let calls = calls.clone();
        Arc::new(guard_fn(move |_, _, next| {
            calls.fetch_add(1, Ordering::SeqCst);
            next.proceed();
        }))
    }

    #[tokio::test]
    async fn test_all_proceed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue = vec![counting(&calls), counting(&calls)];
        let verdict = run_guards(&queue, &route("/a"), &route("/"), || true).await;
        assert!(matches!(verdict, Verdict::Proceed));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abort_stops_queue() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue: Vec<GuardRef> = vec![
            Arc::new(guard_fn(|_, _, next| {
                next.abort();
            })),
            counting(&calls),
        ];
        let verdict = run_guards(&queue, &route("/a"), &route("/"), || true).await;
        assert!(matches!(verdict, Verdict::Abort));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_redirect_and_fail() {
        let redirect: Vec<GuardRef> = vec![Arc::new(guard_fn(|_, _, next| {
            next.redirect("/login");
        }))];
        match run_guards(&redirect, &route("/a"), &route("/"), || true).await {
            Verdict::Redirect(loc) => assert_eq!(loc.path.as_deref(), Some("/login")),
            other => panic!("unexpected verdict: {:?}", other),
        }

        let fail: Vec<GuardRef> = vec![Arc::new(guard_fn(|_, _, next| {
            next.fail("no session");
        }))];
        match run_guards(&fail, &route("/a"), &route("/"), || true).await {
            Verdict::Fail(reason) => assert_eq!(reason, "no session"),
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_double_next_is_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue: Vec<GuardRef> = vec![
            Arc::new(guard_fn(|_, _, next| {
                next.proceed();
                next.abort();
            })),
            counting(&calls),
        ];
        let verdict = run_guards(&queue, &route("/a"), &route("/"), || true).await;
        assert!(matches!(verdict, Verdict::Proceed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Deferred(Arc<Mutex<Option<Next>>>);

    #[async_trait]
    impl NavigationGuard for Deferred {
        async fn guard(&self, _to: Arc<Route>, _from: Arc<Route>, next: Next) {
            *self.0.lock() = Some(next);
        }
    }

    #[tokio::test]
    async fn test_waits_for_deferred_next() {
        let slot = Arc::new(Mutex::new(None));
        let queue: Vec<GuardRef> = vec![Arc::new(Deferred(slot.clone()))];
        let to = route("/a");
        let from = route("/");

        let mut run = tokio_test::task::spawn(run_guards(&queue, &to, &from, || true));
        tokio_test::assert_pending!(run.poll());

        let next = slot.lock().take().unwrap();
        next.proceed();
        assert!(run.is_woken());
        assert!(matches!(tokio_test::assert_ready!(run.poll()), Verdict::Proceed));
    }

    #[tokio::test]
    async fn test_stale_after_resolution() {
        let slot = Arc::new(Mutex::new(None));
        let live = Arc::new(AtomicBool::new(true));
        let queue: Vec<GuardRef> = vec![Arc::new(Deferred(slot.clone()))];
        let to = route("/a");
        let from = route("/");

        let flag = live.clone();
        let mut run = tokio_test::task::spawn(run_guards(&queue, &to, &from, move || flag.load(Ordering::SeqCst)));
        tokio_test::assert_pending!(run.poll());

        live.store(false, Ordering::SeqCst);
        slot.lock().take().unwrap().proceed();
        assert!(matches!(tokio_test::assert_ready!(run.poll()), Verdict::Stale));
    }

    #[tokio::test]
    async fn test_dropped_next_strands() {
        let queue: Vec<GuardRef> = vec![Arc::new(guard_fn(|_, _, _next| {}))];
        let verdict = run_guards(&queue, &route("/a"), &route("/"), || true).await;
        assert!(matches!(verdict, Verdict::Stranded));
    }

    #[tokio::test]
    async fn test_guard_panic_is_caught() {
        let queue: Vec<GuardRef> = vec![Arc::new(guard_fn(|_, _, _next| panic!("boom")))];
        match run_guards(&queue, &route("/a"), &route("/"), || true).await {
            Verdict::Fail(reason) => assert!(reason.contains("boom")),
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_after_takeover_is_stale() {
        let live = Arc::new(AtomicBool::new(true));
        let queue: Vec<GuardRef> = vec![Arc::new(guard_fn({
            let live = live.clone();
            move |_, _, _next| {
                live.store(false, Ordering::SeqCst);
                panic!("late failure");
            }
        }))];

        let flag = live.clone();
        let verdict = run_guards(&queue, &route("/a"), &route("/"), move || flag.load(Ordering::SeqCst)).await;
        assert!(matches!(verdict, Verdict::Stale));
    }

    fn records(routes: Vec<RouteConfig>, path: &str) -> Vec<Arc<RouteRecord>> {
        let mut matcher = Matcher::new(None, None);
        matcher.add_routes(routes).unwrap();
        matcher
            .match_location(&Location::from(path), None, None)
            .unwrap()
            .matched()
            .to_vec()
    }

    #[test]
    fn test_resolve_queue_splits_chains() {
        let mut matcher = Matcher::new(None, None);
        matcher
            .add_routes(vec![RouteConfig::new("/a")
                .child(RouteConfig::new("b"))
                .child(RouteConfig::new("c"))])
            .unwrap();
        let ab = matcher.match_location(&Location::from("/a/b"), None, None).unwrap();
        let ac = matcher.match_location(&Location::from("/a/c"), None, None).unwrap();

        let diff = resolve_queue(ab.matched(), ac.matched());
        assert_eq!(diff.updated.len(), 1);
        assert_eq!(diff.activated[0].path(), "/a/c");
        assert_eq!(diff.deactivated[0].path(), "/a/b");
    }

    #[test]
    fn test_leave_guards_run_deepest_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tagged = |tag: &'static str| {
            let order = order.clone();
            guard_fn(move |_, _, next| {
                order.lock().push(tag);
                next.proceed();
            })
        };
        let matched = records(
            vec![RouteConfig::new("/outer")
                .component(ComponentDef::new("Outer").on_leave(tagged("outer")))
                .child(RouteConfig::new("inner").component(ComponentDef::new("Inner").on_leave(tagged("inner"))))],
            "/outer/inner",
        );
        let diff = resolve_queue(&matched, &[]);
        let queue = leave_guards(&diff);

        tokio_test::block_on(run_guards(&queue, &route("/"), &route("/outer/inner"), || true));
        assert_eq!(*order.lock(), vec!["inner", "outer"]);
    }

    struct SlowView;

    #[async_trait]
    impl ComponentLoader for SlowView {
        async fn load(&self) -> Result<ComponentDef, String> {
            tokio::task::yield_now().await;
            Ok(ComponentDef::new("Slow"))
        }
    }

    struct BrokenView;

    #[async_trait]
    impl ComponentLoader for BrokenView {
        async fn load(&self) -> Result<ComponentDef, String> {
            Err("network down".to_string())
        }
    }

    #[tokio::test]
    async fn test_resolve_components() {
        let matched = records(vec![RouteConfig::new("/lazy").component(ComponentSlot::lazy(SlowView))], "/lazy");
        resolve_components(&matched).await.unwrap();
        assert!(!matched[0].components()["default"].needs_load());

        let broken = records(vec![RouteConfig::new("/broken").view("side", ComponentSlot::lazy(BrokenView))], "/broken");
        match resolve_components(&broken).await {
            Err(NavigationError::ComponentLoad { view, reason, .. }) => {
                assert_eq!(view, "side");
                assert_eq!(reason, "network down");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
