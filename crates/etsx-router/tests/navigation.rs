//! Integration tests for the navigation state machine

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use etsx_router::{NavigationError, NavigationOutcome, Router, RouterOptions};
use etsx_router_core::{
    guard_fn, ComponentDef, ComponentLoader, ComponentSlot, NavigationGuard, Next, Route, RouteConfig, RouterError,
};
use parking_lot::Mutex;
use tokio_test::{assert_pending, assert_ready};

fn routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("/").named("home"),
        RouteConfig::new("/a").named("a"),
        RouteConfig::new("/b").named("b"),
        RouteConfig::new("/login").named("login"),
        RouteConfig::new("/private").named("private"),
        RouteConfig::new("/slow"),
        RouteConfig::new("/fast"),
        RouteConfig::new("/users/:id").named("user"),
    ]
}

async fn started(routes: Vec<RouteConfig>) -> Router {
    let router = Router::new(RouterOptions::new().with_routes(routes)).unwrap();
    router.start().await.unwrap();
    router
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let read = {
        let count = count.clone();
        move || count.load(Ordering::SeqCst)
    };
    (count, read)
}

#[tokio::test]
async fn test_start_commits_root() {
    let router = Router::new(RouterOptions::new().with_routes(routes())).unwrap();
    assert!(!router.is_ready());

    let ready = Arc::new(Mutex::new(None));
    router.on_ready(
        {
            let ready = ready.clone();
            move |route| *ready.lock() = Some(route.full_path().to_string())
        },
        None,
    );

    let outcome = router.start().await.unwrap();
    assert!(outcome.is_committed());
    assert!(router.is_ready());
    assert_eq!(ready.lock().as_deref(), Some("/"));
    assert_eq!(router.current_route().name(), Some("home"));
}

#[tokio::test]
async fn test_duplicate_push_runs_guards_once() {
    let router = started(routes()).await;
    let (count, runs) = counter();
    router.before_each(guard_fn(move |_, _, next| {
        count.fetch_add(1, Ordering::SeqCst);
        next.proceed();
    }));

    let first = router.push("/a?x=1").await.unwrap();
    assert!(first.is_committed());
    let second = router.push("/a?x=1").await.unwrap();
    assert!(matches!(second, NavigationOutcome::Duplicate));

    assert_eq!(runs(), 1);
    assert_eq!(router.current_route().full_path(), "/a?x=1");
}

#[tokio::test]
async fn test_superseded_navigation_never_commits() {
    let router = started(routes()).await;
    let parked: Arc<Mutex<Option<Next>>> = Arc::new(Mutex::new(None));
    router.before_each(guard_fn({
        let parked = parked.clone();
        move |to, _, next| {
            if to.path() == "/slow" {
                *parked.lock() = Some(next);
            } else {
                next.proceed();
            }
        }
    }));

    // Park the slow navigation in its guard
    let mut slow = tokio_test::task::spawn(router.push("/slow"));
    assert_pending!(slow.poll());
    assert_eq!(router.pending_route().unwrap().path(), "/slow");

    // A newer navigation takes over and commits
    let fast = router.push("/fast").await.unwrap();
    assert_eq!(fast.route().unwrap().path(), "/fast");

    // The late guard resolution is dropped
    parked.lock().take().unwrap().proceed();
    assert!(slow.is_woken());
    let outcome = assert_ready!(slow.poll()).unwrap();
    assert!(matches!(outcome, NavigationOutcome::Superseded));
    assert_eq!(router.current_route().path(), "/fast");
    assert!(router.pending_route().is_none());
}

#[tokio::test]
async fn test_dropped_next_is_recovered_by_newer_navigation() {
    let router = started(routes()).await;
    router.before_each(guard_fn(|to, _, next| {
        if to.path() == "/slow" {
            drop(next);
        } else {
            next.proceed();
        }
    }));

    let mut stuck = tokio_test::task::spawn(router.push("/slow"));
    assert_pending!(stuck.poll());
    assert_pending!(stuck.poll());

    router.push("/fast").await.unwrap();
    let outcome = assert_ready!(stuck.poll()).unwrap();
    assert!(matches!(outcome, NavigationOutcome::Superseded));
    assert_eq!(router.current_route().path(), "/fast");
}

/// How a parked guard settles once it is released
#[derive(Clone, Copy)]
enum Late {
    Abort,
    Fail,
    Panic,
}

/// Holds navigations to `/slow` until released, then settles them with `late`
struct LateGuard {
    release: Arc<tokio::sync::Notify>,
    late: Late,
}

#[async_trait]
impl NavigationGuard for LateGuard {
    async fn guard(&self, to: Arc<Route>, _from: Arc<Route>, next: Next) {
        if to.path() != "/slow" {
            next.proceed();
            return;
        }
        self.release.notified().await;
        match self.late {
            Late::Abort => {
                next.abort();
            }
            Late::Fail => {
                next.fail("late failure");
            }
            Late::Panic => panic!("late failure"),
        }
    }
}

async fn assert_late_verdict_is_dropped(late: Late) {
    // Setup: /slow is parked in its guard, errors are collected
    let router = started(routes()).await;
    let release = Arc::new(tokio::sync::Notify::new());
    router.before_each(LateGuard {
        release: release.clone(),
        late,
    });
    let errors = Arc::new(Mutex::new(Vec::new()));
    router.on_error({
        let errors = errors.clone();
        move |err| errors.lock().push(err.to_string())
    });

    let mut slow = tokio_test::task::spawn(router.push("/slow"));
    assert_pending!(slow.poll());

    // A newer navigation commits, then the parked guard settles
    router.push("/fast").await.unwrap();
    release.notify_one();
    assert!(slow.is_woken());

    let outcome = assert_ready!(slow.poll()).unwrap();
    assert!(matches!(outcome, NavigationOutcome::Superseded));
    assert_eq!(router.current_route().path(), "/fast");
    assert!(router.pending_route().is_none());
    assert!(errors.lock().is_empty());
}

#[tokio::test]
async fn test_late_abort_of_superseded_navigation_is_dropped() {
    assert_late_verdict_is_dropped(Late::Abort).await;
}

#[tokio::test]
async fn test_late_failure_of_superseded_navigation_is_dropped() {
    assert_late_verdict_is_dropped(Late::Fail).await;
}

#[tokio::test]
async fn test_late_panic_of_superseded_navigation_is_dropped() {
    assert_late_verdict_is_dropped(Late::Panic).await;
}

#[tokio::test]
async fn test_abort_keeps_current_route() {
    let router = started(routes()).await;
    router.push("/a").await.unwrap();

    let (errors, error_count) = counter();
    router.on_error(move |_| {
        errors.fetch_add(1, Ordering::SeqCst);
    });
    router.before_each(guard_fn(|to, _, next| {
        if to.path() == "/private" {
            next.abort();
        } else {
            next.proceed();
        }
    }));

    let err = router.push("/private").await.unwrap_err();
    assert_eq!(
        err,
        NavigationError::Aborted {
            from: "/a".to_string(),
            to: "/private".to_string(),
        }
    );
    assert!(err.is_failure());
    assert_eq!(router.current_route().path(), "/a");
    assert!(router.pending_route().is_none());

    // Plain aborts are failures, not errors
    assert_eq!(error_count(), 0);
}

#[tokio::test]
async fn test_guard_redirect_sets_redirected_from() {
    let router = started(routes()).await;
    router.before_each(guard_fn(|to, _, next| {
        if to.path() == "/private" {
            next.redirect("/login");
        } else {
            next.proceed();
        }
    }));

    let outcome = router.push("/private?next=1").await.unwrap();
    let route = outcome.route().unwrap();
    assert_eq!(route.path(), "/login");
    assert_eq!(route.redirected_from(), Some("/private?next=1"));
    assert_eq!(router.current_route().path(), "/login");
}

#[tokio::test]
async fn test_record_redirect_loop_terminates() {
    let router = started(vec![
        RouteConfig::new("/").named("home"),
        RouteConfig::new("/a").redirect("/b"),
        RouteConfig::new("/b").redirect("/a"),
    ])
    .await;

    let err = router.push("/a").await.unwrap_err();
    assert!(matches!(err, NavigationError::RedirectLoop { .. }));
    assert_eq!(router.current_route().path(), "/");
}

#[tokio::test]
async fn test_guard_redirect_loop_terminates() {
    let router = started(routes()).await;
    router.before_each(guard_fn(|to, _, next| match to.path() {
        "/a" => {
            next.redirect("/b");
        }
        "/b" => {
            next.redirect("/a");
        }
        _ => {
            next.proceed();
        }
    }));

    let err = router.push("/a").await.unwrap_err();
    assert!(matches!(err, NavigationError::RedirectLoop { hops: 11, .. }));
    assert_eq!(router.current_route().path(), "/");
}

#[tokio::test]
async fn test_failed_guard_reaches_error_callbacks_once_registered() {
    let router = started(routes()).await;
    router.before_each(guard_fn(|to, _, next| {
        if to.path() == "/b" {
            next.fail("backend unavailable");
        } else {
            next.proceed();
        }
    }));

    // No error callback yet: the error is buffered
    let err = router.push("/b").await.unwrap_err();
    assert!(matches!(err, NavigationError::Guard { ref reason, .. } if reason == "backend unavailable"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    router.on_error({
        let seen = seen.clone();
        move |err| seen.lock().push(err.clone())
    });
    assert_eq!(seen.lock().len(), 1);

    // Flushed only once
    router.on_error(|_| {});
    router.push("/b").await.unwrap_err();
    assert_eq!(seen.lock().len(), 2);
}

#[tokio::test]
async fn test_panicking_guard_fails_navigation() {
    let router = started(routes()).await;
    router.before_each(guard_fn(|to, _, next| {
        if to.path() == "/b" {
            panic!("guard exploded");
        }
        next.proceed();
    }));

    let err = router.push("/b").await.unwrap_err();
    match err {
        NavigationError::Guard { reason, .. } => assert!(reason.contains("guard exploded")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(router.current_route().path(), "/");
}

#[tokio::test]
async fn test_pipeline_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let step = |name: &'static str| {
        let log = log.clone();
        guard_fn(move |_, _, next| {
            log.lock().push(name);
            next.proceed();
        })
    };

    let router = started(vec![
        RouteConfig::new("/").named("home").component(ComponentDef::new("Home").on_leave(step("leave"))),
        RouteConfig::new("/users/:id")
            .before_enter(step("beforeEnter"))
            .component(ComponentDef::new("User").on_enter(step("enter")).on_update(step("update"))),
    ])
    .await;
    router.before_each(step("beforeEach"));
    router.before_resolve(step("beforeResolve"));
    router.after_each({
        let log = log.clone();
        move |_, _| log.lock().push("afterEach")
    });

    router.push("/users/1").await.unwrap();
    assert_eq!(
        *log.lock(),
        vec!["leave", "beforeEach", "beforeEnter", "enter", "beforeResolve", "afterEach"]
    );

    // Same record, new params: update guards instead of enter guards
    log.lock().clear();
    router.push("/users/2").await.unwrap();
    assert_eq!(*log.lock(), vec!["beforeEach", "update", "beforeResolve", "afterEach"]);
}

#[tokio::test]
async fn test_unhook_removes_hook() {
    let router = started(routes()).await;
    let (count, calls) = counter();
    let hook = router.after_each(move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    router.push("/a").await.unwrap();
    assert!(hook.unhook());
    router.push("/b").await.unwrap();
    assert_eq!(calls(), 1);
}

struct FailingLoader;

#[async_trait]
impl ComponentLoader for FailingLoader {
    async fn load(&self) -> Result<ComponentDef, String> {
        Err("chunk missing".to_string())
    }
}

struct SlowLoader;

#[async_trait]
impl ComponentLoader for SlowLoader {
    async fn load(&self) -> Result<ComponentDef, String> {
        tokio::task::yield_now().await;
        Ok(ComponentDef::new("Lazy"))
    }
}

#[tokio::test]
async fn test_lazy_components() {
    let lazy = ComponentSlot::lazy(SlowLoader);
    let router = started(vec![
        RouteConfig::new("/").named("home"),
        RouteConfig::new("/lazy").component(lazy.clone()),
        RouteConfig::new("/broken").component(ComponentSlot::lazy(FailingLoader)),
    ])
    .await;

    assert!(lazy.needs_load());
    router.push("/lazy").await.unwrap();
    assert_eq!(lazy.resolved().unwrap().name(), "Lazy");

    let err = router.push("/broken").await.unwrap_err();
    assert!(matches!(err, NavigationError::ComponentLoad { ref reason, .. } if reason == "chunk missing"));
    assert_eq!(router.current_route().path(), "/lazy");
}

#[tokio::test]
async fn test_abstract_go_walks_stack() {
    let router = started(routes()).await;
    router.push("/a").await.unwrap();
    router.push("/b").await.unwrap();

    router.back().await;
    assert_eq!(router.current_route().path(), "/a");
    router.back().await;
    assert_eq!(router.current_route().path(), "/");

    // Out of range is ignored
    router.go(-5).await;
    assert_eq!(router.current_route().path(), "/");

    router.go(2).await;
    assert_eq!(router.current_route().path(), "/b");
}

#[tokio::test]
async fn test_named_navigation_requires_params() {
    let router = started(routes()).await;
    let err = router
        .push(etsx_router_core::Location::named("user"))
        .await
        .unwrap_err();
    assert!(matches!(err, NavigationError::Resolve(RouterError::MissingParam { .. })));

    let outcome = router
        .push(etsx_router_core::Location::named("user").with_param("id", "7"))
        .await
        .unwrap();
    assert_eq!(outcome.route().unwrap().full_path(), "/users/7");
}

#[tokio::test]
async fn test_add_routes_reresolves_current_location() {
    let router = started(routes()).await;
    router.push("/late").await.unwrap();
    assert!(router.current_route().matched().is_empty());

    router
        .add_routes(vec![RouteConfig::new("/late").named("late")])
        .await
        .unwrap();
    assert_eq!(router.current_route().name(), Some("late"));
    assert_eq!(router.current_route().matched().len(), 1);
}

#[tokio::test]
async fn test_add_routes_after_back_keeps_active_entry() {
    let router = started(routes()).await;
    router.push("/a").await.unwrap();
    router.push("/b").await.unwrap();
    router.back().await;
    assert_eq!(router.current_route().path(), "/a");

    router.add_routes(vec![RouteConfig::new("/late")]).await.unwrap();
    assert_eq!(router.current_route().path(), "/a");

    // The forward entry survives
    router.forward().await;
    assert_eq!(router.current_route().path(), "/b");
}

#[tokio::test]
async fn test_link_state() {
    let router = started(routes()).await;
    router.push("/users/1").await.unwrap();

    let exact = router.link_state("/users/1", false).unwrap();
    assert!(exact.active && exact.exact_active);
    assert_eq!(exact.classes, vec!["router-link-active", "router-link-exact-active"]);

    let parent = router.link_state("/users", false).unwrap();
    assert!(parent.active);
    assert!(!parent.exact_active);

    let other = router.link_state("/a", false).unwrap();
    assert!(other.classes.is_empty());
}

#[tokio::test]
async fn test_watch_route_sees_commits() {
    let router = started(routes()).await;
    let mut rx = router.watch_route();

    router.push("/a").await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().path(), "/a");
}

#[tokio::test]
async fn test_failed_start_reports_ready_error() {
    let router = Router::new(RouterOptions::new().with_routes(routes())).unwrap();
    router.before_each(guard_fn(|_, _, next| {
        next.fail("session expired");
    }));

    let ready = Arc::new(Mutex::new(Vec::new()));
    router.on_ready(
        {
            let ready = ready.clone();
            move |_| ready.lock().push("ready".to_string())
        },
        Some(Box::new({
            let ready = ready.clone();
            move |err: &NavigationError| ready.lock().push(err.to_string())
        })),
    );

    router.start().await.unwrap_err();
    assert!(router.is_ready());
    let seen = ready.lock().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("session expired"));
}
