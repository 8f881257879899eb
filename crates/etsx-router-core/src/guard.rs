//! Navigation guard contracts
//!
//! A guard receives the target route, the route being left, and a
//! [`Next`] handle. The navigation waits until the guard resolves the
//! handle, which may happen inside the guard call or later from any task
//! the handle was moved into.
//!
//! ```text
//! guard(to, from, next)
//!         │
//!         ├── next.proceed()        ──► run the following guard
//!         ├── next.abort()          ──► navigation aborted
//!         ├── next.redirect(loc)    ──► resolve `loc` and start over
//!         └── next.fail(reason)     ──► navigation aborted with an error
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::oneshot;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::location::Location;
use crate::route::Route;

/// Error reported by a guard
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct GuardError(pub String);

/// How a guard resolved its [`Next`] handle
#[derive(Debug, Clone)]
pub enum NextAction {
    Proceed,
    Abort,
    Redirect(Location),
    Fail(GuardError),
}

/// Single-shot completion handle passed to every guard
///
/// Clones share the same slot: the first resolution wins and every later
/// call is ignored.
#[derive(Clone)]
pub struct Next {
    slot: Arc<Mutex<Option<oneshot::Sender<NextAction>>>>,
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl Next {
    /// Create a handle and the receiver the pipeline waits on
    pub fn channel() -> (Self, oneshot::Receiver<NextAction>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Resolve the handle; returns `false` if it was already resolved
    pub fn resolve(&self, action: NextAction) -> bool {
        let sender = self.slot.lock().take();
        match sender {
            Some(tx) => {
                // The pipeline may already be gone if the navigation was superseded.
                let _ = tx.send(action);
                true
            }
            None => {
                warn!(?action, "Next called more than once, ignoring");
                false
            }
        }
    }

    pub fn proceed(&self) -> bool {
        self.resolve(NextAction::Proceed)
    }

    pub fn abort(&self) -> bool {
        self.resolve(NextAction::Abort)
    }

    pub fn redirect(&self, location: impl Into<Location>) -> bool {
        self.resolve(NextAction::Redirect(location.into()))
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.resolve(NextAction::Fail(GuardError(reason.into())))
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.lock().is_none()
    }
}

/// A function that can allow, abort, or redirect a pending navigation
#[async_trait]
pub trait NavigationGuard: Send + Sync {
    async fn guard(&self, to: Arc<Route>, from: Arc<Route>, next: Next);
}

/// Guard backed by a plain callback, see [`guard_fn`]
pub struct FnGuard<F>(F);

/// Wrap a callback-style guard
///
/// ```rust,ignore
/// router.before_each(guard_fn(|to, _from, next| {
///     if to.path().starts_with("/admin") {
///         next.redirect("/login");
///     } else {
///         next.proceed();
///     }
/// }));
/// ```
pub fn guard_fn<F>(f: F) -> FnGuard<F>
where
    F: Fn(Arc<Route>, Arc<Route>, Next) + Send + Sync,
{
    FnGuard(f)
}

#[async_trait]
impl<F> NavigationGuard for FnGuard<F>
where
    F: Fn(Arc<Route>, Arc<Route>, Next) + Send + Sync,
{
    async fn guard(&self, to: Arc<Route>, from: Arc<Route>, next: Next) {
        (self.0)(to, from, next)
    }
}

/// Shared guard handle as stored in records, components and hook lists
pub type GuardRef = Arc<dyn NavigationGuard>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_resolves_once() {
        let (next, mut rx) = Next::channel();
        let second = next.clone();

        assert!(next.proceed());
        assert!(!second.abort());
        assert!(second.is_resolved());

        match rx.try_recv() {
            Ok(Some(NextAction::Proceed)) => {}
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_dropped_next_cancels_receiver() {
        let (next, rx) = Next::channel();
        drop(next);
        assert!(tokio_test::block_on(rx).is_err());
    }

    #[test]
    fn test_redirect_accepts_str() {
        let (next, mut rx) = Next::channel();
        next.redirect("/login");
        match rx.try_recv() {
            Ok(Some(NextAction::Redirect(loc))) => assert_eq!(loc.path.as_deref(), Some("/login")),
            other => panic!("unexpected resolution: {:?}", other),
        }
    }
}
