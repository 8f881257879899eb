//! Navigation errors and outcomes

use std::sync::Arc;

use etsx_router_core::{Route, RouterError};
use thiserror::Error;

/// Why a navigation did not commit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// A guard called `next.abort()`
    #[error("Navigation aborted from \"{from}\" to \"{to}\" via a navigation guard")]
    Aborted { from: String, to: String },

    /// A guard reported an error or panicked
    #[error("Navigation guard failed from \"{from}\" to \"{to}\": {reason}")]
    Guard {
        from: String,
        to: String,
        reason: String,
    },

    /// Redirects kept bouncing between targets
    #[error("Redirect loop detected after {hops} hops at {path}")]
    RedirectLoop { hops: usize, path: String },

    /// The target location could not be resolved
    #[error("Failed to resolve location: {0}")]
    Resolve(RouterError),

    /// A lazily loaded view failed to load
    #[error("Failed to load view \"{view}\" for {path}: {reason}")]
    ComponentLoad {
        path: String,
        view: String,
        reason: String,
    },
}

impl NavigationError {
    /// Expected navigation failures, as opposed to errors
    ///
    /// Failures are reported to the caller only; errors also reach the
    /// `on_error` callbacks.
    pub fn is_failure(&self) -> bool {
        matches!(self, NavigationError::Aborted { .. })
    }

    pub fn is_error(&self) -> bool {
        !self.is_failure()
    }
}

impl From<RouterError> for NavigationError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::RedirectLoop { hops, path } => NavigationError::RedirectLoop { hops, path },
            other => NavigationError::Resolve(other),
        }
    }
}

/// How a navigation that did not fail ended
#[derive(Debug, Clone)]
pub enum NavigationOutcome {
    /// The route became current
    Committed(Arc<Route>),
    /// The target equals the current route; nothing ran
    Duplicate,
    /// A newer navigation started before this one finished
    Superseded,
}

impl NavigationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, NavigationOutcome::Committed(_))
    }

    /// The committed route, if any
    pub fn route(&self) -> Option<&Arc<Route>> {
        match self {
            NavigationOutcome::Committed(route) => Some(route),
            _ => None,
        }
    }
}

/// Navigation result type
pub type NavigationResult = Result<NavigationOutcome, NavigationError>;
