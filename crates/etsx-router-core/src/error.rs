//! Error types for route resolution

use thiserror::Error;

/// Route resolution error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A required dynamic segment had no value while filling a path
    #[error("Missing param \"{param}\" for path {path}")]
    MissingParam { path: String, param: String },

    /// A route path could not be compiled into a matcher
    #[error("Invalid route pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Redirect records kept pointing at each other
    #[error("Redirect loop detected after {hops} hops at {path}")]
    RedirectLoop { hops: usize, path: String },
}
