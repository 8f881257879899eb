//! Common types for the router
//!
//! Centralizes aliases and constants shared by the matcher and the
//! navigation engine.

use std::collections::BTreeMap;

/// Resolved dynamic segment values, keyed by param name
pub type Params = BTreeMap<String, String>;

/// Free-form route metadata
pub type Meta = serde_json::Value;

/// Name of the view used when a route declares a single component
pub const DEFAULT_VIEW: &str = "default";

/// Param name assigned to a bare `*` segment
pub const CATCH_ALL_PARAM: &str = "pathMatch";

/// Maximum number of redirects followed while resolving one navigation
pub const MAX_REDIRECT_HOPS: usize = 10;
