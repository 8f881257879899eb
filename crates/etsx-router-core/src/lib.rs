//! Etsx Router Core - Route Resolution Module
//!
//! Turns requested locations into immutable routes.
//!
//! # Architecture
//!
//! ```text
//! Location ("/users/1?tab=posts")
//!     │
//!     ▼
//! ┌─────────────────────────┐
//! │        Matcher          │  Decides: which record chain?
//! │  (path list, name map)  │  Follows redirects and aliases
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │         Route           │  Frozen: path, query, params,
//! │  (matched: root→leaf)   │  full path, matched records
//! └─────────────────────────┘
//! ```
//!
//! # Building blocks
//!
//! - **PathPattern**: `/user/:id`, `:path+`, `:page?`, `*` compiled to regex
//! - **Query codec**: `?a=1&a=2&flag` to and from [`Query`]
//! - **Guards**: the [`NavigationGuard`] contract and its single-shot [`Next`] handle
//! - **Components**: views with in-component guards, optionally loaded lazily
//!
//! # Example
//!
//! ```rust,ignore
//! use etsx_router_core::{Location, Matcher, RouteConfig};
//!
//! let mut matcher = Matcher::new(None, None);
//! matcher.add_routes(vec![RouteConfig::new("/users/:id").named("user")])?;
//!
//! let route = matcher.match_location(&Location::from("/users/1"), None, None)?;
//! assert_eq!(route.params()["id"], "1");
//! ```

// Core modules
mod error;
mod types;
mod path;
mod pattern;
mod query;

// Route value model
mod location;
mod route;
mod record;
mod component;
mod guard;

// Resolution
mod matcher;

// Re-exports: Error types
pub use error::RouterError;

// Re-exports: Core types
pub use types::{Meta, Params, CATCH_ALL_PARAM, DEFAULT_VIEW, MAX_REDIRECT_HOPS};

// Re-exports: Paths and queries
pub use path::{clean_path, normalize_base, parse_path, resolve_path, ParsedPath};
pub use pattern::{ParamKey, PathPattern};
pub use query::{
    encode, is_query_equal, parse_query, query_includes, resolve_query, stringify_query,
    ParseQueryFn, Query, QueryValue, StringifyQueryFn,
};

// Re-exports: Route value model
pub use location::{normalize_location, Location};
pub use route::{
    create_route, format_match, get_full_path, is_included_route, is_same_route, is_start,
    start_route, Route,
};
pub use record::{PropsFn, PropsOption, RedirectFn, RedirectOption, RouteConfig, RouteRecord};
pub use component::{ComponentDef, ComponentLoader, ComponentSlot, LazyComponent};
pub use guard::{guard_fn, FnGuard, GuardError, GuardRef, NavigationGuard, Next, NextAction};

// Re-exports: Matcher
pub use matcher::Matcher;
