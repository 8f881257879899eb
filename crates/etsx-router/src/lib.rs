//! Etsx Router - Navigation Engine
//!
//! Drives navigations from a requested location to a committed route.
//!
//! # Architecture
//!
//! ```text
//! push / replace / go                    popstate / hashchange
//!        │                                        │
//!        ▼                                        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                      History                         │
//! │  resolve → leave → beforeEach → update → beforeEnter │
//! │  → lazy views → enter → beforeResolve → commit       │
//! │  (newest navigation wins, older ones are superseded) │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ commit(to, from, kind)
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!   ┌──────────────┐  ┌──────────────┐  ┌─────────────────┐
//!   │ Html5History │  │ HashHistory  │  │ AbstractHistory │
//!   │  pushState   │  │  #/fragment  │  │   route stack   │
//!   └──────┬───────┘  └──────┬───────┘  └─────────────────┘
//!          └─ ScrollCoordinator ─┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use etsx_router::{Router, RouterOptions};
//! use etsx_router_core::{guard_fn, RouteConfig};
//!
//! let router = Router::new(RouterOptions::new().with_routes(vec![
//!     RouteConfig::new("/").named("home"),
//!     RouteConfig::new("/admin").named("admin"),
//! ]))?;
//!
//! router.before_each(guard_fn(|to, _from, next| {
//!     if to.path().starts_with("/admin") {
//!         next.redirect("/");
//!     } else {
//!         next.proceed();
//!     }
//! }));
//!
//! router.start().await?;
//! router.push("/admin").await?;
//! assert_eq!(router.current_route().path(), "/");
//! ```

// Core modules
mod config;
mod error;
mod hooks;
mod pipeline;

// Host surface
mod scroll;
mod window;

// Navigation
pub mod history;
mod router;

// Re-exports: Configuration
pub use config::{Mode, RouterOptions, RouterSettings};

// Re-exports: Error types
pub use error::{NavigationError, NavigationOutcome, NavigationResult};

// Re-exports: Hooks
pub use hooks::{AfterHook, UnHook};

// Re-exports: Host surface
pub use scroll::{scroll_fn, FnScroll, ScrollBehavior, ScrollCoordinator, ScrollTarget};
pub use window::{BrowserWindow, MemoryWindow, Position, WindowEvent};

// Re-exports: Router
pub use history::{CommitKind, History, HistoryBackend, ListenerHandle};
pub use router::{LinkState, Resolved, Router};
