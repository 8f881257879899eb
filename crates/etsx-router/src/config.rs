//! Router configuration

use std::fmt;
use std::sync::Arc;

use etsx_router_core::{ParseQueryFn, RouteConfig, StringifyQueryFn};
use serde::{Deserialize, Serialize};

use crate::scroll::ScrollBehavior;
use crate::window::BrowserWindow;

/// History backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Real paths through `pushState`
    History,
    /// Paths kept after `#`
    #[default]
    Hash,
    /// In-memory stack for hosts without a browser window
    #[serde(alias = "weex")]
    Abstract,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::History => write!(f, "history"),
            Mode::Hash => write!(f, "hash"),
            Mode::Abstract => write!(f, "abstract"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "history" => Ok(Mode::History),
            "hash" => Ok(Mode::Hash),
            "abstract" | "weex" => Ok(Mode::Abstract),
            other => Err(format!("invalid mode: {}", other)),
        }
    }
}

/// Serializable router settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterSettings {
    /// Requested mode; the effective mode may differ, see [`RouterSettings::effective_mode`]
    pub mode: Mode,

    /// Base path the app is served under
    pub base: String,

    /// Fall back to hash mode when `pushState` is unavailable
    pub fallback: bool,

    /// Class applied to links that include the current route
    pub link_active_class: String,

    /// Class applied to links that match the current route exactly
    pub link_exact_active_class: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            base: "/".to_string(),
            fallback: true,
            link_active_class: "router-link-active".to_string(),
            link_exact_active_class: "router-link-exact-active".to_string(),
        }
    }
}

impl RouterSettings {
    /// Load settings from environment variables
    pub fn from_env() -> Self {
        let mut settings = RouterSettings::default();

        // Mode
        if let Ok(mode) = std::env::var("ETSX_ROUTER_MODE") {
            if let Ok(mode) = mode.parse() {
                settings.mode = mode;
            }
        }

        // Base path
        if let Ok(base) = std::env::var("ETSX_ROUTER_BASE") {
            settings.base = base;
        }

        // Hash fallback
        if let Ok(fallback) = std::env::var("ETSX_ROUTER_FALLBACK") {
            if let Ok(fallback) = fallback.parse() {
                settings.fallback = fallback;
            }
        }

        settings
    }

    /// Mode actually used for a host with the given window
    pub fn effective_mode(&self, window: Option<&dyn BrowserWindow>) -> Mode {
        match window {
            None => Mode::Abstract,
            Some(window) => {
                if self.mode == Mode::History && !window.supports_push_state() && self.fallback {
                    Mode::Hash
                } else {
                    self.mode
                }
            }
        }
    }
}

/// Everything needed to build a [`Router`](crate::Router)
#[derive(Clone, Default)]
pub struct RouterOptions {
    pub routes: Vec<RouteConfig>,
    pub settings: RouterSettings,
    pub parse_query: Option<ParseQueryFn>,
    pub stringify_query: Option<StringifyQueryFn>,
    pub scroll_behavior: Option<Arc<dyn ScrollBehavior>>,
    /// Browser surface; without one the router runs in abstract mode
    pub window: Option<Arc<dyn BrowserWindow>>,
}

impl fmt::Debug for RouterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOptions")
            .field("routes", &self.routes)
            .field("settings", &self.settings)
            .field("custom_parse_query", &self.parse_query.is_some())
            .field("custom_stringify_query", &self.stringify_query.is_some())
            .field("scroll_behavior", &self.scroll_behavior.is_some())
            .field("window", &self.window.is_some())
            .finish()
    }
}

impl RouterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: RouterSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn with_routes(mut self, routes: Vec<RouteConfig>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.settings.mode = mode;
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.settings.base = base.into();
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.settings.fallback = fallback;
        self
    }

    pub fn with_link_classes(mut self, active: impl Into<String>, exact_active: impl Into<String>) -> Self {
        self.settings.link_active_class = active.into();
        self.settings.link_exact_active_class = exact_active.into();
        self
    }

    pub fn with_parse_query(mut self, parse: ParseQueryFn) -> Self {
        self.parse_query = Some(parse);
        self
    }

    pub fn with_stringify_query(mut self, stringify: StringifyQueryFn) -> Self {
        self.stringify_query = Some(stringify);
        self
    }

    pub fn with_scroll_behavior(mut self, behavior: impl ScrollBehavior + 'static) -> Self {
        self.scroll_behavior = Some(Arc::new(behavior));
        self
    }

    pub fn with_window(mut self, window: Arc<dyn BrowserWindow>) -> Self {
        self.window = Some(window);
        self
    }
}
