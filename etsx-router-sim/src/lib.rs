//! Etsx Router Simulator
//!
//! Replays a JSON navigation scenario against a [`Router`] and reports the
//! route committed after every command. Browser modes run over a
//! [`MemoryWindow`], so back/forward behave like a real session history.
//!
//! ```json
//! {
//!   "url": "/",
//!   "settings": { "mode": "history" },
//!   "routes": [{ "path": "/" }, { "path": "/users/:id", "name": "user" }],
//!   "guards": [{ "path": "/admin", "action": "redirect", "to": "/" }],
//!   "commands": [{ "op": "push", "to": "/users/1" }, { "op": "back" }]
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use etsx_router::{
    BrowserWindow, MemoryWindow, Mode, NavigationOutcome, NavigationResult, Router, RouterOptions,
    RouterSettings,
};
use etsx_router_core::{guard_fn, RouteConfig, RouterError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Simulator errors
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid scenario: {0}")]
    Scenario(#[from] serde_json::Error),

    #[error("Router setup failed: {0}")]
    Router(#[from] RouterError),
}

/// A navigation command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Command {
    Push { to: String },
    Replace { to: String },
    Go { n: i64 },
    Back,
    Forward,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Push { to } => write!(f, "push {to}"),
            Command::Replace { to } => write!(f, "replace {to}"),
            Command::Go { n } => write!(f, "go {n}"),
            Command::Back => write!(f, "back"),
            Command::Forward => write!(f, "forward"),
        }
    }
}

/// What a declarative guard does with a matching navigation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum GuardAction {
    Abort,
    Redirect { to: String },
    Fail { reason: String },
}

/// A `beforeEach` guard applied to navigations whose target path equals `path`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuardRule {
    pub path: String,
    #[serde(flatten)]
    pub action: GuardAction,
}

fn default_settle_ms() -> u64 {
    50
}

/// A scenario file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Router settings; read from the environment when absent
    #[serde(default)]
    pub settings: Option<RouterSettings>,

    /// URL the window opens at; without it the router runs in abstract mode
    #[serde(default)]
    pub url: Option<String>,

    /// Whether the simulated browser supports `pushState`
    #[serde(default = "default_push_state")]
    pub push_state: bool,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    #[serde(default)]
    pub guards: Vec<GuardRule>,

    pub commands: Vec<Command>,

    /// How long to wait for a back/forward navigation to commit
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_push_state() -> bool {
    true
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub command: String,
    pub outcome: String,
    /// Full path of the current route afterwards
    pub current: String,
    /// Window URL afterwards, in browser modes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Result of a simulation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub mode: Mode,
    pub start: String,
    pub steps: Vec<Step>,
    pub final_route: String,
    /// Errors delivered to `on_error`
    pub errors: Vec<String>,
}

/// Drives a router through a scenario
pub struct Simulator {
    router: Router,
    window: Option<Arc<MemoryWindow>>,
    commands: Vec<Command>,
    settle: Duration,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Simulator {
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        Self::new(scenario)
    }

    pub fn new(scenario: Scenario) -> Result<Self, SimError> {
        let settings = scenario.settings.unwrap_or_else(RouterSettings::from_env);

        // Simulated browser
        let window = scenario.url.map(|url| {
            Arc::new(if scenario.push_state {
                MemoryWindow::new(url)
            } else {
                MemoryWindow::without_push_state(url)
            })
        });

        let mut options = RouterOptions::from_settings(settings).with_routes(scenario.routes);
        if let Some(window) = &window {
            let window: Arc<dyn BrowserWindow> = window.clone();
            options = options.with_window(window);
        }
        let router = Router::new(options)?;

        // Declarative guards
        if !scenario.guards.is_empty() {
            let rules = scenario.guards;
            router.before_each(guard_fn(move |to, _, next| {
                let Some(rule) = rules.iter().find(|rule| rule.path == to.path()) else {
                    next.proceed();
                    return;
                };
                debug!(path = %rule.path, action = ?rule.action, "Guard rule matched");
                match &rule.action {
                    GuardAction::Abort => next.abort(),
                    GuardAction::Redirect { to } => next.redirect(to.as_str()),
                    GuardAction::Fail { reason } => next.fail(reason.clone()),
                };
            }));
        }

        let errors = Arc::new(Mutex::new(Vec::new()));
        router.on_error({
            let errors = errors.clone();
            move |err| errors.lock().push(err.to_string())
        });

        Ok(Self {
            router,
            window,
            commands: scenario.commands,
            settle: Duration::from_millis(scenario.settle_ms),
            errors,
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Start the router and replay every command
    pub async fn run(self) -> Report {
        let start = describe(&self.router.start().await);
        info!(mode = %self.router.mode(), %start, "Simulation started");

        let mut steps = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let outcome = self.execute(command).await;
            let step = Step {
                command: command.to_string(),
                outcome,
                current: self.router.current_route().full_path().to_string(),
                url: self.window.as_ref().map(|w| w.location()),
            };
            info!(command = %step.command, outcome = %step.outcome, current = %step.current, "Step");
            steps.push(step);
        }

        self.router.shutdown();
        let errors = self.errors.lock().clone();
        Report {
            mode: self.router.mode(),
            start,
            steps,
            final_route: self.router.current_route().full_path().to_string(),
            errors,
        }
    }

    async fn execute(&self, command: &Command) -> String {
        match command {
            Command::Push { to } => describe(&self.router.push(to.as_str()).await),
            Command::Replace { to } => describe(&self.router.replace(to.as_str()).await),
            Command::Go { n } => self.traverse(*n).await,
            Command::Back => self.traverse(-1).await,
            Command::Forward => self.traverse(1).await,
        }
    }

    async fn traverse(&self, n: i64) -> String {
        let mut rx = self.router.watch_route();
        self.router.go(n).await;

        // Browser modes commit from the window's event
        if self.router.mode() == Mode::Abstract {
            return if rx.has_changed().unwrap_or(false) {
                "committed".to_string()
            } else {
                "unchanged".to_string()
            };
        }
        match tokio::time::timeout(self.settle, rx.changed()).await {
            Ok(Ok(())) => "committed".to_string(),
            _ => "unchanged".to_string(),
        }
    }
}

fn describe(result: &NavigationResult) -> String {
    match result {
        Ok(NavigationOutcome::Committed(_)) => "committed".to_string(),
        Ok(NavigationOutcome::Duplicate) => "duplicate".to_string(),
        Ok(NavigationOutcome::Superseded) => "superseded".to_string(),
        Err(err) => format!("error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_parses() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "routes": [{ "path": "/" }, { "path": "/a", "name": "a" }],
                "guards": [{ "path": "/a", "action": "redirect", "to": "/" }],
                "commands": [{ "op": "push", "to": "/a" }, { "op": "go", "n": -1 }, { "op": "back" }]
            }"#,
        )
        .unwrap();

        assert!(scenario.push_state);
        assert_eq!(scenario.settle_ms, 50);
        assert_eq!(
            scenario.guards[0].action,
            GuardAction::Redirect { to: "/".to_string() }
        );
        assert_eq!(
            scenario.commands,
            vec![
                Command::Push { to: "/a".to_string() },
                Command::Go { n: -1 },
                Command::Back,
            ]
        );
    }

    #[test]
    fn test_invalid_scenario() {
        assert!(matches!(
            Simulator::from_json(r#"{ "routes": [] }"#),
            Err(SimError::Scenario(_))
        ));
    }
}
