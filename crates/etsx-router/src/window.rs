//! Browser window port
//!
//! The history backends only touch the browser through [`BrowserWindow`].
//! [`MemoryWindow`] implements it in-process with a session-history list,
//! so the browser backends run unchanged in tests and headless hosts.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Scroll offset in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Events the window emits asynchronously
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// The active session-history entry changed
    PopState { state_key: Option<String> },
    /// The URL fragment changed
    HashChange,
}

/// The browser surface the router consumes
pub trait BrowserWindow: Send + Sync {
    /// Current URL without origin: path, search and hash
    fn location(&self) -> String;

    /// Add a session-history entry
    fn push_state(&self, key: &str, url: &str);

    /// Overwrite the active session-history entry
    fn replace_state(&self, key: &str, url: &str);

    /// Move through session history; the change is announced by a `PopState` event
    fn go(&self, n: i64);

    /// Assign `location.hash`
    fn set_hash(&self, hash: &str);

    /// `location.replace(url)`
    fn replace_location(&self, url: &str);

    fn supports_push_state(&self) -> bool;

    /// State key of the active entry
    fn state_key(&self) -> Option<String>;

    fn scroll_position(&self) -> Position;

    fn scroll_to(&self, position: Position);

    /// Document position of the element matching `selector`
    fn element_position(&self, selector: &str) -> Option<Position>;

    /// Receive window events from now on
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WindowEvent>;
}

#[derive(Debug, Clone)]
struct Entry {
    url: String,
    key: Option<String>,
}

#[derive(Debug)]
struct WindowState {
    entries: Vec<Entry>,
    index: usize,
    scroll: Position,
    elements: HashMap<String, Position>,
    subscribers: Vec<mpsc::UnboundedSender<WindowEvent>>,
}

impl WindowState {
    fn current(&self) -> &Entry {
        &self.entries[self.index]
    }

    fn emit(&mut self, event: WindowEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn push(&mut self, entry: Entry) {
        self.entries.truncate(self.index + 1);
        self.entries.push(entry);
        self.index = self.entries.len() - 1;
    }
}

fn hash_of(url: &str) -> &str {
    url.find('#').map(|i| &url[i..]).unwrap_or("")
}

fn without_hash(url: &str) -> &str {
    url.find('#').map(|i| &url[..i]).unwrap_or(url)
}

/// In-process browser window with a session-history list
#[derive(Debug)]
pub struct MemoryWindow {
    push_state: bool,
    state: Mutex<WindowState>,
}

impl MemoryWindow {
    /// A window that opened `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self::build(url.into(), true)
    }

    /// A window of a browser without `pushState`
    pub fn without_push_state(url: impl Into<String>) -> Self {
        Self::build(url.into(), false)
    }

    fn build(url: String, push_state: bool) -> Self {
        Self {
            push_state,
            state: Mutex::new(WindowState {
                entries: vec![Entry { url, key: None }],
                index: 0,
                scroll: Position::default(),
                elements: HashMap::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Place an element that scroll selectors can find
    pub fn set_element(&self, selector: impl Into<String>, position: Position) {
        self.state.lock().elements.insert(selector.into(), position);
    }

    /// Simulate the user scrolling the page
    pub fn user_scroll(&self, position: Position) {
        self.state.lock().scroll = position;
    }

    /// Simulate the user typing a URL fragment or following an in-page link
    pub fn user_set_hash(&self, hash: &str) {
        self.set_hash(hash);
    }

    /// URLs of all session-history entries
    pub fn entries(&self) -> Vec<String> {
        self.state.lock().entries.iter().map(|e| e.url.clone()).collect()
    }

    /// Index of the active entry
    pub fn index(&self) -> usize {
        self.state.lock().index
    }
}

impl BrowserWindow for MemoryWindow {
    fn location(&self) -> String {
        self.state.lock().current().url.clone()
    }

    fn push_state(&self, key: &str, url: &str) {
        trace!(key, url, "pushState");
        self.state.lock().push(Entry {
            url: url.to_string(),
            key: Some(key.to_string()),
        });
    }

    fn replace_state(&self, key: &str, url: &str) {
        trace!(key, url, "replaceState");
        let mut state = self.state.lock();
        let index = state.index;
        state.entries[index] = Entry {
            url: url.to_string(),
            key: Some(key.to_string()),
        };
    }

    fn go(&self, n: i64) {
        let mut state = self.state.lock();
        let target = state.index as i64 + n;
        if n == 0 || target < 0 || target >= state.entries.len() as i64 {
            return;
        }
        let before = state.current().url.clone();
        state.index = target as usize;
        let entry = state.current().clone();

        state.emit(WindowEvent::PopState { state_key: entry.key });
        if hash_of(&before) != hash_of(&entry.url) {
            state.emit(WindowEvent::HashChange);
        }
    }

    fn set_hash(&self, hash: &str) {
        let mut state = self.state.lock();
        let current = state.current().url.clone();
        let hash = hash.strip_prefix('#').unwrap_or(hash);
        let url = format!("{}#{}", without_hash(&current), hash);
        if url == current {
            return;
        }
        state.push(Entry { url, key: None });
        state.emit(WindowEvent::HashChange);
    }

    fn replace_location(&self, url: &str) {
        let mut state = self.state.lock();
        let before = state.current().url.clone();
        let index = state.index;
        state.entries[index] = Entry {
            url: url.to_string(),
            key: None,
        };
        if without_hash(&before) == without_hash(url) && hash_of(&before) != hash_of(url) {
            state.emit(WindowEvent::HashChange);
        }
    }

    fn supports_push_state(&self) -> bool {
        self.push_state
    }

    fn state_key(&self) -> Option<String> {
        self.state.lock().current().key.clone()
    }

    fn scroll_position(&self) -> Position {
        self.state.lock().scroll
    }

    fn scroll_to(&self, position: Position) {
        self.state.lock().scroll = position;
    }

    fn element_position(&self, selector: &str) -> Option<Position> {
        self.state.lock().elements.get(selector).copied()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WindowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().subscribers.push(tx);
        rx
    }
}
