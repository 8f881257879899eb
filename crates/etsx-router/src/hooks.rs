//! Global navigation hooks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use etsx_router_core::{GuardRef, Route};
use parking_lot::Mutex;

/// Notification run after every commit; it cannot affect the navigation
pub type AfterHook = Arc<dyn Fn(&Arc<Route>, &Arc<Route>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookKind {
    BeforeEach,
    BeforeResolve,
    AfterEach,
}

/// Registered global hooks, in registration order
#[derive(Default)]
pub struct Hooks {
    before_each: Mutex<Vec<(u64, GuardRef)>>,
    before_resolve: Mutex<Vec<(u64, GuardRef)>>,
    after_each: Mutex<Vec<(u64, AfterHook)>>,
    next_id: AtomicU64,
}

impl Hooks {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn add_before_each(self: &Arc<Self>, guard: GuardRef) -> UnHook {
        let id = self.next_id();
        self.before_each.lock().push((id, guard));
        UnHook::new(self, HookKind::BeforeEach, id)
    }

    pub(crate) fn add_before_resolve(self: &Arc<Self>, guard: GuardRef) -> UnHook {
        let id = self.next_id();
        self.before_resolve.lock().push((id, guard));
        UnHook::new(self, HookKind::BeforeResolve, id)
    }

    pub(crate) fn add_after_each(self: &Arc<Self>, hook: AfterHook) -> UnHook {
        let id = self.next_id();
        self.after_each.lock().push((id, hook));
        UnHook::new(self, HookKind::AfterEach, id)
    }

    /// Snapshot taken when a navigation starts
    pub(crate) fn before_each(&self) -> Vec<GuardRef> {
        self.before_each.lock().iter().map(|(_, g)| g.clone()).collect()
    }

    pub(crate) fn before_resolve(&self) -> Vec<GuardRef> {
        self.before_resolve.lock().iter().map(|(_, g)| g.clone()).collect()
    }

    pub(crate) fn after_each(&self) -> Vec<AfterHook> {
        self.after_each.lock().iter().map(|(_, h)| h.clone()).collect()
    }

    fn remove(&self, kind: HookKind, id: u64) -> bool {
        fn remove_from<T>(list: &Mutex<Vec<(u64, T)>>, id: u64) -> bool {
            let mut list = list.lock();
            let before = list.len();
            list.retain(|(hook_id, _)| *hook_id != id);
            list.len() != before
        }

        match kind {
            HookKind::BeforeEach => remove_from(&self.before_each, id),
            HookKind::BeforeResolve => remove_from(&self.before_resolve, id),
            HookKind::AfterEach => remove_from(&self.after_each, id),
        }
    }
}

/// Handle returned by hook registration
///
/// Dropping it keeps the hook registered; call [`UnHook::unhook`] to remove it.
#[derive(Debug)]
pub struct UnHook {
    hooks: Weak<Hooks>,
    kind: HookKind,
    id: u64,
}

impl UnHook {
    fn new(hooks: &Arc<Hooks>, kind: HookKind, id: u64) -> Self {
        Self {
            hooks: Arc::downgrade(hooks),
            kind,
            id,
        }
    }

    /// Deregister the hook; returns `false` if it was already gone
    pub fn unhook(self) -> bool {
        match self.hooks.upgrade() {
            Some(hooks) => hooks.remove(self.kind, self.id),
            None => false,
        }
    }
}
