//! Ordered lifecycle hooks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bus::lock;

type Hook<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Handle returned by [`HookList::register`], used to remove the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

/// Callbacks for one kind of lifecycle event, run in registration order.
///
/// A hook returns `true` if it handled the event; [`fire`](Self::fire)
/// reports how many did.
pub struct HookList<E> {
    next_id: AtomicU64,
    hooks: Mutex<Vec<(HookHandle, Hook<E>)>>,
}

impl<E> HookList<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn register<F>(&self, hook: F) -> HookHandle
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let handle = HookHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.hooks).push((handle, Arc::new(hook)));
        handle
    }

    /// Returns `false` if the hook was already removed.
    pub fn remove(&self, handle: HookHandle) -> bool {
        let mut hooks = lock(&self.hooks);
        let before = hooks.len();
        hooks.retain(|(h, _)| *h != handle);
        hooks.len() != before
    }

    /// Run every hook registered at the time of the call.
    pub fn fire(&self, event: &E) -> usize {
        let snapshot: Vec<Hook<E>> = lock(&self.hooks)
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        snapshot.iter().filter(|hook| hook(event)).count()
    }

    pub fn len(&self) -> usize {
        lock(&self.hooks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for HookList<E> {
    fn default() -> Self {
        Self::new()
    }
}
