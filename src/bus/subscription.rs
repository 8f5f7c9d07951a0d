//! Subscription handles and per-registration records.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;
use uuid::Uuid;

use super::{lock, HandlerResult};

pub(crate) type SyncCallback<M> = Arc<dyn Fn(&M, &Subscription) -> HandlerResult + Send + Sync>;
pub(crate) type AsyncCallback<M> =
    Arc<dyn Fn(Arc<M>, Subscription) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub(crate) type SyncPredicate<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;
pub(crate) type AsyncPredicate<M> = Arc<dyn Fn(Arc<M>) -> BoxFuture<'static, bool> + Send + Sync>;

type Detach = Box<dyn FnOnce() + Send>;

pub(crate) enum Callback<M> {
    Sync(SyncCallback<M>),
    Async(AsyncCallback<M>),
}

impl<M: 'static> Callback<M> {
    pub(crate) fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(&M, &Subscription) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(callback))
    }

    pub(crate) fn from_async<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<M>, Subscription) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |message: Arc<M>, subscription: Subscription| {
            callback(message, subscription).boxed()
        }))
    }
}

pub(crate) enum Predicate<M> {
    Sync(SyncPredicate<M>),
    Async(AsyncPredicate<M>),
}

impl<M: 'static> Predicate<M> {
    pub(crate) fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(predicate))
    }

    pub(crate) fn from_async<F, Fut>(predicate: F) -> Self
    where
        F: Fn(Arc<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::Async(Arc::new(move |message: Arc<M>| predicate(message).boxed()))
    }
}

/// Broker-side record of one registration.
pub(crate) struct Notification<M> {
    pub(crate) subscription: Subscription,
    pub(crate) callback: Callback<M>,
    pub(crate) predicate: Option<Predicate<M>>,
}

impl<M> Notification<M> {
    /// True if dispatch needs an async runtime.
    pub(crate) fn is_async(&self) -> bool {
        matches!(self.callback, Callback::Async(_))
            || matches!(self.predicate, Some(Predicate::Async(_)))
    }
}

struct SubscriptionInner {
    id: Uuid,
    kind: &'static str,
    active: AtomicBool,
    detach: Mutex<Option<Detach>>,
}

/// Handle for one registered interest in a message kind.
///
/// Cloning yields another handle to the same registration. The handle is
/// active from creation until the first `unsubscribe()`; later calls are
/// no-ops.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                id: Uuid::new_v4(),
                kind,
                active: AtomicBool::new(true),
                detach: Mutex::new(None),
            }),
        }
    }

    /// Install the hook that removes the record from the broker.
    pub(crate) fn bind_detach(&self, detach: Detach) {
        *lock(&self.inner.detach) = Some(detach);
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Kind name of the message this handle listens to.
    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Remove this registration from the broker.
    ///
    /// Returns `true` if this call deactivated the handle, `false` if it was
    /// already inactive. Safe to call from inside the handle's own callback.
    pub fn unsubscribe(&self) -> bool {
        if !self.inner.active.swap(false, Ordering::AcqRel) {
            return false;
        }

        let detach = lock(&self.inner.detach).take();
        if let Some(detach) = detach {
            detach();
        }

        debug!(kind = self.inner.kind, subscription = %self.inner.id, "Unsubscribed");
        true
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Set of handles owned by one component.
///
/// Everything still tracked is unsubscribed when the set is released or
/// dropped.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a handle and hand it back.
    pub fn track(&self, subscription: Subscription) -> Subscription {
        lock(&self.subscriptions).push(subscription.clone());
        subscription
    }

    /// Number of tracked handles that are still active.
    pub fn active_count(&self) -> usize {
        lock(&self.subscriptions)
            .iter()
            .filter(|s| s.is_active())
            .count()
    }

    /// Unsubscribe every tracked handle.
    ///
    /// Returns how many handles were still active.
    pub fn release_all(&self) -> usize {
        let subscriptions = std::mem::take(&mut *lock(&self.subscriptions));
        subscriptions
            .iter()
            .filter(|subscription| subscription.unsubscribe())
            .count()
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.release_all();
    }
}
