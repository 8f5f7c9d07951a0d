//! Type-keyed message broker.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};
use uuid::Uuid;

use super::dispatch;
use super::subscription::{Callback, Notification, Predicate, Subscription};
use super::{lock, read, write, BusError, HandlerResult, Message, PublishReport, Result};

/// Subscribers of one message kind, in registration order.
struct Topic<M> {
    notifications: Mutex<Vec<Arc<Notification<M>>>>,
}

impl<M: Message> Topic<M> {
    fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, notification: Arc<Notification<M>>) -> usize {
        let mut notifications = lock(&self.notifications);
        notifications.push(notification);
        notifications.len()
    }

    fn remove(&self, id: Uuid) -> bool {
        let mut notifications = lock(&self.notifications);
        let before = notifications.len();
        notifications.retain(|n| n.subscription.id() != id);
        notifications.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<Notification<M>>> {
        lock(&self.notifications).clone()
    }

    fn len(&self) -> usize {
        lock(&self.notifications).len()
    }
}

/// In-process publish/subscribe broker.
///
/// Subscribers register per message type and are invoked in registration
/// order. Each kind has its own lock, so registrations for different kinds
/// never contend, and a publish holds that lock only long enough to copy
/// the subscriber list.
///
/// # Example
///
/// ```ignore
/// let broker = MessageBroker::new();
/// let subscription = broker.subscribe(|msg: &InformationalMessage, _sub| {
///     println!("{}", msg.text);
///     Ok(())
/// });
///
/// broker.publish(InformationalMessage::debug("hello"));
/// subscription.unsubscribe();
/// ```
#[derive(Default)]
pub struct MessageBroker {
    topics: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a subscription with a predicate and/or async parts.
    pub fn subscription<M: Message>(&self) -> SubscriptionBuilder<'_, M> {
        SubscriptionBuilder {
            broker: self,
            callback: None,
            predicate: None,
            _kind: PhantomData,
        }
    }

    /// Subscribe a synchronous callback to every message of kind `M`.
    pub fn subscribe<M, F>(&self, callback: F) -> Subscription
    where
        M: Message,
        F: Fn(&M, &Subscription) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(Callback::from_fn(callback), None)
    }

    /// Subscribe a synchronous callback guarded by a predicate.
    pub fn subscribe_filtered<M, P, F>(&self, predicate: P, callback: F) -> Subscription
    where
        M: Message,
        P: Fn(&M) -> bool + Send + Sync + 'static,
        F: Fn(&M, &Subscription) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(
            Callback::from_fn(callback),
            Some(Predicate::from_fn(predicate)),
        )
    }

    /// Subscribe an async callback to every message of kind `M`.
    pub fn subscribe_async<M, F, Fut>(&self, callback: F) -> Subscription
    where
        M: Message,
        F: Fn(Arc<M>, Subscription) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(Callback::from_async(callback), None)
    }

    /// Number of registrations currently held for kind `M`.
    pub fn subscriber_count<M: Message>(&self) -> usize {
        self.topic::<M>().map(|topic| topic.len()).unwrap_or(0)
    }

    /// Remove a registration. Equivalent to `subscription.unsubscribe()`.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.unsubscribe()
    }

    /// Publish a message to the current subscribers of its kind.
    ///
    /// Synchronous subscribers run inline, in registration order. Subscribers
    /// with an async callback or predicate are spawned onto the current tokio
    /// runtime and counted as deferred. Failures of one subscriber never stop
    /// delivery to the next.
    pub fn publish<M: Message>(&self, message: M) -> PublishReport {
        self.publish_arc(Arc::new(message))
    }

    /// Same as [`publish`](Self::publish) for a message that is already shared.
    pub fn publish_arc<M: Message>(&self, message: Arc<M>) -> PublishReport {
        let snapshot = self.snapshot::<M>();
        if snapshot.is_empty() {
            trace!(kind = M::KIND, "Published with no subscribers");
            return PublishReport::default();
        }

        let mut report = PublishReport::default();
        for notification in snapshot {
            report.record(dispatch::deliver(&notification, &message));
        }

        debug!(
            kind = M::KIND,
            delivered = report.delivered,
            filtered = report.filtered,
            failed = report.failed,
            deferred = report.deferred,
            "Published message"
        );
        report
    }

    /// Publish and await every subscriber, in registration order.
    ///
    /// Async predicates are awaited before async callbacks. Synchronous
    /// callbacks run on the blocking pool so a slow subscriber never stalls
    /// the publishing task.
    pub async fn publish_async<M: Message>(&self, message: M) -> PublishReport {
        let snapshot = self.snapshot::<M>();
        if snapshot.is_empty() {
            trace!(kind = M::KIND, "Published with no subscribers");
            return PublishReport::default();
        }

        let message = Arc::new(message);
        let mut report = PublishReport::default();
        for notification in snapshot {
            report.record(dispatch::process_async(notification, Arc::clone(&message)).await);
        }

        debug!(
            kind = M::KIND,
            delivered = report.delivered,
            filtered = report.filtered,
            failed = report.failed,
            "Published message asynchronously"
        );
        report
    }

    fn snapshot<M: Message>(&self) -> Vec<Arc<Notification<M>>> {
        self.topic::<M>()
            .map(|topic| topic.snapshot())
            .unwrap_or_default()
    }

    fn topic<M: Message>(&self) -> Option<Arc<Topic<M>>> {
        let topics = read(&self.topics);
        topics
            .get(&TypeId::of::<M>())
            .cloned()
            .and_then(|topic| topic.downcast::<Topic<M>>().ok())
    }

    fn topic_or_create<M: Message>(&self) -> Arc<Topic<M>> {
        if let Some(topic) = self.topic::<M>() {
            return topic;
        }

        let mut topics = write(&self.topics);
        let existing = topics
            .get(&TypeId::of::<M>())
            .cloned()
            .and_then(|topic| topic.downcast::<Topic<M>>().ok());
        if let Some(topic) = existing {
            return topic;
        }

        let topic = Arc::new(Topic::<M>::new());
        topics.insert(TypeId::of::<M>(), topic.clone());
        topic
    }

    fn insert<M: Message>(
        &self,
        callback: Callback<M>,
        predicate: Option<Predicate<M>>,
    ) -> Subscription {
        let topic = self.topic_or_create::<M>();
        let subscription = Subscription::new(M::KIND);

        let id = subscription.id();
        let weak_topic = Arc::downgrade(&topic);
        subscription.bind_detach(Box::new(move || {
            if let Some(topic) = weak_topic.upgrade() {
                topic.remove(id);
            }
        }));

        let count = topic.push(Arc::new(Notification {
            subscription: subscription.clone(),
            callback,
            predicate,
        }));

        debug!(
            kind = M::KIND,
            subscription = %id,
            subscribers = count,
            "Subscribed"
        );
        subscription
    }
}

/// Fluent registration for subscriptions with predicates or async parts.
///
/// ```ignore
/// let subscription = broker
///     .subscription::<Alarm>()
///     .filter(|alarm| alarm.severity == Severity::High)
///     .handler(|alarm, _sub| page_operator(alarm))
///     .subscribe()?;
/// ```
pub struct SubscriptionBuilder<'a, M> {
    broker: &'a MessageBroker,
    callback: Option<Callback<M>>,
    predicate: Option<Predicate<M>>,
    _kind: PhantomData<fn(M)>,
}

impl<'a, M: Message> SubscriptionBuilder<'a, M> {
    pub fn filter<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Predicate::from_fn(predicate));
        self
    }

    pub fn filter_async<P, Fut>(mut self, predicate: P) -> Self
    where
        P: Fn(Arc<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.predicate = Some(Predicate::from_async(predicate));
        self
    }

    pub fn handler<F>(mut self, callback: F) -> Self
    where
        F: Fn(&M, &Subscription) -> HandlerResult + Send + Sync + 'static,
    {
        self.callback = Some(Callback::from_fn(callback));
        self
    }

    pub fn handler_async<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<M>, Subscription) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.callback = Some(Callback::from_async(callback));
        self
    }

    /// Register the subscription.
    ///
    /// Fails with [`BusError::MissingCallback`] if no handler was set.
    pub fn subscribe(self) -> Result<Subscription> {
        let callback = self
            .callback
            .ok_or(BusError::MissingCallback { kind: M::KIND })?;
        Ok(self.broker.insert(callback, self.predicate))
    }
}
