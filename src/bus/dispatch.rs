//! Per-subscriber delivery.
//!
//! Every subscriber is isolated: an `Err` or a panic is logged and reported
//! as `Delivery::Failed`, and dispatch continues with the next subscriber.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, warn};

use super::subscription::{Callback, Notification, Predicate, Subscription};
use super::{HandlerResult, Message};

/// What happened to one subscriber during a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    Filtered,
    Failed,
    Deferred,
}

/// Deliver inline, or spawn onto the runtime if the subscriber is async.
pub(crate) fn deliver<M: Message>(
    notification: &Arc<Notification<M>>,
    message: &Arc<M>,
) -> Delivery {
    if notification.is_async() {
        return defer(Arc::clone(notification), Arc::clone(message));
    }

    if let Some(Predicate::Sync(predicate)) = &notification.predicate {
        match catch_unwind(AssertUnwindSafe(|| predicate(&**message))) {
            Ok(true) => {}
            Ok(false) => return Delivery::Filtered,
            Err(panic) => {
                log_panic(&notification.subscription, "predicate", &*panic);
                return Delivery::Failed;
            }
        }
    }

    match &notification.callback {
        Callback::Sync(callback) => {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                callback(&**message, &notification.subscription)
            }));
            settle(&notification.subscription, outcome)
        }
        // is_async() already routed async callbacks to defer()
        Callback::Async(_) => defer(Arc::clone(notification), Arc::clone(message)),
    }
}

/// Await a single subscriber: predicate first, then callback.
pub(crate) async fn process_async<M: Message>(
    notification: Arc<Notification<M>>,
    message: Arc<M>,
) -> Delivery {
    let subscription = &notification.subscription;

    let accepted = match &notification.predicate {
        None => Ok(true),
        Some(Predicate::Sync(predicate)) => {
            catch_unwind(AssertUnwindSafe(|| predicate(&*message)))
        }
        Some(Predicate::Async(predicate)) => {
            let pending = Arc::clone(&message);
            AssertUnwindSafe(async move { predicate(pending).await })
                .catch_unwind()
                .await
        }
    };

    match accepted {
        Ok(true) => {}
        Ok(false) => return Delivery::Filtered,
        Err(panic) => {
            log_panic(subscription, "predicate", &*panic);
            return Delivery::Failed;
        }
    }

    match &notification.callback {
        Callback::Async(callback) => {
            let pending = Arc::clone(&message);
            let handle = subscription.clone();
            let outcome = AssertUnwindSafe(async move { callback(pending, handle).await })
                .catch_unwind()
                .await;
            settle(subscription, outcome)
        }
        Callback::Sync(callback) => {
            let callback = Arc::clone(callback);
            let pending = Arc::clone(&message);
            let handle = subscription.clone();
            match tokio::task::spawn_blocking(move || callback(&*pending, &handle)).await {
                Ok(result) => settle(subscription, Ok(result)),
                Err(join_error) => {
                    error!(
                        kind = subscription.kind(),
                        subscription = %subscription.id(),
                        error = %join_error,
                        "Subscriber task failed"
                    );
                    Delivery::Failed
                }
            }
        }
    }
}

fn defer<M: Message>(notification: Arc<Notification<M>>, message: Arc<M>) -> Delivery {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                process_async(notification, message).await;
            });
            Delivery::Deferred
        }
        Err(_) => {
            warn!(
                kind = notification.subscription.kind(),
                subscription = %notification.subscription.id(),
                "No async runtime available, async subscriber skipped"
            );
            Delivery::Failed
        }
    }
}

fn settle(
    subscription: &Subscription,
    outcome: std::thread::Result<HandlerResult>,
) -> Delivery {
    match outcome {
        Ok(Ok(())) => Delivery::Delivered,
        Ok(Err(e)) => {
            error!(
                kind = subscription.kind(),
                subscription = %subscription.id(),
                error = %e,
                "Subscriber failed"
            );
            Delivery::Failed
        }
        Err(panic) => {
            log_panic(subscription, "callback", &*panic);
            Delivery::Failed
        }
    }
}

fn log_panic(subscription: &Subscription, stage: &str, panic: &(dyn Any + Send)) {
    error!(
        kind = subscription.kind(),
        subscription = %subscription.id(),
        stage,
        panic = panic_message(panic),
        "Subscriber panicked"
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
