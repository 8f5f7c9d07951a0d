//! In-process message broker.
//!
//! This module contains:
//! - `Message` trait: marks a type as a routable message kind
//! - `MessageBroker`: type-keyed registry with snapshot-based fan-out
//! - `Subscription`: handle returned by every registration
//! - `SubscriptionSet`: owner-side bookkeeping for many handles
//!
//! Dispatch is keyed by the Rust type of the message. Every publish works
//! from a snapshot of the subscriber list taken at the start of the call, so
//! subscribe/unsubscribe may happen concurrently from any thread, including
//! from inside a callback that is currently being invoked.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod broker;
mod dispatch;
pub mod subscription;

pub use broker::{MessageBroker, SubscriptionBuilder};
pub use subscription::{Subscription, SubscriptionSet};

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Error returned by a failing subscriber.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a single subscriber invocation.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Errors that can occur during broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Subscription to '{kind}' has no callback")]
    MissingCallback { kind: &'static str },
}

/// A message kind that can travel over the broker.
///
/// Messages are immutable once published; subscribers receive shared
/// references (or an `Arc` for async subscribers).
pub trait Message: fmt::Debug + Send + Sync + 'static {
    /// Human-readable kind name used in logs.
    const KIND: &'static str;
}

/// Summary of a single publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers whose callback ran to completion.
    pub delivered: usize,
    /// Subscribers whose predicate rejected the message.
    pub filtered: usize,
    /// Subscribers whose predicate or callback errored or panicked.
    pub failed: usize,
    /// Async subscribers handed to the runtime by a synchronous publish.
    pub deferred: usize,
}

impl PublishReport {
    /// Total number of subscribers in the snapshot.
    pub fn total(&self) -> usize {
        self.delivered + self.filtered + self.failed + self.deferred
    }

    /// True when no subscriber was registered for the kind.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub(crate) fn record(&mut self, delivery: dispatch::Delivery) {
        match delivery {
            dispatch::Delivery::Delivered => self.delivered += 1,
            dispatch::Delivery::Filtered => self.filtered += 1,
            dispatch::Delivery::Failed => self.failed += 1,
            dispatch::Delivery::Deferred => self.deferred += 1,
        }
    }
}

// A panicking subscriber must not take the registry down with it, so poisoned
// locks are recovered instead of propagated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
