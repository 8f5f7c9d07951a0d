//! Adapter trait and shared adapter bookkeeping.

use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use super::Game;
use crate::bus::{Subscription, SubscriptionSet};

/// Error returned by an adapter phase.
pub type AdapterError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle phase an adapter is called in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Configure,
    Initialize,
    Start,
    Update,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configure => "configure",
            Phase::Initialize => "initialize",
            Phase::Start => "start",
            Phase::Update => "update",
            Phase::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A subsystem driven by the game lifecycle.
///
/// Every phase is optional except `start` and `delete`, which are where an
/// adapter acquires and releases its subscriptions.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    async fn configure(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn initialize(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn start(&self, game: &Game) -> Result<(), AdapterError>;

    /// Called once per tick while the game is running.
    async fn update(&self, _game: &Game) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Release subscriptions and background work.
    async fn delete(&self) -> Result<(), AdapterError>;
}

/// Name and subscription bookkeeping shared by adapters.
///
/// Embed one in an adapter, `track` every subscription it makes, and call
/// `release` from `delete`.
#[derive(Debug)]
pub struct AdapterBase {
    name: String,
    subscriptions: SubscriptionSet,
}

impl AdapterBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: SubscriptionSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn track(&self, subscription: Subscription) -> Subscription {
        self.subscriptions.track(subscription)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.active_count()
    }

    /// Unsubscribe everything tracked so far. Returns how many were active.
    pub fn release(&self) -> usize {
        let released = self.subscriptions.release_all();
        if released > 0 {
            debug!(adapter = %self.name, released, "Released subscriptions");
        }
        released
    }
}
