//! Game lifecycle.
//!
//! This module contains:
//! - `GameState`: the lifecycle states and their legal transitions
//! - `Adapter` trait: a subsystem driven through the lifecycle
//! - `Game`: sequences every adapter through configure, start, the tick
//!   loop and stop, publishing `GameStateChanged` on each transition
//! - `GameBuilder`: fluent construction of a `Game`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::bus::MessageBroker;
use crate::config::GameConfig;
use crate::messages::GameStateChanged;

pub mod adapter;
pub mod hooks;
pub mod state;

pub use adapter::{Adapter, AdapterBase, AdapterError, Phase};
pub use hooks::{HookHandle, HookList};
pub use state::GameState;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors that can occur while driving the lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: GameState, to: GameState },

    #[error("Adapter '{adapter}' failed during {phase}: {source}")]
    Adapter {
        adapter: String,
        phase: Phase,
        #[source]
        source: AdapterError,
    },
}

impl LifecycleError {
    fn adapter(adapter: &dyn Adapter, phase: Phase, source: AdapterError) -> Self {
        Self::Adapter {
            adapter: adapter.name().to_string(),
            phase,
            source,
        }
    }
}

/// Drives registered adapters through the lifecycle.
///
/// `start` runs the tick loop and only returns once the game leaves
/// `Running`, so it is normally spawned:
///
/// ```ignore
/// let game = Arc::new(GameBuilder::new().register_adapter(manager).build());
/// game.configure().await?;
///
/// let runner = game.clone();
/// let handle = tokio::spawn(async move { runner.start().await });
/// // ...
/// game.stop().await?;
/// handle.await??;
/// ```
pub struct Game {
    name: String,
    broker: Arc<MessageBroker>,
    adapters: Vec<Arc<dyn Adapter>>,
    tick_interval: Duration,
    state: watch::Sender<GameState>,
    /// Set once the first run has entered `Configuring`.
    configured: AtomicBool,
    hooks: HookList<GameStateChanged>,
    /// Held by the tick loop for the duration of one iteration.
    loop_idle: tokio::sync::Mutex<()>,
}

impl Game {
    pub fn builder() -> GameBuilder {
        GameBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    pub fn shared_broker(&self) -> Arc<MessageBroker> {
        Arc::clone(&self.broker)
    }

    pub fn state(&self) -> GameState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<GameState> {
        self.state.subscribe()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }

    /// Register a hook run on every transition, before the broker
    /// notification goes out.
    pub fn on_transition<F>(&self, hook: F) -> HookHandle
    where
        F: Fn(&GameStateChanged) -> bool + Send + Sync + 'static,
    {
        self.hooks.register(hook)
    }

    pub fn remove_hook(&self, handle: HookHandle) -> bool {
        self.hooks.remove(handle)
    }

    /// Enter `Configuring`, configure every adapter in registration order,
    /// then enter `Configured`.
    pub async fn configure(&self) -> Result<()> {
        let previous = self.begin_run()?;
        self.announce(previous, GameState::Configuring).await;

        for adapter in &self.adapters {
            debug!(game = %self.name, adapter = %adapter.name(), "Configuring adapter");
            adapter.configure().await.map_err(|source| {
                LifecycleError::adapter(adapter.as_ref(), Phase::Configure, source)
            })?;
        }

        self.transition(GameState::Configured).await
    }

    /// Start every adapter, enter `Running`, and tick until the game leaves
    /// `Running`.
    ///
    /// An adapter error ends the call with the game left in its current
    /// state; [`stop`](Self::stop) still tears everything down.
    pub async fn start(&self) -> Result<()> {
        self.transition(GameState::Starting).await?;

        for adapter in &self.adapters {
            debug!(game = %self.name, adapter = %adapter.name(), "Initializing adapter");
            adapter.initialize().await.map_err(|source| {
                LifecycleError::adapter(adapter.as_ref(), Phase::Initialize, source)
            })?;
            adapter.start(self).await.map_err(|source| {
                LifecycleError::adapter(adapter.as_ref(), Phase::Start, source)
            })?;
        }

        self.transition(GameState::Running).await?;
        self.run_loop().await
    }

    /// Enter `Stopping`, wait for the current tick to finish, delete every
    /// adapter, then enter `Stopped`.
    ///
    /// Every adapter is deleted even if some fail; the first failure is
    /// returned after the game reaches `Stopped`. Must not be awaited from
    /// inside [`Adapter::update`].
    pub async fn stop(&self) -> Result<()> {
        self.transition(GameState::Stopping).await?;

        let _idle = self.loop_idle.lock().await;
        let mut first_error = None;
        for adapter in &self.adapters {
            debug!(game = %self.name, adapter = %adapter.name(), "Deleting adapter");
            if let Err(source) = adapter.delete().await {
                error!(
                    game = %self.name,
                    adapter = %adapter.name(),
                    error = %source,
                    "Adapter failed to delete"
                );
                first_error.get_or_insert(LifecycleError::adapter(
                    adapter.as_ref(),
                    Phase::Delete,
                    source,
                ));
            }
        }

        self.transition(GameState::Stopped).await?;
        first_error.map_or(Ok(()), Err)
    }

    async fn run_loop(&self) -> Result<()> {
        info!(
            game = %self.name,
            adapters = self.adapters.len(),
            tick_interval = ?self.tick_interval(),
            "Game loop running"
        );

        let mut ticker = tokio::time::interval(self.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut state_rx = self.state.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let _idle = self.loop_idle.lock().await;
            if self.state() != GameState::Running {
                break;
            }

            for adapter in &self.adapters {
                if let Err(source) = adapter.update(self).await {
                    error!(
                        game = %self.name,
                        adapter = %adapter.name(),
                        error = %source,
                        "Adapter update failed"
                    );
                    return Err(LifecycleError::adapter(adapter.as_ref(), Phase::Update, source));
                }
            }
        }

        info!(game = %self.name, state = %self.state(), "Game loop exited");
        Ok(())
    }

    /// Enter `Configuring` for a fresh run.
    fn begin_run(&self) -> Result<Option<GameState>> {
        let mut outcome = Ok(None);
        self.state.send_if_modified(|current| match *current {
            GameState::Configuring if !self.configured.swap(true, Ordering::AcqRel) => true,
            GameState::Stopped => {
                outcome = Ok(Some(GameState::Stopped));
                *current = GameState::Configuring;
                true
            }
            from => {
                outcome = Err(LifecycleError::InvalidTransition {
                    from,
                    to: GameState::Configuring,
                });
                false
            }
        });
        outcome
    }

    async fn transition(&self, to: GameState) -> Result<()> {
        let mut outcome = Ok(to);
        self.state.send_if_modified(|current| {
            if current.can_transition_to(to) {
                outcome = Ok(*current);
                *current = to;
                true
            } else {
                outcome = Err(LifecycleError::InvalidTransition { from: *current, to });
                false
            }
        });

        let previous = outcome?;
        self.announce(Some(previous), to).await;
        Ok(())
    }

    async fn announce(&self, previous: Option<GameState>, new_state: GameState) {
        let event = GameStateChanged {
            previous,
            new_state,
        };
        let hooks = self.hooks.fire(&event);
        let report = self.broker.publish_async(event).await;

        info!(
            game = %self.name,
            from = ?previous,
            to = %new_state,
            hooks,
            subscribers = report.total(),
            "Game state changed"
        );
    }
}

/// Builder for a [`Game`].
///
/// ```ignore
/// let game = GameBuilder::new()
///     .with_config(&config.game)
///     .register_adapter(DiagnosticsAdapter::new(Verbosity::High))
///     .register_shared(manager.clone())
///     .build();
/// ```
pub struct GameBuilder {
    name: String,
    tick_interval: Duration,
    broker: Option<Arc<MessageBroker>>,
    adapters: Vec<Arc<dyn Adapter>>,
}

impl GameBuilder {
    pub fn new() -> Self {
        let defaults = GameConfig::default();
        Self {
            name: defaults.name,
            tick_interval: Duration::from_millis(defaults.tick_interval_ms),
            broker: None,
            adapters: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_config(self, config: &GameConfig) -> Self {
        self.with_name(config.name.clone())
            .with_tick_interval(Duration::from_millis(config.tick_interval_ms))
    }

    /// Use an existing broker instead of creating one.
    pub fn with_broker(mut self, broker: Arc<MessageBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn register_adapter<A>(self, adapter: A) -> Self
    where
        A: Adapter + 'static,
    {
        self.register_shared(Arc::new(adapter))
    }

    /// Register an adapter the caller keeps a handle to.
    pub fn register_shared(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn build(self) -> Game {
        let (state, _) = watch::channel(GameState::Configuring);
        // interval() panics on a zero period
        let tick_interval = self.tick_interval.max(Duration::from_millis(1));
        Game {
            name: self.name,
            broker: self.broker.unwrap_or_default(),
            adapters: self.adapters,
            tick_interval,
            state,
            configured: AtomicBool::new(false),
            hooks: HookList::new(),
            loop_idle: tokio::sync::Mutex::new(()),
        }
    }
}

impl Default for GameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
