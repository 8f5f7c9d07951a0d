//! Diagnostics adapter.
//!
//! Forwards `InformationalMessage` and `GameStateChanged` traffic to the
//! log. Informational messages more verbose than the configured level are
//! dropped by a broker predicate and never reach the callback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, trace};

use crate::config::DiagnosticsConfig;
use crate::game::{Adapter, AdapterBase, AdapterError, Game};
use crate::messages::{GameStateChanged, InformationalMessage, Verbosity};

/// Logs diagnostic broker traffic through `tracing`.
pub struct DiagnosticsAdapter {
    base: AdapterBase,
    verbosity: Verbosity,
    forwarded: Arc<AtomicUsize>,
}

impl DiagnosticsAdapter {
    /// Forward informational messages up to and including `verbosity`.
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            base: AdapterBase::new("diagnostics"),
            verbosity,
            forwarded: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self::new(config.verbosity)
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Number of informational messages written to the log so far.
    pub fn forwarded(&self) -> usize {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.base.active_subscriptions()
    }
}

#[async_trait]
impl Adapter for DiagnosticsAdapter {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, game: &Game) -> Result<(), AdapterError> {
        let limit = self.verbosity;
        let forwarded = Arc::clone(&self.forwarded);
        let game_name = game.name().to_string();

        self.base.track(
            game.broker()
                .subscription::<InformationalMessage>()
                .filter(move |message| message.verbosity <= limit)
                .handler(move |message, _subscription| {
                    match message.verbosity {
                        Verbosity::Debug => debug!(game = %game_name, "{}", message.text),
                        Verbosity::Full => trace!(game = %game_name, "{}", message.text),
                        Verbosity::Low | Verbosity::High => {
                            info!(game = %game_name, verbosity = %message.verbosity, "{}", message.text)
                        }
                    }
                    forwarded.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                })
                .subscribe()?,
        );

        self.base.track(game.broker().subscribe(
            |change: &GameStateChanged, _subscription| {
                match change.previous {
                    Some(previous) => {
                        debug!(from = %previous, to = %change.new_state, "Observed state change")
                    }
                    None => debug!(to = %change.new_state, "Observed new run"),
                }
                Ok(())
            },
        ));

        debug!(adapter = %self.name(), verbosity = %limit, "Diagnostics forwarding enabled");
        Ok(())
    }

    async fn delete(&self) -> Result<(), AdapterError> {
        self.base.release();
        Ok(())
    }
}
