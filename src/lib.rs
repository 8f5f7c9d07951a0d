//! mudbus - message broker, chained commands and game lifecycle
//!
//! An in-process, type-routed publish/subscribe broker that decouples the
//! subsystems of a multi-actor simulation, a command manager that resolves
//! player input against per-actor chains of unfinished commands, and a
//! lifecycle state machine that drives registered adapters from
//! configuration through shutdown.

pub mod adapters;
pub mod bus;
pub mod commands;
pub mod config;
pub mod game;
pub mod messages;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;

pub use bus::{Message, MessageBroker, PublishReport, Subscription};
pub use commands::{CommandManager, CommandRegistry, CommandResult, Resolution};
pub use game::{Adapter, AdapterBase, Game, GameBuilder, GameState};
pub use messages::{ActorDeleting, ActorId, CommandRequested, GameStateChanged, InformationalMessage, Verbosity};
