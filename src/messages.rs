//! Message kinds exchanged on the broker.
//!
//! Each kind is its own type; the broker routes on the type, never on a
//! field inside the payload.

use std::fmt;

use serde::Deserialize;
use uuid::Uuid;

use crate::bus::Message;
use crate::game::GameState;

/// Stable identity of an actor (player, NPC, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generate a fresh random actor id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a deterministic actor id from a name.
    ///
    /// The same name always maps to the same id, which lets transports
    /// address actors by login name.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ActorId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A raw line of input from an actor, produced by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequested {
    pub text: String,
    pub actor: ActorId,
}

impl CommandRequested {
    pub fn new(actor: ActorId, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actor,
        }
    }
}

impl Message for CommandRequested {
    const KIND: &'static str = "command.requested";
}

/// Published by the game on every lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameStateChanged {
    /// State before the transition, `None` when a fresh run begins.
    pub previous: Option<GameState>,
    pub new_state: GameState,
}

impl Message for GameStateChanged {
    const KIND: &'static str = "game.state_changed";
}

/// How much output a diagnostic message needs before it is shown.
///
/// Levels are ordered from least to most output: a sink configured at
/// `High` shows `Low` and `High` messages but not `Full` or `Debug` ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Low,
    High,
    Full,
    Debug,
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verbosity::Low => "low",
            Verbosity::High => "high",
            Verbosity::Full => "full",
            Verbosity::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Free-form diagnostic text tagged with a verbosity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationalMessage {
    pub text: String,
    pub verbosity: Verbosity,
}

impl InformationalMessage {
    pub fn new(verbosity: Verbosity, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            verbosity,
        }
    }

    pub fn debug(text: impl Into<String>) -> Self {
        Self::new(Verbosity::Debug, text)
    }
}

impl Message for InformationalMessage {
    const KIND: &'static str = "diagnostics.informational";
}

/// Published by the actor lifecycle right before an actor is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorDeleting {
    pub actor: ActorId,
}

impl Message for ActorDeleting {
    const KIND: &'static str = "actor.deleting";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_from_name_is_stable() {
        assert_eq!(ActorId::from_name("bob"), ActorId::from_name("bob"));
        assert_ne!(ActorId::from_name("bob"), ActorId::from_name("alice"));
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Low < Verbosity::High);
        assert!(Verbosity::High < Verbosity::Full);
        assert!(Verbosity::Full < Verbosity::Debug);
    }

    #[test]
    fn test_verbosity_deserializes_lowercase() {
        let level: Verbosity = serde_yaml::from_str("full").unwrap();
        assert_eq!(level, Verbosity::Full);
    }
}
