//! Lifecycle states.

use std::fmt;

/// Phase of a game run.
///
/// A run moves strictly forward:
/// `Configuring → Configured → Starting → Running → Stopping → Stopped`.
/// A stopped game may begin a fresh run at `Configuring`, and a startup that
/// failed in `Starting` may be stopped directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    Configuring,
    Configured,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl GameState {
    /// The next state of a normal run, `None` for `Stopped`.
    pub fn next(self) -> Option<GameState> {
        match self {
            GameState::Configuring => Some(GameState::Configured),
            GameState::Configured => Some(GameState::Starting),
            GameState::Starting => Some(GameState::Running),
            GameState::Running => Some(GameState::Stopping),
            GameState::Stopping => Some(GameState::Stopped),
            GameState::Stopped => None,
        }
    }

    pub fn can_transition_to(self, to: GameState) -> bool {
        self.next() == Some(to)
            || matches!(
                (self, to),
                (GameState::Stopped, GameState::Configuring)
                    | (GameState::Starting, GameState::Stopping)
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameState::Configuring => "configuring",
            GameState::Configured => "configured",
            GameState::Starting => "starting",
            GameState::Running => "running",
            GameState::Stopping => "stopping",
            GameState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
