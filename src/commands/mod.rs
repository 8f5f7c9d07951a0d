//! Chained command resolution.
//!
//! This module contains:
//! - `Command` trait: a single command implementation
//! - `CommandFactory` trait: knows which command tokens exist
//! - `ResultProcessor` trait: delivers results back to the actor
//! - `CommandRegistry`: in-memory `CommandFactory`
//! - `CommandManager`: resolves input against per-actor pending commands
//!
//! A command that returns an incomplete result stays on its actor's pending
//! stack and gets first refusal on that actor's next lines of input. This is
//! how multi-line interactions such as a login prompt are expressed.

use async_trait::async_trait;

use crate::messages::ActorId;

pub mod manager;
pub mod parse;
pub mod registry;

pub use manager::{CommandManager, Resolution};
pub use parse::{split_input, ParsedInput};
pub use registry::CommandRegistry;

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Errors that can occur while executing a command.
///
/// Unknown, rejected and empty input are not errors; see [`Resolution`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Command '{command}' failed: {message}")]
    Failed { command: String, message: String },

    #[error("Command '{command}' failed: {source}")]
    Internal {
        command: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CommandError {
    pub fn failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// One line of input addressed to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub actor: ActorId,
    /// The raw line as received.
    pub text: String,
    pub token: String,
    pub arguments: Vec<String>,
}

impl CommandRequest {
    pub fn new(actor: ActorId, text: impl Into<String>, input: ParsedInput) -> Self {
        Self {
            actor,
            text: text.into(),
            token: input.token,
            arguments: input.arguments,
        }
    }
}

/// Why input could not be turned into a command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The line contained no token.
    InvalidInput,
    /// No command is registered under the token.
    UnknownCommand { token: String },
    /// The command exists but refused to run for this actor.
    Rejected { token: String },
}

/// Outcome of executing a command, handed to the [`ResultProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// `false` means the command expects more input from the same actor.
    pub completed: bool,
    /// Player-facing text, if any.
    pub message: Option<String>,
    /// Set when the input never reached a command.
    pub failure: Option<ResolutionFailure>,
}

impl CommandResult {
    /// A finished command with a message for the player.
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            completed: true,
            message: Some(message.into()),
            failure: None,
        }
    }

    /// A finished command with nothing to say.
    pub fn done() -> Self {
        Self {
            completed: true,
            message: None,
            failure: None,
        }
    }

    /// An unfinished command, optionally prompting the player.
    pub fn pending(prompt: Option<String>) -> Self {
        Self {
            completed: false,
            message: prompt,
            failure: None,
        }
    }

    pub fn failure(failure: ResolutionFailure) -> Self {
        Self {
            completed: true,
            message: None,
            failure: Some(failure),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// A command implementation.
///
/// An instance lives for one chain: it is created when its token is first
/// resolved and kept on the actor's pending stack for as long as it keeps
/// returning incomplete results.
#[async_trait]
pub trait Command: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this command is willing to handle `token` for `actor`.
    ///
    /// For a freshly created command this is the permission check; for a
    /// pending one it decides whether the next line continues the chain.
    async fn can_process(&self, actor: ActorId, token: &str) -> bool;

    /// Run the command for one line of input.
    async fn execute(&mut self, request: &CommandRequest) -> Result<CommandResult>;
}

/// Knows which command tokens exist and instantiates them.
pub trait CommandFactory: Send + Sync {
    fn is_command_available(&self, token: &str) -> bool;

    fn create(&self, token: &str) -> Option<Box<dyn Command>>;
}

/// Delivers command results to the actor that issued them.
#[async_trait]
pub trait ResultProcessor: Send + Sync {
    async fn process(&self, result: &CommandResult, actor: ActorId);
}
