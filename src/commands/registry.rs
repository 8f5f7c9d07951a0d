//! In-memory command factory.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{Command, CommandFactory};
use crate::config::CommandsConfig;

type Constructor = Arc<dyn Fn() -> Box<dyn Command> + Send + Sync>;

/// Maps command tokens to constructors.
///
/// ```ignore
/// let registry = CommandRegistry::new()
///     .with_command("look", || Box::new(LookCommand::default()))
///     .with_command("login", || Box::new(LoginCommand::default()));
/// ```
#[derive(Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, Constructor>,
    case_insensitive: bool,
}

impl CommandRegistry {
    /// Create an empty registry with case-insensitive tokens.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            case_insensitive: true,
        }
    }

    pub fn from_config(config: &CommandsConfig) -> Self {
        Self::new().case_insensitive(config.case_insensitive)
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self.commands = std::mem::take(&mut self.commands)
            .into_iter()
            .map(|(token, ctor)| (self.normalize(&token), ctor))
            .collect();
        self
    }

    pub fn with_command<F>(mut self, token: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Command> + Send + Sync + 'static,
    {
        self.register(token, constructor);
        self
    }

    /// Register (or replace) the constructor for `token`.
    pub fn register<F>(&mut self, token: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Command> + Send + Sync + 'static,
    {
        let token = self.normalize(&token.into());
        debug!(token = %token, "Registered command");
        self.commands.insert(token, Arc::new(constructor));
    }

    /// Registered tokens, sorted.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.commands.keys().cloned().collect();
        tokens.sort();
        tokens
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn normalize(&self, token: &str) -> String {
        if self.case_insensitive {
            token.to_lowercase()
        } else {
            token.to_string()
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandFactory for CommandRegistry {
    fn is_command_available(&self, token: &str) -> bool {
        self.commands.contains_key(&self.normalize(token))
    }

    fn create(&self, token: &str) -> Option<Box<dyn Command>> {
        self.commands.get(&self.normalize(token)).map(|ctor| ctor())
    }
}
