//! Test utilities and scripted implementations.
//!
//! This module provides recording and scripted implementations of the
//! command and lifecycle traits so tests can drive the command manager and
//! the game without real commands or subsystems.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::bus::lock;
use crate::commands::{
    Command, CommandError, CommandRequest, CommandResult, ResultProcessor,
    Result as CommandOutcome,
};
use crate::game::{Adapter, AdapterError, Game, Phase};
use crate::messages::ActorId;

/// Shared, ordered record of calls made across several test doubles.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Entries matching `entry` exactly.
    pub fn count(&self, entry: &str) -> usize {
        lock(&self.entries).iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        lock(&self.entries).iter().position(|e| e == entry)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result processor that keeps every result it is handed.
#[derive(Debug, Default)]
pub struct RecordingProcessor {
    results: Mutex<Vec<(ActorId, CommandResult)>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<(ActorId, CommandResult)> {
        lock(&self.results).clone()
    }

    pub fn results_for(&self, actor: ActorId) -> Vec<CommandResult> {
        lock(&self.results)
            .iter()
            .filter(|(a, _)| *a == actor)
            .map(|(_, result)| result.clone())
            .collect()
    }

    pub fn last(&self) -> Option<CommandResult> {
        lock(&self.results).last().map(|(_, result)| result.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.results).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` results have arrived.
    ///
    /// Returns `false` on timeout.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.len() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl ResultProcessor for RecordingProcessor {
    async fn process(&self, result: &CommandResult, actor: ActorId) {
        lock(&self.results).push((actor, result.clone()));
    }
}

/// Every execution of scripted commands sharing the log, in order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    executions: Arc<Mutex<Vec<(String, CommandRequest)>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, command: &str, request: &CommandRequest) {
        lock(&self.executions).push((command.to_string(), request.clone()));
    }

    pub fn requests(&self) -> Vec<(String, CommandRequest)> {
        lock(&self.executions).clone()
    }

    /// Tokens `command` was executed with, in order.
    pub fn tokens_for(&self, command: &str) -> Vec<String> {
        lock(&self.executions)
            .iter()
            .filter(|(name, _)| name == command)
            .map(|(_, request)| request.token.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.executions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Command whose behaviour is fixed up front.
///
/// A fresh instance accepts only its own name. Once it has executed, it
/// accepts either any token or the configured continuation tokens, and
/// returns incomplete results until its prompts run out.
#[derive(Debug, Clone)]
pub struct ScriptedCommand {
    name: String,
    permitted: bool,
    fails: bool,
    prompts: usize,
    continuation: Option<Vec<String>>,
    started: bool,
    delay: Option<Duration>,
    log: ExecutionLog,
}

impl ScriptedCommand {
    fn base(name: &str) -> Self {
        Self {
            name: name.to_string(),
            permitted: true,
            fails: false,
            prompts: 0,
            continuation: None,
            started: false,
            delay: None,
            log: ExecutionLog::new(),
        }
    }

    /// Completes on its first execution.
    pub fn completing(name: &str) -> Self {
        Self::base(name)
    }

    /// Returns `prompts` incomplete results before completing.
    pub fn chained(name: &str, prompts: usize) -> Self {
        Self {
            prompts,
            ..Self::base(name)
        }
    }

    /// Refuses every token.
    pub fn rejecting(name: &str) -> Self {
        Self {
            permitted: false,
            ..Self::base(name)
        }
    }

    /// Errors when executed.
    pub fn failing(name: &str) -> Self {
        Self {
            fails: true,
            ..Self::base(name)
        }
    }

    /// Only continue the chain for these tokens.
    pub fn continuing_on(mut self, tokens: &[&str]) -> Self {
        self.continuation = Some(tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Sleep before producing a result.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_log(mut self, log: &ExecutionLog) -> Self {
        self.log = log.clone();
        self
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    async fn can_process(&self, _actor: ActorId, token: &str) -> bool {
        if !self.permitted {
            return false;
        }
        if !self.started {
            return token.eq_ignore_ascii_case(&self.name);
        }
        match &self.continuation {
            Some(tokens) => tokens.iter().any(|t| t.eq_ignore_ascii_case(token)),
            None => true,
        }
    }

    async fn execute(&mut self, request: &CommandRequest) -> CommandOutcome<CommandResult> {
        self.log.record(&self.name, request);
        self.started = true;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fails {
            return Err(CommandError::failed(&self.name, "scripted failure"));
        }
        if self.prompts > 0 {
            self.prompts -= 1;
            return Ok(CommandResult::pending(Some(format!("{}>", self.name))));
        }
        Ok(CommandResult::completed(format!("{} done", self.name)))
    }
}

/// Adapter that logs every lifecycle call as `"<name>.<phase>"`.
#[derive(Debug)]
pub struct RecordingAdapter {
    name: String,
    log: CallLog,
    fail_in: Option<Phase>,
}

impl RecordingAdapter {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail_in: None,
        }
    }

    /// Fail every call of `phase` after logging it.
    pub fn failing_in(mut self, phase: Phase) -> Self {
        self.fail_in = Some(phase);
        self
    }

    fn call(&self, phase: Phase) -> Result<(), AdapterError> {
        self.log.record(format!("{}.{}", self.name, phase));
        if self.fail_in == Some(phase) {
            return Err(format!("{} failed in {}", self.name, phase).into());
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self) -> Result<(), AdapterError> {
        self.call(Phase::Configure)
    }

    async fn initialize(&self) -> Result<(), AdapterError> {
        self.call(Phase::Initialize)
    }

    async fn start(&self, _game: &Game) -> Result<(), AdapterError> {
        self.call(Phase::Start)
    }

    async fn update(&self, _game: &Game) -> Result<(), AdapterError> {
        self.call(Phase::Update)
    }

    async fn delete(&self) -> Result<(), AdapterError> {
        self.call(Phase::Delete)
    }
}
