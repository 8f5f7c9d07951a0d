//! Per-actor chained command resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    split_input, Command, CommandFactory, CommandRequest, CommandResult, ResolutionFailure,
    ResultProcessor, Result,
};
use crate::bus::{lock, HandlerError, MessageBroker};
use crate::game::{Adapter, AdapterBase, AdapterError, Game};
use crate::messages::{ActorDeleting, ActorId, CommandRequested};

/// How one line of input was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    InvalidInput,
    UnknownCommand { token: String },
    Rejected { token: String },
    Executed {
        command: String,
        completed: bool,
        /// True when a pending command consumed the input.
        resumed: bool,
    },
}

impl Resolution {
    pub fn is_executed(&self) -> bool {
        matches!(self, Resolution::Executed { .. })
    }
}

/// A chained command waiting for more input, with the request that started it.
struct PendingCommand {
    command: Box<dyn Command>,
    origin: CommandRequest,
}

type PendingStack = Arc<tokio::sync::Mutex<Vec<PendingCommand>>>;
type Inbox = mpsc::UnboundedReceiver<String>;
type Mailbox = mpsc::UnboundedSender<String>;

struct Resolver {
    factory: Arc<dyn CommandFactory>,
    processor: Arc<dyn ResultProcessor>,
    actors: Mutex<HashMap<ActorId, PendingStack>>,
    mailboxes: Mutex<HashMap<ActorId, Mailbox>>,
}

impl Resolver {
    /// Get or create the actor's slot. The map lock is never held across an
    /// await; serialization comes from the slot's own async mutex.
    fn slot(&self, actor: ActorId) -> PendingStack {
        let mut actors = lock(&self.actors);
        Arc::clone(actors.entry(actor).or_default())
    }

    /// Drop the actor's slot if it is still the mapped one, holds nothing,
    /// and no other resolution has a handle to it.
    fn release_slot(&self, actor: ActorId, slot: &PendingStack) {
        let mut actors = lock(&self.actors);
        let Some(mapped) = actors.get(&actor) else {
            return;
        };
        if !Arc::ptr_eq(mapped, slot) || Arc::strong_count(slot) != 2 {
            return;
        }
        let empty = slot.try_lock().map(|pending| pending.is_empty()).unwrap_or(false);
        if empty {
            actors.remove(&actor);
        }
    }

    /// Queue a line for `actor`, starting its consumer if it has none.
    fn enqueue(
        self: &Arc<Self>,
        actor: ActorId,
        text: String,
    ) -> std::result::Result<(), HandlerError> {
        let mut mailboxes = lock(&self.mailboxes);
        let text = match mailboxes.get(&actor) {
            Some(mailbox) => match mailbox.send(text) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(text)) => text,
            },
            None => text,
        };

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| HandlerError::from("no async runtime available for command input"))?;
        let (mailbox, inbox) = mpsc::unbounded_channel();
        mailbox
            .send(text)
            .map_err(|_| HandlerError::from("command mailbox closed"))?;
        mailboxes.insert(actor, mailbox.clone());
        runtime.spawn(Arc::clone(self).drain(actor, mailbox, inbox));
        debug!(actor = %actor, "Opened command mailbox");
        Ok(())
    }

    /// Resolve queued lines for one actor in arrival order until the
    /// mailbox is empty.
    async fn drain(self: Arc<Self>, actor: ActorId, own: Mailbox, mut inbox: Inbox) {
        while let Some(text) = self.next_line(actor, &own, &mut inbox) {
            if let Err(e) = self.resolve(actor, &text).await {
                warn!(actor = %actor, error = %e, "Command failed");
            }
        }
        debug!(actor = %actor, "Closed command mailbox");
    }

    /// Next queued line, or `None` after removing the empty mailbox.
    ///
    /// Lines are only sent under the mailbox lock, so a final empty check
    /// under that lock cannot lose one.
    fn next_line(&self, actor: ActorId, own: &Mailbox, inbox: &mut Inbox) -> Option<String> {
        if let Ok(text) = inbox.try_recv() {
            return Some(text);
        }

        let mut mailboxes = lock(&self.mailboxes);
        if let Ok(text) = inbox.try_recv() {
            return Some(text);
        }
        if mailboxes
            .get(&actor)
            .is_some_and(|mailbox| mailbox.same_channel(own))
        {
            mailboxes.remove(&actor);
        }
        None
    }

    async fn resolve(&self, actor: ActorId, text: &str) -> Result<Resolution> {
        let Some(input) = split_input(text) else {
            debug!(actor = %actor, "Empty command input");
            self.report(ResolutionFailure::InvalidInput, actor).await;
            return Ok(Resolution::InvalidInput);
        };
        let request = CommandRequest::new(actor, text, input);

        let slot = self.slot(actor);
        let resolution = self.resolve_in(actor, request, &slot).await;
        self.release_slot(actor, &slot);
        resolution
    }

    async fn resolve_in(
        &self,
        actor: ActorId,
        request: CommandRequest,
        slot: &PendingStack,
    ) -> Result<Resolution> {
        let mut pending = slot.lock().await;

        let mut resumed = None;
        for index in (0..pending.len()).rev() {
            if pending[index]
                .command
                .can_process(actor, &request.token)
                .await
            {
                let discarded = pending.len() - index - 1;
                pending.truncate(index + 1);
                resumed = pending.pop();
                if discarded > 0 {
                    debug!(actor = %actor, discarded, "Discarded newer pending commands");
                }
                break;
            }
        }

        let (mut command, origin, was_resumed) = match resumed {
            Some(entry) => (entry.command, entry.origin, true),
            None => {
                let command = if self.factory.is_command_available(&request.token) {
                    self.factory.create(&request.token)
                } else {
                    None
                };
                let Some(command) = command else {
                    debug!(actor = %actor, token = %request.token, "Unknown command");
                    let token = request.token;
                    self.report(
                        ResolutionFailure::UnknownCommand {
                            token: token.clone(),
                        },
                        actor,
                    )
                    .await;
                    return Ok(Resolution::UnknownCommand { token });
                };

                if !command.can_process(actor, &request.token).await {
                    debug!(actor = %actor, token = %request.token, "Command rejected");
                    let token = request.token;
                    self.report(
                        ResolutionFailure::Rejected {
                            token: token.clone(),
                        },
                        actor,
                    )
                    .await;
                    return Ok(Resolution::Rejected { token });
                }

                (command, request.clone(), false)
            }
        };

        let result = command.execute(&request).await?;
        let name = command.name().to_string();
        self.processor.process(&result, actor).await;

        let completed = result.is_completed();
        if !completed {
            pending.push(PendingCommand { command, origin });
        }

        info!(
            actor = %actor,
            command = %name,
            completed,
            resumed = was_resumed,
            pending = pending.len(),
            "Command executed"
        );

        Ok(Resolution::Executed {
            command: name,
            completed,
            resumed: was_resumed,
        })
    }

    async fn report(&self, failure: ResolutionFailure, actor: ActorId) {
        self.processor
            .process(&CommandResult::failure(failure), actor)
            .await;
    }

    async fn depth(&self, actor: ActorId) -> usize {
        let slot = lock(&self.actors).get(&actor).cloned();
        match slot {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }

    async fn origins(&self, actor: ActorId) -> Vec<CommandRequest> {
        let slot = lock(&self.actors).get(&actor).cloned();
        match slot {
            Some(slot) => slot
                .lock()
                .await
                .iter()
                .map(|entry| entry.origin.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    fn purge(&self, actor: ActorId) -> bool {
        let removed = lock(&self.actors).remove(&actor);
        match removed {
            Some(slot) => {
                // A resolution in flight keeps its own handle to the slot and
                // finishes against it; later input starts from a fresh one.
                if let Ok(mut pending) = slot.try_lock() {
                    pending.clear();
                }
                info!(actor = %actor, "Purged pending commands");
                true
            }
            None => false,
        }
    }
}

/// Adapter that turns `CommandRequested` messages into command executions.
///
/// Each actor has its own stack of pending chained commands. Input for one
/// actor is resolved strictly one line at a time; different actors resolve
/// concurrently.
pub struct CommandManager {
    base: AdapterBase,
    resolver: Arc<Resolver>,
}

impl CommandManager {
    pub fn new(factory: Arc<dyn CommandFactory>, processor: Arc<dyn ResultProcessor>) -> Self {
        Self {
            base: AdapterBase::new("command-manager"),
            resolver: Arc::new(Resolver {
                factory,
                processor,
                actors: Mutex::new(HashMap::new()),
                mailboxes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolve and execute one line of input for `actor`.
    ///
    /// Unknown, rejected and empty input are reported to the result processor
    /// and returned as a [`Resolution`]; only a failing command is an `Err`.
    pub async fn resolve(&self, actor: ActorId, text: &str) -> Result<Resolution> {
        self.resolver.resolve(actor, text).await
    }

    pub async fn handle_request(&self, request: &CommandRequested) -> Result<Resolution> {
        self.resolver.resolve(request.actor, &request.text).await
    }

    /// Number of chained commands waiting on `actor`.
    pub async fn pending_depth(&self, actor: ActorId) -> usize {
        self.resolver.depth(actor).await
    }

    /// Requests that started each of `actor`'s pending commands, oldest first.
    pub async fn pending_origins(&self, actor: ActorId) -> Vec<CommandRequest> {
        self.resolver.origins(actor).await
    }

    /// Number of actors with chained commands waiting.
    pub fn active_actors(&self) -> usize {
        lock(&self.resolver.actors).len()
    }

    /// Drop every pending command for `actor`.
    ///
    /// Returns `false` if the actor had no state.
    pub fn purge_actor(&self, actor: ActorId) -> bool {
        self.resolver.purge(actor)
    }

    /// Subscribe to command requests and actor deletions on `broker`.
    ///
    /// Each request is queued on its actor's mailbox during delivery and
    /// resolved later by that actor's consumer task, so one actor's lines
    /// run in publish order.
    pub fn listen(&self, broker: &MessageBroker) {
        let resolver = Arc::clone(&self.resolver);
        self.base
            .track(broker.subscribe(move |request: &CommandRequested, _subscription| {
                resolver.enqueue(request.actor, request.text.clone())
            }));

        let resolver = Arc::clone(&self.resolver);
        self.base
            .track(broker.subscribe(move |deleting: &ActorDeleting, _subscription| {
                resolver.purge(deleting.actor);
                Ok(())
            }));
    }
}

#[async_trait]
impl Adapter for CommandManager {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, game: &Game) -> std::result::Result<(), AdapterError> {
        self.listen(game.broker());
        debug!(adapter = %self.name(), "Listening for command requests");
        Ok(())
    }

    async fn delete(&self) -> std::result::Result<(), AdapterError> {
        let released = self.base.release();
        lock(&self.resolver.mailboxes).clear();
        let actors = {
            let mut actors = lock(&self.resolver.actors);
            let count = actors.len();
            actors.clear();
            count
        };
        if actors > 0 {
            warn!(actors, "Dropped pending commands on shutdown");
        }
        debug!(adapter = %self.name(), released, "Command manager deleted");
        Ok(())
    }
}
