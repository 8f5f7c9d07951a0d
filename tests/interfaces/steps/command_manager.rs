//! CommandManager interface step definitions.

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when, World};
use mudbus::commands::CommandError;
use mudbus::test_utils::{ExecutionLog, RecordingProcessor, ScriptedCommand};
use mudbus::{
    ActorDeleting, ActorId, CommandManager, CommandRegistry, CommandRequested, MessageBroker,
    Resolution,
};

/// Test context for command resolution scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct CommandWorld {
    broker: MessageBroker,
    manager: CommandManager,
    processor: Arc<RecordingProcessor>,
    log: ExecutionLog,
    last: Option<Result<Resolution, CommandError>>,
}

impl std::fmt::Debug for CommandWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWorld")
            .field("results", &self.processor.len())
            .field("executions", &self.log.len())
            .field("last", &self.last)
            .finish()
    }
}

impl CommandWorld {
    fn new() -> Self {
        let log = ExecutionLog::new();
        let (look, login, quest, shout) = (log.clone(), log.clone(), log.clone(), log.clone());

        let registry = CommandRegistry::new()
            .with_command("look", move || {
                Box::new(ScriptedCommand::completing("look").with_log(&look))
            })
            .with_command("login", move || {
                Box::new(
                    ScriptedCommand::chained("login", 1)
                        .continuing_on(&["mypassword"])
                        .with_log(&login),
                )
            })
            .with_command("quest", move || {
                Box::new(
                    ScriptedCommand::chained("quest", 2)
                        .continuing_on(&["north"])
                        .with_log(&quest),
                )
            })
            .with_command("shout", move || {
                Box::new(ScriptedCommand::rejecting("shout").with_log(&shout))
            });

        let processor = Arc::new(RecordingProcessor::new());
        Self {
            broker: MessageBroker::new(),
            manager: CommandManager::new(Arc::new(registry), processor.clone()),
            processor,
            log,
            last: None,
        }
    }
}

// ==========================================================================
// Background
// ==========================================================================

#[given("a command manager listening on the broker")]
async fn given_manager(world: &mut CommandWorld) {
    world.manager.listen(&world.broker);
}

// ==========================================================================
// Input
// ==========================================================================

#[when(expr = "{string} enters {string}")]
async fn when_enters(world: &mut CommandWorld, actor: String, text: String) {
    let actor = ActorId::from_name(&actor);
    world.last = Some(world.manager.resolve(actor, &text).await);
}

#[when(expr = "{string} sends {string} over the broker")]
async fn when_sends(world: &mut CommandWorld, actor: String, text: String) {
    let report = world
        .broker
        .publish(CommandRequested::new(ActorId::from_name(&actor), text));
    assert_eq!(report.delivered, 1);
}

#[when(expr = "the result processor has received {int} results")]
async fn when_results_arrive(world: &mut CommandWorld, count: usize) {
    assert!(
        world.processor.wait_for(count, Duration::from_secs(2)).await,
        "timed out waiting for {count} results"
    );
}

#[when(expr = "actor {string} is deleted")]
async fn when_actor_deleted(world: &mut CommandWorld, actor: String) {
    world
        .broker
        .publish_async(ActorDeleting {
            actor: ActorId::from_name(&actor),
        })
        .await;
}

// ==========================================================================
// Assertions
// ==========================================================================

#[then(expr = "the last resolution should be {string}")]
async fn then_last_resolution(world: &mut CommandWorld, expected: String) {
    let resolution = world
        .last
        .as_ref()
        .expect("no input entered")
        .as_ref()
        .expect("command failed");

    let actual = match resolution {
        Resolution::InvalidInput => "invalid",
        Resolution::UnknownCommand { .. } => "unknown",
        Resolution::Rejected { .. } => "rejected",
        Resolution::Executed { resumed: true, .. } => "resumed",
        Resolution::Executed {
            completed: false, ..
        } => "pending",
        Resolution::Executed { .. } => "executed",
    };
    assert_eq!(actual, expected, "resolution was {resolution:?}");
}

#[then(expr = "{string} should have {int} pending commands")]
async fn then_pending(world: &mut CommandWorld, actor: String, count: usize) {
    let depth = world
        .manager
        .pending_depth(ActorId::from_name(&actor))
        .await;
    assert_eq!(depth, count);
}

#[then(expr = "the result processor should have received {int} results for {string}")]
async fn then_results(world: &mut CommandWorld, count: usize, actor: String) {
    let results = world.processor.results_for(ActorId::from_name(&actor));
    assert_eq!(results.len(), count);
}

#[then(expr = "command {string} should have run with tokens {string}")]
async fn then_tokens(world: &mut CommandWorld, command: String, tokens: String) {
    let expected: Vec<String> = tokens.split(',').map(str::to_string).collect();
    assert_eq!(world.log.tokens_for(&command), expected);
}

#[then("no actor should have pending commands")]
async fn then_no_active_actors(world: &mut CommandWorld) {
    assert_eq!(world.manager.active_actors(), 0);
}
