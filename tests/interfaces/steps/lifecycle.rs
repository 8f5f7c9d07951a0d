//! Game lifecycle interface step definitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cucumber::{given, then, when, World};
use mudbus::game::{LifecycleError, Phase};
use mudbus::test_utils::{CallLog, RecordingAdapter};
use mudbus::{Game, GameBuilder, GameState, GameStateChanged};
use tokio::task::JoinHandle;

/// Test context for lifecycle scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct LifecycleWorld {
    names: Vec<String>,
    failing: HashMap<String, Phase>,
    log: CallLog,
    game: Option<Arc<Game>>,
    published: Arc<Mutex<Vec<GameState>>>,
    calls_at_running: Arc<Mutex<Vec<String>>>,
    runner: Option<JoinHandle<Result<(), LifecycleError>>>,
    loop_error: Option<LifecycleError>,
}

impl std::fmt::Debug for LifecycleWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleWorld")
            .field("names", &self.names)
            .field("calls", &self.log.entries())
            .field("loop_error", &self.loop_error)
            .finish()
    }
}

impl LifecycleWorld {
    fn new() -> Self {
        Self {
            names: Vec::new(),
            failing: HashMap::new(),
            log: CallLog::new(),
            game: None,
            published: Arc::new(Mutex::new(Vec::new())),
            calls_at_running: Arc::new(Mutex::new(Vec::new())),
            runner: None,
            loop_error: None,
        }
    }

    /// Build the game on first use, after every Given has run.
    fn game(&mut self) -> Arc<Game> {
        if let Some(game) = &self.game {
            return game.clone();
        }

        let mut builder = GameBuilder::new()
            .with_name("interfaces")
            .with_tick_interval(Duration::from_millis(5));
        for name in &self.names {
            let mut adapter = RecordingAdapter::new(name, &self.log);
            if let Some(phase) = self.failing.get(name) {
                adapter = adapter.failing_in(*phase);
            }
            builder = builder.register_adapter(adapter);
        }
        let game = Arc::new(builder.build());

        let published = self.published.clone();
        let _ = game
            .broker()
            .subscribe(move |change: &GameStateChanged, _sub| {
                published.lock().unwrap().push(change.new_state);
                Ok(())
            });

        let log = self.log.clone();
        let snapshot = self.calls_at_running.clone();
        game.on_transition(move |change| {
            if change.new_state == GameState::Running {
                *snapshot.lock().unwrap() = log.entries();
            }
            true
        });

        self.game = Some(game.clone());
        game
    }
}

fn parse_phase(phase: &str) -> Phase {
    match phase {
        "configure" => Phase::Configure,
        "initialize" => Phase::Initialize,
        "start" => Phase::Start,
        "update" => Phase::Update,
        "delete" => Phase::Delete,
        other => panic!("Unknown phase: {other}"),
    }
}

fn split(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_string()).collect()
}

// ==========================================================================
// Setup
// ==========================================================================

#[given(expr = "adapters {string}")]
async fn given_adapters(world: &mut LifecycleWorld, names: String) {
    world.names = split(&names);
}

#[given(expr = "adapter {string} fails during {string}")]
async fn given_failing_adapter(world: &mut LifecycleWorld, name: String, phase: String) {
    world.failing.insert(name, parse_phase(&phase));
}

// ==========================================================================
// Lifecycle
// ==========================================================================

#[when("the game is configured")]
async fn when_configured(world: &mut LifecycleWorld) {
    world
        .game()
        .configure()
        .await
        .expect("configure failed");
}

#[when("the game is started")]
async fn when_started(world: &mut LifecycleWorld) {
    let game = world.game();
    let runner = game.clone();
    let handle = tokio::spawn(async move { runner.start().await });

    for _ in 0..400 {
        if game.state() == GameState::Running || handle.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    if handle.is_finished() {
        world.loop_error = handle.await.expect("start task panicked").err();
    } else {
        world.runner = Some(handle);
    }
}

#[when("the game is stopped")]
async fn when_stopped(world: &mut LifecycleWorld) {
    world.game().stop().await.expect("stop failed");

    if let Some(handle) = world.runner.take() {
        if let Err(e) = handle.await.expect("start task panicked") {
            world.loop_error = Some(e);
        }
    }
}

// ==========================================================================
// Assertions
// ==========================================================================

#[then(expr = "the adapter calls should be {string}")]
async fn then_calls(world: &mut LifecycleWorld, calls: String) {
    assert_eq!(world.log.entries(), split(&calls));
}

#[then(expr = "the published states should be {string}")]
async fn then_published(world: &mut LifecycleWorld, states: String) {
    let published: Vec<String> = world
        .published
        .lock()
        .unwrap()
        .iter()
        .map(|state| state.to_string())
        .collect();
    assert_eq!(published, split(&states));
}

#[then(expr = "every adapter should have started before {string} was published")]
async fn then_started_before(world: &mut LifecycleWorld, _state: String) {
    let calls = world.calls_at_running.lock().unwrap().clone();
    for name in &world.names {
        let start = format!("{name}.start");
        assert!(calls.contains(&start), "{start} missing from {calls:?}");
    }
}

#[then(expr = "adapter {string} should have been deleted {int} times")]
async fn then_deleted(world: &mut LifecycleWorld, name: String, count: usize) {
    assert_eq!(world.log.count(&format!("{name}.delete")), count);
}

#[then(expr = "the game state should be {string}")]
async fn then_state(world: &mut LifecycleWorld, state: String) {
    assert_eq!(world.game().state().to_string(), state);
}

#[then(expr = "the game loop should have failed in {string}")]
async fn then_loop_failed(world: &mut LifecycleWorld, phase: String) {
    let expected = parse_phase(&phase);
    match &world.loop_error {
        Some(LifecycleError::Adapter { phase, .. }) => assert_eq!(*phase, expected),
        other => panic!("expected an adapter failure, got {other:?}"),
    }
}
