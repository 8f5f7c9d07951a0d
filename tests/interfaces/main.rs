//! Interface tests for mudbus using Cucumber.
//!
//! These tests describe the observable contract of the broker, the command
//! manager and the game lifecycle in Gherkin scenarios.
//!
//! ```bash
//! cargo test --test interfaces --features test-utils
//!
//! # With logs
//! MUDBUS_LOG=debug cargo test --test interfaces --features test-utils
//! ```

mod steps;

use cucumber::World;
use mudbus::config::LOG_ENV_VAR;
use steps::broker::BrokerWorld;
use steps::command_manager::CommandWorld;
use steps::lifecycle::LifecycleWorld;

#[tokio::main]
async fn main() {
    if std::env::var(LOG_ENV_VAR).is_ok() {
        mudbus::utils::bootstrap::init_tracing();
    }

    // Run MessageBroker tests
    println!("\n=== Running MessageBroker Interface Tests ===\n");
    BrokerWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/broker.feature")
        .await;

    // Run CommandManager tests
    println!("\n=== Running CommandManager Interface Tests ===\n");
    CommandWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/command_manager.feature")
        .await;

    // Run Game lifecycle tests
    println!("\n=== Running Game Lifecycle Interface Tests ===\n");
    LifecycleWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/interfaces/features/lifecycle.feature")
        .await;
}
