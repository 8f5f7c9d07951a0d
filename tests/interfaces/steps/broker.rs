//! MessageBroker interface step definitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cucumber::{given, then, when, World};
use mudbus::bus::HandlerError;
use mudbus::{Message, MessageBroker, PublishReport, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    High,
}

impl Severity {
    fn parse(value: &str) -> Self {
        match value {
            "high" => Severity::High,
            "low" => Severity::Low,
            other => panic!("Unknown severity: {other}"),
        }
    }
}

#[derive(Debug)]
pub struct Alarm {
    pub severity: Severity,
}

impl Message for Alarm {
    const KIND: &'static str = "test.alarm";
}

#[derive(Debug)]
pub struct Notice;

impl Message for Notice {
    const KIND: &'static str = "test.notice";
}

/// Test context for broker scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct BrokerWorld {
    broker: MessageBroker,
    invocations: Arc<Mutex<Vec<String>>>,
    subscriptions: HashMap<String, Subscription>,
    last_report: Option<PublishReport>,
}

impl std::fmt::Debug for BrokerWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerWorld")
            .field("subscriptions", &self.subscriptions.len())
            .field("last_report", &self.last_report)
            .finish()
    }
}

impl BrokerWorld {
    fn new() -> Self {
        Self {
            broker: MessageBroker::new(),
            invocations: Arc::new(Mutex::new(Vec::new())),
            subscriptions: HashMap::new(),
            last_report: None,
        }
    }

    fn recorder(&self, name: &str) -> impl Fn() + Send + Sync + 'static {
        let invocations = self.invocations.clone();
        let name = name.to_string();
        move || invocations.lock().unwrap().push(name.clone())
    }

    fn received(&self, name: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == name)
            .count()
    }
}

// ==========================================================================
// Background
// ==========================================================================

#[given("a message broker")]
async fn given_broker(_world: &mut BrokerWorld) {
    // Broker is created via World::new
}

// ==========================================================================
// Subscriptions
// ==========================================================================

#[given(expr = "a subscriber {string} to alarms")]
async fn given_alarm_subscriber(world: &mut BrokerWorld, name: String) {
    let record = world.recorder(&name);
    let subscription = world.broker.subscribe(move |_: &Alarm, _sub| {
        record();
        Ok(())
    });
    world.subscriptions.insert(name, subscription);
}

#[given(expr = "a subscriber {string} to alarms with severity {string}")]
async fn given_filtered_subscriber(world: &mut BrokerWorld, name: String, severity: String) {
    let wanted = Severity::parse(&severity);
    let record = world.recorder(&name);
    let subscription = world
        .broker
        .subscription::<Alarm>()
        .filter(move |alarm| alarm.severity == wanted)
        .handler(move |_, _sub| {
            record();
            Ok(())
        })
        .subscribe()
        .expect("subscription has a handler");
    world.subscriptions.insert(name, subscription);
}

#[given(expr = "a subscriber {string} to notices")]
async fn given_notice_subscriber(world: &mut BrokerWorld, name: String) {
    let record = world.recorder(&name);
    let subscription = world.broker.subscribe(move |_: &Notice, _sub| {
        record();
        Ok(())
    });
    world.subscriptions.insert(name, subscription);
}

#[given(expr = "a subscriber {string} to alarms that unsubscribes itself")]
async fn given_self_removing_subscriber(world: &mut BrokerWorld, name: String) {
    let record = world.recorder(&name);
    let subscription = world.broker.subscribe(move |_: &Alarm, sub| {
        record();
        sub.unsubscribe();
        Ok(())
    });
    world.subscriptions.insert(name, subscription);
}

#[given(expr = "a subscriber {string} to alarms that fails")]
async fn given_failing_subscriber(world: &mut BrokerWorld, name: String) {
    let record = world.recorder(&name);
    let subscription = world.broker.subscribe(move |_: &Alarm, _sub| {
        record();
        Err::<(), HandlerError>("subscriber failed".into())
    });
    world.subscriptions.insert(name, subscription);
}

#[when(expr = "subscriber {string} unsubscribes")]
async fn when_unsubscribe(world: &mut BrokerWorld, name: String) {
    let subscription = world
        .subscriptions
        .get(&name)
        .expect("unknown subscriber");
    world.broker.unsubscribe(subscription);
}

// ==========================================================================
// Publishing
// ==========================================================================

#[when(expr = "I publish an alarm with severity {string}")]
async fn when_publish_alarm(world: &mut BrokerWorld, severity: String) {
    let report = world.broker.publish(Alarm {
        severity: Severity::parse(&severity),
    });
    world.last_report = Some(report);
}

#[when("I publish a notice")]
async fn when_publish_notice(world: &mut BrokerWorld) {
    world.last_report = Some(world.broker.publish(Notice));
}

// ==========================================================================
// Assertions
// ==========================================================================

#[then(expr = "subscriber {string} should have received {int} messages")]
async fn then_received(world: &mut BrokerWorld, name: String, count: usize) {
    assert_eq!(
        world.received(&name),
        count,
        "subscriber '{name}' received the wrong number of messages"
    );
}

#[then(expr = "the invocation order should be {string}")]
async fn then_invocation_order(world: &mut BrokerWorld, order: String) {
    let expected: Vec<String> = order.split(',').map(str::to_string).collect();
    assert_eq!(*world.invocations.lock().unwrap(), expected);
}

#[then(expr = "the last publish should have reached {int} subscribers")]
async fn then_reached(world: &mut BrokerWorld, count: usize) {
    let report = world.last_report.expect("nothing published");
    assert_eq!(report.total(), count);
}

#[then(expr = "the last publish should show {int} delivered and {int} failed")]
async fn then_report(world: &mut BrokerWorld, delivered: usize, failed: usize) {
    let report = world.last_report.expect("nothing published");
    assert_eq!(report.delivered, delivered);
    assert_eq!(report.failed, failed);
}

#[then(expr = "there should be {int} alarm subscribers")]
async fn then_subscriber_count(world: &mut BrokerWorld, count: usize) {
    assert_eq!(world.broker.subscriber_count::<Alarm>(), count);
}
