//! End-to-end coordinator behavior: failure reporting, retries, recovery,
//! timeouts, and monitor lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use uitask::actor::{Capability, Params};
use uitask::state::StateSnapshot;
use uitask::{
    ActionExecutor, ActionRequest, Actor, ActorRegistry, AutomationConfig, AutomationError,
    StateSource, Task, TaskCoordinator,
};

/// Fails an action a fixed number of times, then succeeds. A "launch"
/// recovery action flips the failing action to succeed immediately.
struct FlakyActor {
    fail_remaining: Arc<AtomicUsize>,
    recovered: Arc<AtomicBool>,
    delay: Duration,
}

#[async_trait]
impl Actor for FlakyActor {
    fn name(&self) -> &str {
        "ui"
    }

    fn capabilities(&self) -> HashMap<String, Capability> {
        HashMap::new()
    }

    async fn validate_state(&self) -> bool {
        true
    }

    async fn execute(&self, action: &str, _params: &Params) -> Result<Value, AutomationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if action == "launch" {
            self.recovered.store(true, Ordering::SeqCst);
            return Ok(json!({"launched": true}));
        }
        if self.recovered.load(Ordering::SeqCst) {
            return Ok(Value::Null);
        }
        if self.fail_remaining.load(Ordering::SeqCst) > 0 {
            self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(AutomationError::ActionFailed {
                action: action.to_string(),
                message: "element not found".to_string(),
            });
        }
        Ok(Value::Null)
    }
}

struct StaticSource {
    snapshot: StateSnapshot,
}

#[async_trait]
impl StateSource for StaticSource {
    async fn capture_snapshot(&self) -> StateSnapshot {
        self.snapshot.clone()
    }
}

/// Alternates the focused app on every capture, so the monitor always has a
/// diff to record.
struct ChurningSource {
    captures: AtomicUsize,
}

#[async_trait]
impl StateSource for ChurningSource {
    async fn capture_snapshot(&self) -> StateSnapshot {
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = StateSnapshot::empty();
        snapshot.focused_app = Some(if n % 2 == 0 { "Notes" } else { "Mail" }.to_string());
        snapshot
    }
}

struct Harness {
    coordinator: TaskCoordinator,
    state: Arc<dyn StateSource>,
}

fn harness(failures: usize, action_delay: Duration, config: AutomationConfig) -> Harness {
    harness_with_source(
        failures,
        action_delay,
        config,
        Arc::new(StaticSource {
            snapshot: StateSnapshot::empty(),
        }),
    )
}

fn harness_with_source(
    failures: usize,
    action_delay: Duration,
    config: AutomationConfig,
    state: Arc<dyn StateSource>,
) -> Harness {
    let actor_failures = Arc::new(AtomicUsize::new(failures));
    let recovered = Arc::new(AtomicBool::new(false));

    let mut registry = ActorRegistry::new();
    registry.register("ui", move || {
        Arc::new(FlakyActor {
            fail_remaining: actor_failures.clone(),
            recovered: recovered.clone(),
            delay: action_delay,
        })
    });

    let actions = Arc::new(ActionExecutor::new(registry, config.max_concurrent_actions));
    let coordinator = TaskCoordinator::new(config, actions, state.clone());
    Harness { coordinator, state }
}

fn click(params: Map<String, Value>) -> ActionRequest {
    ActionRequest::new("ui", "click", params)
}

#[tokio::test]
async fn failing_action_without_retry_fails_the_task() {
    let mut h = harness(usize::MAX, Duration::ZERO, AutomationConfig::default());
    let params = json!({"x": 10, "y": 10}).as_object().cloned().unwrap();
    h.coordinator
        .submit(Task::new("t1", "single click").action(click(params)))
        .unwrap();

    h.coordinator.run().await;

    let result = h.coordinator.result("t1").unwrap();
    assert!(!result.success);
    assert!(!result.recovery_attempted);
    assert_eq!(result.action_results.len(), 1);
    assert!(result.error.as_deref().unwrap().contains("click"));
}

#[tokio::test]
async fn retry_policy_produces_one_result_per_attempt() {
    // Fails twice, succeeds on the third attempt.
    let mut h = harness(2, Duration::ZERO, AutomationConfig::default());
    h.coordinator
        .submit(
            Task::new("t1", "flaky click")
                .action(click(Map::new()))
                .retry("click", 2, Duration::ZERO),
        )
        .unwrap();

    h.coordinator.run().await;

    let result = h.coordinator.result("t1").unwrap();
    assert!(result.success);
    assert_eq!(result.action_results.len(), 3);
    assert!(!result.action_results[0].success);
    assert!(!result.action_results[1].success);
    assert!(result.action_results[2].success);
    for (index, attempt) in result.action_results.iter().enumerate() {
        assert_eq!(attempt.details["attempt"], json!(index as u32 + 1));
    }
}

#[tokio::test]
async fn successful_recovery_reexecutes_the_body() {
    // The click fails until the "launch" recovery action runs.
    let mut h = harness(usize::MAX, Duration::ZERO, AutomationConfig::default());
    h.coordinator
        .submit(
            Task::new("t1", "click with recovery")
                .action(click(Map::new()))
                .recovery_action(ActionRequest::new("ui", "launch", Map::new())),
        )
        .unwrap();

    h.coordinator.run().await;

    let result = h.coordinator.result("t1").unwrap();
    assert!(result.success);
    assert!(result.recovery_attempted);
    // Failed click, launch, successful click.
    assert_eq!(result.action_results.len(), 3);
    assert_eq!(result.action_results[1].action, "launch");
    assert!(result.action_results[2].success);
}

#[tokio::test]
async fn failed_recovery_keeps_the_original_error() {
    let mut h = harness(usize::MAX, Duration::ZERO, AutomationConfig::default());
    // The recovery action is the failing "click" itself, so recovery aborts.
    h.coordinator
        .submit(
            Task::new("t1", "unrecoverable")
                .action(click(Map::new()))
                .recovery_action(click(Map::new())),
        )
        .unwrap();

    h.coordinator.run().await;

    let result = h.coordinator.result("t1").unwrap();
    assert!(!result.success);
    assert!(result.recovery_attempted);
    assert!(result.error.as_deref().unwrap().contains("click"));
    // Failed click plus the failed recovery click; no body re-execution.
    assert_eq!(result.action_results.len(), 2);
}

#[tokio::test]
async fn timeout_is_reported_and_monitor_is_cancelled() {
    let config = AutomationConfig {
        monitor_interval: Duration::from_millis(10),
        ..Default::default()
    };
    // Each action takes 500ms against a 50ms task timeout.
    let mut h = harness(0, Duration::from_millis(500), config);
    h.coordinator
        .submit(
            Task::new("t1", "slow click")
                .action(click(Map::new()))
                .with_timeout(Duration::from_millis(50)),
        )
        .unwrap();

    h.coordinator.run().await;

    let result = h.coordinator.result("t1").unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("timed out"));

    // Once the coordinator is gone, no background monitor may still hold the
    // state source.
    let state = h.state.clone();
    drop(h);
    tokio::task::yield_now().await;
    assert_eq!(Arc::strong_count(&state), 1);
}

#[tokio::test]
async fn monitor_records_state_changes_during_the_task() {
    let config = AutomationConfig {
        monitor_interval: Duration::from_millis(5),
        ..Default::default()
    };
    let source = Arc::new(ChurningSource {
        captures: AtomicUsize::new(0),
    });
    let mut h = harness_with_source(0, Duration::from_millis(60), config, source);
    h.coordinator
        .submit(Task::new("t1", "observed click").action(click(Map::new())))
        .unwrap();

    h.coordinator.run().await;

    let result = h.coordinator.result("t1").unwrap();
    assert!(result.success);
    assert!(!result.state_changes.is_empty());
    assert!(result
        .state_changes
        .iter()
        .all(|diff| !diff.is_empty()));
}

#[tokio::test]
async fn dependency_chain_completes_in_order() {
    let mut h = harness(0, Duration::ZERO, AutomationConfig::default());
    h.coordinator
        .submit(Task::new("c", "third").action(click(Map::new())).depends_on("b"))
        .unwrap();
    h.coordinator
        .submit(Task::new("b", "second").action(click(Map::new())).depends_on("a"))
        .unwrap();
    h.coordinator
        .submit(Task::new("a", "first").action(click(Map::new())))
        .unwrap();

    h.coordinator.run().await;

    for id in ["a", "b", "c"] {
        let result = h.coordinator.result(id).unwrap();
        assert!(result.success, "task {id} should have completed");
    }
    let a = h.coordinator.result("a").unwrap();
    let b = h.coordinator.result("b").unwrap();
    let c = h.coordinator.result("c").unwrap();
    assert!(a.finished_at <= b.started_at);
    assert!(b.finished_at <= c.started_at);
}

#[tokio::test]
async fn validation_failure_aborts_the_task() {
    use uitask::{Severity, ValidationRule, ValidationSpec};
    use uitask::validation::Condition;

    let mut h = harness(0, Duration::ZERO, AutomationConfig::default());
    let rules = vec![ValidationRule::new(
        "focused_app",
        Condition::Equals,
        json!("Notes"),
        Severity::Strict,
    )];
    // The static source never focuses Notes, so the strict rule fails.
    h.coordinator
        .submit(
            Task::new("t1", "validated click")
                .action(click(Map::new()))
                .with_validation(ValidationSpec::Rules(rules)),
        )
        .unwrap();

    h.coordinator.run().await;

    let result = h.coordinator.result("t1").unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("validation"));
}
