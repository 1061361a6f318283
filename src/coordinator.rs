//! Task queue, dependency scheduling, and per-task execution with recovery.
//!
//! The [`TaskCoordinator`] is the engine's front door: callers submit
//! [`Task`]s and call [`TaskCoordinator::run`]. Tasks execute one at a time;
//! concurrency lives inside a task (the background state monitor and the
//! action executor's semaphore), never across tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::AutomationConfig;
use crate::error::AutomationError;
use crate::executor::{ActionExecutor, ActionRequest, ActionResult};
use crate::pattern::{PatternContext, PatternExecutor, PatternMatcher};
use crate::state::{diff_snapshots, StateDiff, StateSource};
use crate::validation::{ValidationSpec, Validator};

/// Retry behavior for one action kind: attempts beyond the first, with a
/// fixed delay between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// A unit of work: ordered actions plus optional validation, retry policy,
/// recovery actions, and dependencies on other tasks.
///
/// Immutable once submitted; the coordinator never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique across all submitted tasks.
    pub id: String,
    pub description: String,
    pub actions: Vec<ActionRequest>,
    /// Overall body timeout; `None` uses the configured default.
    pub timeout: Option<Duration>,
    /// Per-action-kind retry policy, keyed by action name.
    #[serde(default)]
    pub retry_policy: HashMap<String, RetryPolicy>,
    /// Validated against a fresh snapshot after every action when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,
    /// Run in order after a body failure; success re-runs the whole body once.
    #[serde(default)]
    pub recovery_actions: Vec<ActionRequest>,
    /// Task ids that must be completed before this task is runnable.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            actions: Vec::new(),
            timeout: None,
            retry_policy: HashMap::new(),
            validation: None,
            recovery_actions: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn action(mut self, request: ActionRequest) -> Self {
        self.actions.push(request);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry `action` up to `max_retries` extra times with `delay` between
    /// attempts.
    pub fn retry(mut self, action: impl Into<String>, max_retries: u32, delay: Duration) -> Self {
        self.retry_policy
            .insert(action.into(), RetryPolicy::new(max_retries, delay));
        self
    }

    pub fn with_validation(mut self, spec: ValidationSpec) -> Self {
        self.validation = Some(spec);
        self
    }

    pub fn recovery_action(mut self, request: ActionRequest) -> Self {
        self.recovery_actions.push(request);
        self
    }

    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.dependencies.push(task_id.into());
        self
    }
}

/// Terminal record of one task. Created exactly once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per execution attempt, including retries and recovery
    /// actions, in execution order.
    pub action_results: Vec<ActionResult>,
    pub error: Option<String>,
    pub recovery_attempted: bool,
    /// Diffs observed by the background monitor while the task ran.
    pub state_changes: Vec<StateDiff>,
}

/// Schedules and executes submitted tasks.
///
/// Dependencies are resolved by cooperative re-queueing: a task whose
/// dependencies are not yet completed goes back to the tail of the queue.
/// `run` returns once every remaining queued task is blocked on an unmet
/// dependency, so a dependency that never completes leaves its dependents
/// pending rather than spinning. Cycles are not detected; their tasks simply
/// stay pending.
pub struct TaskCoordinator {
    config: AutomationConfig,
    actions: Arc<ActionExecutor>,
    state: Arc<dyn StateSource>,
    patterns: PatternExecutor,
    matcher: Option<PatternMatcher>,
    validator: Validator,
    pending: HashMap<String, Task>,
    completed: HashMap<String, TaskResult>,
    queue: VecDeque<String>,
}

impl TaskCoordinator {
    pub fn new(
        config: AutomationConfig,
        actions: Arc<ActionExecutor>,
        state: Arc<dyn StateSource>,
    ) -> Self {
        Self {
            config,
            patterns: PatternExecutor::new(actions.clone(), state.clone()),
            actions,
            state,
            matcher: None,
            validator: Validator::new(),
            pending: HashMap::new(),
            completed: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Enable pattern substitution: before a plain action executes, matched
    /// patterns above the configured confidence threshold run in its place.
    pub fn with_patterns(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Enqueue a task. Ids are unique across pending and completed tasks.
    pub fn submit(&mut self, task: Task) -> Result<(), AutomationError> {
        if self.pending.contains_key(&task.id) || self.completed.contains_key(&task.id) {
            return Err(AutomationError::DuplicateTask(task.id));
        }
        debug!(task = %task.id, "task submitted");
        self.queue.push_back(task.id.clone());
        self.pending.insert(task.id.clone(), task);
        Ok(())
    }

    /// Drain the queue, executing runnable tasks one at a time.
    ///
    /// Returns when the queue is empty or every queued task is blocked on an
    /// unmet dependency (a full rotation of the queue without progress).
    /// Blocked tasks remain in [`pending_tasks`](Self::pending_tasks).
    pub async fn run(&mut self) {
        let mut blocked_streak = 0usize;

        while let Some(id) = self.queue.pop_front() {
            let runnable = match self.pending.get(&id) {
                Some(task) => task
                    .dependencies
                    .iter()
                    .all(|dep| self.completed.contains_key(dep)),
                None => continue,
            };

            if !runnable {
                self.queue.push_back(id);
                blocked_streak += 1;
                if blocked_streak >= self.queue.len() {
                    warn!(
                        blocked = self.queue.len(),
                        "stopping: all queued tasks have unmet dependencies"
                    );
                    break;
                }
                continue;
            }
            blocked_streak = 0;

            // Checked runnable above; the id is still in `pending`.
            if let Some(task) = self.pending.remove(&id) {
                info!(task = %id, description = %task.description, "executing task");
                let result = self.execute_task(&task).await;
                info!(task = %id, success = result.success, "task finished");
                self.completed.insert(id, result);
            }
        }
    }

    /// The stored result for a completed task, if any.
    pub fn result(&self, task_id: &str) -> Option<&TaskResult> {
        self.completed.get(task_id)
    }

    /// Submitted tasks that have not completed.
    pub fn pending_tasks(&self) -> Vec<&Task> {
        self.pending.values().collect()
    }

    /// Purge completed-task history. Pending tasks are unaffected.
    pub fn clear_completed(&mut self) {
        self.completed.clear();
    }

    /// Run one task to a terminal [`TaskResult`].
    ///
    /// A background monitor records state diffs for the task's whole
    /// duration; it is aborted and awaited on every exit path. The body runs
    /// under the task's timeout; on failure with non-empty recovery actions,
    /// recovery runs and, if it fully succeeds, the entire body re-executes
    /// once (no recovery-of-recovery).
    async fn execute_task(&self, task: &Task) -> TaskResult {
        let started_at = Utc::now();
        let diffs: Arc<Mutex<Vec<StateDiff>>> = Arc::new(Mutex::new(Vec::new()));
        let monitor = self.spawn_monitor(diffs.clone());

        let task_timeout = task.timeout.unwrap_or(self.config.default_task_timeout);
        let mut action_results = Vec::new();
        let mut recovery_attempted = false;

        let mut outcome = self.run_body(task, task_timeout, &mut action_results).await;

        if let Err(original) = &outcome {
            if !task.recovery_actions.is_empty() {
                recovery_attempted = true;
                warn!(task = %task.id, error = %original, "task body failed, attempting recovery");

                if self.run_recovery(task, &mut action_results).await {
                    // Recovery succeeded: one full re-execution of the body.
                    outcome = self.run_body(task, task_timeout, &mut action_results).await;
                }
            }
        }

        monitor.abort();
        let _ = monitor.await;

        let state_changes = diffs
            .lock()
            .map(|observed| observed.clone())
            .unwrap_or_default();

        TaskResult {
            task_id: task.id.clone(),
            success: outcome.is_ok(),
            started_at,
            finished_at: Utc::now(),
            action_results,
            error: outcome.err().map(|err| err.to_string()),
            recovery_attempted,
            state_changes,
        }
    }

    /// Sample snapshots on the configured interval and record non-empty diffs.
    fn spawn_monitor(&self, diffs: Arc<Mutex<Vec<StateDiff>>>) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();
        let interval = self.config.monitor_interval;
        tokio::spawn(async move {
            let mut last = state.capture_snapshot().await;
            loop {
                sleep(interval).await;
                let current = state.capture_snapshot().await;
                let diff = diff_snapshots(&last, &current);
                if !diff.is_empty() {
                    if let Ok(mut observed) = diffs.lock() {
                        observed.push(diff);
                    }
                }
                last = current;
            }
        })
    }

    /// The task body under its timeout guard: each action in order, with
    /// per-action retries and post-action validation.
    async fn run_body(
        &self,
        task: &Task,
        task_timeout: Duration,
        results: &mut Vec<ActionResult>,
    ) -> Result<(), AutomationError> {
        match timeout(task_timeout, self.run_actions(task, results)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AutomationError::Timeout(task_timeout)),
        }
    }

    async fn run_actions(
        &self,
        task: &Task,
        results: &mut Vec<ActionResult>,
    ) -> Result<(), AutomationError> {
        for action in &task.actions {
            let policy = self.retry_policy_for(task, action);
            let mut attempt = 1u32;
            let mut result = self.perform(action).await;
            result.details.insert("attempt".to_string(), json!(attempt));
            results.push(result.clone());

            if !result.success {
                if let Some(policy) = &policy {
                    for retry in 1..=policy.max_retries {
                        if let Some(script) = &action.recovery_script {
                            self.run_recovery_script(action, script).await;
                        }
                        debug!(
                            action = %action.action,
                            retry,
                            max_retries = policy.max_retries,
                            "retrying action"
                        );
                        sleep(policy.delay).await;
                        attempt += 1;
                        result = self.perform(action).await;
                        result.details.insert("attempt".to_string(), json!(attempt));
                        results.push(result.clone());
                        if result.success {
                            break;
                        }
                    }
                }
            }

            if !result.success {
                return Err(AutomationError::ActionFailed {
                    action: action.action.clone(),
                    message: result
                        .error
                        .unwrap_or_else(|| "action reported failure".to_string()),
                });
            }

            if let Some(spec) = &task.validation {
                let snapshot = self.state.capture_snapshot().await;
                let validation = self.validator.validate(&snapshot.to_value(), spec);
                for warning in &validation.warnings {
                    warn!(task = %task.id, action = %action.action, warning, "validation warning");
                }
                if !validation.success {
                    return Err(AutomationError::ValidationFailed(
                        validation.failures.join("; "),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Retry budget for one action. A task-level policy entry for the action
    /// wins; otherwise a request-level `retries` (total attempts) maps to
    /// zero-delay retries.
    fn retry_policy_for(&self, task: &Task, action: &ActionRequest) -> Option<RetryPolicy> {
        if let Some(policy) = task.retry_policy.get(&action.action) {
            return Some(policy.clone());
        }
        action
            .retries
            .map(|total| RetryPolicy::new(total.saturating_sub(1), Duration::ZERO))
    }

    /// Run a request's recovery script between failed attempts. The script's
    /// outcome does not gate the retry; it is logged and the retry proceeds.
    async fn run_recovery_script(&self, action: &ActionRequest, script: &str) {
        let request = ActionRequest::new(action.actor.clone(), script, serde_json::Map::new());
        let result = self.perform(&request).await;
        if result.success {
            debug!(action = %action.action, script, "recovery script succeeded");
        } else {
            warn!(
                action = %action.action,
                script,
                error = result.error.as_deref().unwrap_or("unknown"),
                "recovery script failed"
            );
        }
    }

    /// Run all recovery actions in order. Any failure aborts recovery; the
    /// task keeps its original error either way.
    async fn run_recovery(&self, task: &Task, results: &mut Vec<ActionResult>) -> bool {
        for action in &task.recovery_actions {
            let result = self.perform(action).await;
            let success = result.success;
            results.push(result);
            if !success {
                warn!(task = %task.id, action = %action.action, "recovery action failed, aborting recovery");
                return false;
            }
        }
        true
    }

    /// Execute one action, substituting a matched interaction pattern when
    /// one scores above the confidence threshold.
    ///
    /// Infrastructure errors (unknown actor, failed readiness probe) are
    /// folded into a failed [`ActionResult`] so the task's retry policy
    /// applies uniformly.
    async fn perform(&self, action: &ActionRequest) -> ActionResult {
        if let Some(matcher) = &self.matcher {
            let snapshot = self.state.capture_snapshot().await;
            if let Some(matched) =
                matcher.best_match(&snapshot, self.config.pattern_confidence_threshold)
            {
                info!(
                    action = %action.action,
                    pattern = matched.name,
                    confidence = matched.confidence,
                    "substituting matched pattern for action"
                );
                return self.perform_pattern(action, matched.name, matched.pattern).await;
            }
        }

        match self.actions.execute(action).await {
            Ok(result) => result,
            Err(err) => ActionResult {
                action: action.action.clone(),
                success: false,
                duration: Duration::ZERO,
                error: Some(err.to_string()),
                details: serde_json::Map::new(),
            },
        }
    }

    async fn perform_pattern(
        &self,
        action: &ActionRequest,
        name: &str,
        pattern: &crate::pattern::InteractionPattern,
    ) -> ActionResult {
        let started = std::time::Instant::now();
        let mut context: PatternContext = action.params.clone();
        let mut details = serde_json::Map::new();
        details.insert("pattern_matched".to_string(), json!(name));

        match self.patterns.execute(pattern, &action.actor, &mut context).await {
            Ok(succeeded) => ActionResult {
                action: action.action.clone(),
                success: succeeded,
                duration: started.elapsed(),
                error: (!succeeded).then(|| format!("pattern '{name}' did not reach success criteria")),
                details,
            },
            Err(err) => ActionResult {
                action: action.action.clone(),
                success: false,
                duration: started.elapsed(),
                error: Some(err.to_string()),
                details,
            },
        }
    }
}
