//! Executes interaction patterns with step retry and success verification.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{InteractionPattern, PatternType, SuccessCriteria};
use crate::error::AutomationError;
use crate::executor::{ActionExecutor, ActionRequest};
use crate::state::{StateSnapshot, StateSource};
use crate::validation::resolve_path;

/// Shared mutable context for variable substitution and step results.
pub type PatternContext = Map<String, Value>;

/// Attempts per step before the pattern attempt fails.
const STEP_RETRIES: u32 = 3;
/// Delay between step retries.
const STEP_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on `repeat_until` re-executions of one step.
const REPEAT_CAP: u32 = 10;
/// Delay between `repeat_until` re-executions.
const REPEAT_DELAY: Duration = Duration::from_millis(200);

/// Runs patterns as a unit: substitute variables, execute steps with retry,
/// then verify success criteria against live state. Whole-pattern retries use
/// linear backoff.
pub struct PatternExecutor {
    actions: Arc<ActionExecutor>,
    state: Arc<dyn StateSource>,
    /// Patterns currently executing, keyed by instance id.
    active: Mutex<HashMap<String, PatternType>>,
}

impl PatternExecutor {
    pub fn new(actions: Arc<ActionExecutor>, state: Arc<dyn StateSource>) -> Self {
        Self {
            actions,
            state,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Execute one pattern against the named actor.
    ///
    /// Returns `Ok(true)` when the steps ran and the success criteria held
    /// within the retry budget, `Ok(false)` otherwise. Template errors
    /// (unbound `$variables`) abort immediately with `Err`.
    pub async fn execute(
        &self,
        pattern: &InteractionPattern,
        actor: &str,
        context: &mut PatternContext,
    ) -> Result<bool, AutomationError> {
        let instance = format!("{}_{}", pattern.kind.as_str(), Uuid::new_v4());
        self.track(&instance, pattern.kind);

        // The registry entry must be removed on every exit path.
        let result = match timeout(pattern.timeout, self.run(pattern, actor, context)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(pattern = pattern.kind.as_str(), "pattern timed out");
                Ok(false)
            }
        };
        self.untrack(&instance);
        result
    }

    /// Patterns currently in flight (instance id, type).
    pub fn active_patterns(&self) -> Vec<(String, PatternType)> {
        self.active
            .lock()
            .map(|active| active.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    fn track(&self, instance: &str, kind: PatternType) {
        if let Ok(mut active) = self.active.lock() {
            active.insert(instance.to_string(), kind);
        }
    }

    fn untrack(&self, instance: &str) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(instance);
        }
    }

    async fn run(
        &self,
        pattern: &InteractionPattern,
        actor: &str,
        context: &mut PatternContext,
    ) -> Result<bool, AutomationError> {
        // Baseline for state_changed criteria.
        let start = self.state.capture_snapshot().await;
        let attempts = pattern.retry_count.max(1);

        for attempt in 1..=attempts {
            if self.run_steps(pattern, actor, context, &start).await? {
                if self.verify(&pattern.success_criteria, &start).await {
                    return Ok(true);
                }
                warn!(
                    pattern = pattern.kind.as_str(),
                    attempt,
                    attempts,
                    "pattern success criteria not met"
                );
            }

            if attempt < attempts {
                // Linear backoff between whole-pattern attempts.
                sleep(STEP_RETRY_DELAY * attempt).await;
            }
        }

        Ok(false)
    }

    /// Execute all steps in order. `Ok(false)` means a step failed after its
    /// retries (the pattern attempt fails); `Err` is a template error.
    async fn run_steps(
        &self,
        pattern: &InteractionPattern,
        actor: &str,
        context: &mut PatternContext,
        start: &StateSnapshot,
    ) -> Result<bool, AutomationError> {
        for step in &pattern.steps {
            let params = substitute_variables(&step.params, context)?;

            if !self.run_step(actor, &step.action, &params).await {
                return Ok(false);
            }

            if let Some(criteria) = &step.repeat_until {
                let mut repeats = 0;
                while !self.verify(criteria, start).await {
                    if repeats >= REPEAT_CAP {
                        debug!(action = %step.action, "repeat_until cap reached");
                        return Ok(false);
                    }
                    repeats += 1;
                    sleep(REPEAT_DELAY).await;
                    if !self.run_step(actor, &step.action, &params).await {
                        return Ok(false);
                    }
                }
            }

            if let Some(key) = &step.store_result {
                context.insert(key.clone(), json!(true));
            }
        }
        Ok(true)
    }

    /// One step with retry: up to [`STEP_RETRIES`] attempts with a fixed delay.
    async fn run_step(&self, actor: &str, action: &str, params: &Map<String, Value>) -> bool {
        let request = ActionRequest::new(actor, action, params.clone());
        for attempt in 1..=STEP_RETRIES {
            match self.actions.execute(&request).await {
                Ok(result) if result.success => return true,
                Ok(result) => {
                    warn!(
                        action,
                        attempt,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "pattern step failed"
                    );
                }
                Err(err) => {
                    warn!(action, attempt, error = %err, "pattern step failed");
                }
            }
            if attempt < STEP_RETRIES {
                sleep(STEP_RETRY_DELAY).await;
            }
        }
        false
    }

    /// Check criteria against a fresh snapshot; `state_changed` clauses
    /// compare against the snapshot captured at pattern start.
    async fn verify(&self, criteria: &SuccessCriteria, start: &StateSnapshot) -> bool {
        if criteria.is_empty() {
            return true;
        }
        let current = self.state.capture_snapshot().await;

        if let Some(query) = &criteria.element_visible {
            if current.find_element(query).is_none() {
                return false;
            }
        }

        if let Some(query) = &criteria.element_clickable {
            match current.find_element(query) {
                Some(element) if element.clickable => {}
                _ => return false,
            }
        }

        if let Some(text) = &criteria.text_present {
            if !current.has_text(text) {
                return false;
            }
        }

        if let Some(expected_changes) = &criteria.state_changed {
            let before = start.to_value();
            let after = current.to_value();
            for (path, expected) in expected_changes {
                let old_value = resolve_path(&before, path);
                let new_value = resolve_path(&after, path);
                if old_value == new_value {
                    return false;
                }
                if let Some(expected) = expected {
                    if new_value != Some(expected) {
                        return false;
                    }
                }
            }
        }

        true
    }
}

/// Replace `$name` string parameters with values from the context.
///
/// Only whole-string references are substituted; any other value passes
/// through unchanged.
fn substitute_variables(
    params: &Map<String, Value>,
    context: &PatternContext,
) -> Result<Map<String, Value>, AutomationError> {
    let mut resolved = Map::new();
    for (key, value) in params {
        let substituted = match value.as_str().and_then(|s| s.strip_prefix('$')) {
            Some(name) => context
                .get(name)
                .cloned()
                .ok_or_else(|| AutomationError::UnboundVariable(name.to_string()))?,
            None => value.clone(),
        };
        resolved.insert(key.clone(), substituted);
    }
    Ok(resolved)
}
