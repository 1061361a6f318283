//! Bounded-concurrency action execution.
//!
//! The [`ActionExecutor`] is the single gate through which the engine mutates
//! the environment. It enforces one global bound on in-flight actions via a
//! counting semaphore - the only true parallelism primitive in the engine -
//! and caches actor instances after a one-time readiness check. It performs
//! no retries: retry policy belongs to the coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use crate::actor::{Actor, ActorRegistry, Params};
use crate::error::AutomationError;

/// One action to execute against a named actor. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Name of the actor to execute against.
    pub actor: String,
    /// Action name from the actor's capability catalog.
    pub action: String,
    #[serde(default)]
    pub params: Params,
    /// Per-request total attempt count. Used by the coordinator when the
    /// task's retry policy has no entry for this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Action run between failed attempts, on the same actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_script: Option<String>,
}

impl ActionRequest {
    pub fn new(actor: impl Into<String>, action: impl Into<String>, params: Params) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            params,
            retries: None,
            recovery_script: None,
        }
    }

    /// Total attempts for this request when the task has no retry-policy
    /// entry for the action.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_recovery_script(mut self, script: impl Into<String>) -> Self {
        self.recovery_script = Some(script.into());
        self
    }
}

/// Outcome of one execution attempt. Retries produce one result each; the
/// coordinator retains all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl ActionResult {
    fn ok(action: &str, duration: Duration, details: Map<String, Value>) -> Self {
        Self {
            action: action.to_string(),
            success: true,
            duration,
            error: None,
            details,
        }
    }

    fn failed(action: &str, duration: Duration, error: String) -> Self {
        Self {
            action: action.to_string(),
            success: false,
            duration,
            error: Some(error),
            details: Map::new(),
        }
    }
}

/// Executes single actions with a global concurrency bound and an actor cache.
pub struct ActionExecutor {
    registry: ActorRegistry,
    semaphore: Semaphore,
    active_actors: RwLock<HashMap<String, Arc<dyn Actor>>>,
}

impl ActionExecutor {
    pub fn new(registry: ActorRegistry, max_concurrent_actions: usize) -> Self {
        Self {
            registry,
            semaphore: Semaphore::new(max_concurrent_actions.max(1)),
            active_actors: RwLock::new(HashMap::new()),
        }
    }

    /// Execute one action.
    ///
    /// `Err` signals an infrastructure problem (unknown actor, readiness
    /// probe failed); an actor-level failure comes back as an `ActionResult`
    /// with `success == false`. Both are subject to the coordinator's retry
    /// policy.
    pub async fn execute(&self, request: &ActionRequest) -> Result<ActionResult, AutomationError> {
        let started = Instant::now();
        let actor = self.get_actor(&request.actor).await?;

        // The semaphore is never closed; treat a closed-semaphore error like
        // an unavailable actor rather than panicking.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| AutomationError::ActorNotReady(request.actor.clone()))?;

        // Probe readiness on every execution, not just at creation time.
        if !actor.validate_state().await {
            return Err(AutomationError::ActorNotReady(request.actor.clone()));
        }

        debug!(actor = %request.actor, action = %request.action, "executing action");
        match actor.execute(&request.action, &request.params).await {
            Ok(value) => {
                let mut details = Map::new();
                details.insert("result".to_string(), value);
                Ok(ActionResult::ok(&request.action, started.elapsed(), details))
            }
            Err(err) => {
                warn!(actor = %request.actor, action = %request.action, error = %err, "action failed");
                Ok(ActionResult::failed(
                    &request.action,
                    started.elapsed(),
                    err.to_string(),
                ))
            }
        }
    }

    /// Get a cached actor or create one from the registry.
    ///
    /// An instance is cached only after its first readiness check passes; a
    /// failed check is never cached and will be re-attempted on next use.
    async fn get_actor(&self, name: &str) -> Result<Arc<dyn Actor>, AutomationError> {
        if let Some(actor) = self.active_actors.read().await.get(name) {
            return Ok(actor.clone());
        }

        let actor = self
            .registry
            .create(name)
            .ok_or_else(|| AutomationError::UnknownActor(name.to_string()))?;

        if !actor.validate_state().await {
            return Err(AutomationError::ActorNotReady(name.to_string()));
        }

        self.active_actors
            .write()
            .await
            .insert(name.to_string(), actor.clone());
        Ok(actor)
    }

    /// Drop all cached actor instances.
    pub async fn clear_cache(&self) {
        self.active_actors.write().await.clear();
    }
}
