//! Actor boundary - the engine's only way to touch the environment.
//!
//! An actor is an external capability provider: it advertises a catalog of
//! named actions, answers a readiness probe, and executes one action at a
//! time. Concrete actors (mouse/keyboard drivers, browser control, file
//! managers) live outside this crate; the engine only depends on this trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AutomationError;

/// Action parameters: a JSON object with unique keys.
pub type Params = Map<String, Value>;

/// Description of one action an actor can perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Parameter names the action accepts.
    pub params: Vec<String>,
    pub description: String,
}

/// External capability provider consumed by the engine.
///
/// Implementations must be safe to call concurrently up to the executor's
/// semaphore bound. Actions should be idempotent: the coordinator re-executes
/// a whole task body after successful recovery, so non-idempotent actions may
/// be applied twice.
#[async_trait]
pub trait Actor: Send + Sync {
    /// Name this actor is addressed by in [`ActionRequest`](crate::executor::ActionRequest)s.
    fn name(&self) -> &str;

    /// Catalog of actions this actor can execute.
    fn capabilities(&self) -> HashMap<String, Capability>;

    /// Readiness probe. A `false` here fails the action fast with
    /// [`AutomationError::ActorNotReady`].
    async fn validate_state(&self) -> bool;

    /// Execute one action. `Err` is an actor-level failure and is subject to
    /// the task's retry policy.
    async fn execute(&self, action: &str, params: &Params) -> Result<Value, AutomationError>;
}

/// Factory producing actor instances on demand.
pub type ActorFactory = Box<dyn Fn() -> Arc<dyn Actor> + Send + Sync>;

/// Registry of actor factories, keyed by actor name. Owned and injected into
/// the executor; there is no process-wide registry.
#[derive(Default)]
pub struct ActorRegistry {
    factories: HashMap<String, ActorFactory>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Actor> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Instantiate the actor registered under `name`.
    pub fn create(&self, name: &str) -> Option<Arc<dyn Actor>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Names of all registered actors, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("actors", &self.names())
            .finish()
    }
}
