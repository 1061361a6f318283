//! # uitask
//!
//! Task orchestration and recovery engine for UI automation.
//!
//! This library provides:
//! - A task coordinator with dependency scheduling, per-task timeouts,
//!   background state monitoring, action retries, and recovery-then-retry
//! - Bounded-concurrency action execution against pluggable actors
//! - Reusable multi-step interaction patterns with success verification
//! - Structural state validation with severity-gated outcomes
//! - Snapshot capture and structured state diffing
//!
//! ## Task Flow
//! 1. Submit [`Task`]s to the [`TaskCoordinator`]
//! 2. `run()` schedules tasks as their dependencies complete
//! 3. Each action goes through the [`ActionExecutor`] (or a matched
//!    interaction pattern), with retries per the task's policy
//! 4. State is validated after every action; failures trigger the task's
//!    recovery actions and a single body re-execution
//! 5. A [`TaskResult`] records attempts, errors, and observed state changes
//!
//! ## Modules
//! - `coordinator`: Task queue, scheduling, and per-task execution
//! - `executor`: Semaphore-bounded action execution and the actor cache
//! - `actor`: The actor trait and registry (the environment boundary)
//! - `pattern`: Interaction patterns, the pattern library, and matching
//! - `validation`: Rule-based and expected-tree state validation
//! - `state`: Snapshots, diffs, capture sessions, and system metrics

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod pattern;
pub mod state;
pub mod validation;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global tracing subscriber honoring `RUST_LOG`, defaulting to
/// debug output for this crate. Safe to call more than once; later calls are
/// no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uitask=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

pub use actor::{Actor, ActorRegistry, Capability, Params};
pub use config::AutomationConfig;
pub use coordinator::{RetryPolicy, Task, TaskCoordinator, TaskResult};
pub use error::AutomationError;
pub use executor::{ActionExecutor, ActionRequest, ActionResult};
pub use pattern::{
    InteractionPattern, PatternExecutor, PatternMatcher, PatternRegistry, PatternType,
};
pub use state::{diff_snapshots, StateDiff, StateSnapshot, StateSource};
pub use validation::{Severity, ValidationRule, ValidationSpec, Validator};
