//! Error taxonomy for the orchestration engine.
//!
//! Every layer returns `Result<_, AutomationError>` instead of panicking, so
//! the coordinator's retry/recovery logic is an explicit match over result
//! values. Action and validation failures can be recovered via a task's
//! recovery actions; everything else surfaces in `TaskResult::error`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomationError {
    /// A task with the same id was already submitted.
    #[error("task '{0}' already submitted")]
    DuplicateTask(String),

    /// The actor's readiness probe returned false.
    #[error("actor '{0}' is not in a valid state")]
    ActorNotReady(String),

    /// No actor factory registered under this name.
    #[error("actor '{0}' not found")]
    UnknownActor(String),

    /// A validation rule referenced a condition this engine does not know.
    #[error("unknown validation condition: {0}")]
    UnknownCondition(String),

    /// A pattern parameter referenced a `$variable` absent from the context.
    #[error("context variable not found: {0}")]
    UnboundVariable(String),

    /// An action failed after exhausting its retry budget.
    #[error("action '{action}' failed: {message}")]
    ActionFailed { action: String, message: String },

    /// A strict-severity validation rule was violated after an action.
    #[error("state validation failed: {0}")]
    ValidationFailed(String),

    /// The task body exceeded its overall timeout.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),
}
