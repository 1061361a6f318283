//! Reusable multi-step interaction patterns.
//!
//! A pattern is a canned sequence of actions (click a trigger, wait for a
//! modal, click confirm, ...) with a success predicate checked against live
//! state. Patterns are built by [`library`] factory functions, matched
//! against snapshots by the [`matcher`], and run by the [`PatternExecutor`].

mod executor;
pub mod library;
mod matcher;

pub use executor::{PatternContext, PatternExecutor};
pub use matcher::{PatternMatch, PatternMatcher, PatternRegistry};

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of supported interaction patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    ClickAndWait,
    FillAndSubmit,
    ScrollToFind,
    DragAndDrop,
    ModalDialog,
    DropdownSelect,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClickAndWait => "click_and_wait",
            Self::FillAndSubmit => "fill_and_submit",
            Self::ScrollToFind => "scroll_to_find",
            Self::DragAndDrop => "drag_and_drop",
            Self::ModalDialog => "modal_dialog",
            Self::DropdownSelect => "dropdown_select",
        }
    }
}

/// One step of a pattern: an action plus parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStep {
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Re-execute this step until the criteria hold (bounded by the
    /// executor's repeat cap).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_until: Option<SuccessCriteria>,
    /// After the step succeeds, record `true` in the shared context under
    /// this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_result: Option<String>,
}

impl PatternStep {
    pub fn new(action: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            params,
            repeat_until: None,
            store_result: None,
        }
    }
}

/// Predicate over live state deciding whether a pattern (or step) succeeded.
///
/// All present clauses must hold. An empty criteria set is trivially
/// satisfied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessCriteria {
    /// An element matching these fields must be present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_visible: Option<Map<String, Value>>,
    /// An element matching these fields must be present and clickable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_clickable: Option<Map<String, Value>>,
    /// Some element's text must contain this substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_present: Option<String>,
    /// Each path must have changed since the pattern started; a `Some`
    /// expected value additionally requires the new value to equal it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_changed: Option<HashMap<String, Option<Value>>>,
}

impl SuccessCriteria {
    pub fn is_empty(&self) -> bool {
        self.element_visible.is_none()
            && self.element_clickable.is_none()
            && self.text_present.is_none()
            && self.state_changed.is_none()
    }

    pub fn element_visible(criteria: Map<String, Value>) -> Self {
        Self {
            element_visible: Some(criteria),
            ..Default::default()
        }
    }
}

/// A reusable, parameterized multi-step interaction with a success predicate.
///
/// Instances are transient: they are scoped to one `PatternExecutor::execute`
/// call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionPattern {
    pub kind: PatternType,
    pub steps: Vec<PatternStep>,
    pub success_criteria: SuccessCriteria,
    pub timeout: Duration,
    /// Whole-pattern attempts before giving up.
    pub retry_count: u32,
}

impl InteractionPattern {
    pub fn new(kind: PatternType, steps: Vec<PatternStep>, success_criteria: SuccessCriteria) -> Self {
        Self {
            kind,
            steps,
            success_criteria,
            timeout: Duration::from_secs(30),
            retry_count: 3,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
