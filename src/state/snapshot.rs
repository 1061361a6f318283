//! Point-in-time snapshot of the observable environment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Position and size of an on-screen rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A UI element detected on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    /// Unique within one snapshot.
    pub id: String,
    /// Element kind, e.g. "button", "text_field", "success_message".
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
    pub bounds: Bounds,
    pub clickable: bool,
    /// Detection confidence in [0.0, 1.0].
    pub confidence: f64,
}

impl UiElement {
    /// Whether every field named in `criteria` equals the element's value for
    /// that field (compared through the element's JSON form).
    pub fn matches(&self, criteria: &Map<String, Value>) -> bool {
        let value = match serde_json::to_value(self) {
            Ok(value) => value,
            Err(_) => return false,
        };
        criteria
            .iter()
            .all(|(key, expected)| value.get(key) == Some(expected))
    }
}

/// State of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    /// Unique within one snapshot.
    pub id: u64,
    pub title: String,
    pub bounds: Bounds,
    pub minimized: bool,
    pub focused: bool,
}

/// State of one running application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub name: String,
    /// Bundle or package identifier.
    pub bundle_id: String,
    pub pid: u32,
    pub active: bool,
    pub frontmost: bool,
    pub windows: Vec<WindowState>,
}

/// System-level metrics at capture time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    /// Used memory in bytes.
    pub memory_used: u64,
    pub active_displays: u32,
}

/// Mouse/cursor state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MouseState {
    pub position: (i32, i32),
    /// Button press states, left to right.
    pub buttons: Vec<bool>,
}

/// Keyboard input state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyboardState {
    /// Active modifier keys, e.g. "shift", "control".
    pub modifiers: Vec<String>,
}

/// Immutable capture of the environment at one instant.
///
/// Element and window ids are unique within a snapshot. The engine never
/// mutates a snapshot after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub metrics: SystemMetrics,
    pub applications: Vec<ApplicationState>,
    pub elements: Vec<UiElement>,
    pub focused_app: Option<String>,
    pub active_window: Option<String>,
    pub mouse: MouseState,
    pub keyboard: KeyboardState,
}

impl StateSnapshot {
    /// An empty snapshot stamped now. Useful as a capture fallback.
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            metrics: SystemMetrics::default(),
            applications: Vec::new(),
            elements: Vec::new(),
            focused_app: None,
            active_window: None,
            mouse: MouseState::default(),
            keyboard: KeyboardState::default(),
        }
    }

    /// First element matching `criteria` (field equality on the JSON form).
    pub fn find_element(&self, criteria: &Map<String, Value>) -> Option<&UiElement> {
        self.elements.iter().find(|element| element.matches(criteria))
    }

    /// Whether any element's text contains `text`.
    pub fn has_text(&self, text: &str) -> bool {
        self.elements
            .iter()
            .any(|element| element.text.as_deref().is_some_and(|t| t.contains(text)))
    }

    /// The snapshot as a JSON tree, for validation and path lookups.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Something that can produce a snapshot of the environment.
///
/// Captures must be cheap enough to run after every action and on the
/// monitor's polling interval. Capture is infallible by contract: a source
/// that cannot observe part of the environment returns what it can (or
/// [`StateSnapshot::empty`]).
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn capture_snapshot(&self) -> StateSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn button(id: &str, text: &str, clickable: bool) -> UiElement {
        UiElement {
            id: id.to_string(),
            kind: "button".to_string(),
            text: Some(text.to_string()),
            bounds: Bounds::default(),
            clickable,
            confidence: 1.0,
        }
    }

    #[test]
    fn element_matches_on_all_specified_fields() {
        let element = button("ok", "OK", true);
        let criteria = json!({"type": "button", "clickable": true});
        assert!(element.matches(criteria.as_object().unwrap()));

        let criteria = json!({"type": "button", "text": "Cancel"});
        assert!(!element.matches(criteria.as_object().unwrap()));
    }

    #[test]
    fn find_element_and_text_search() {
        let mut snapshot = StateSnapshot::empty();
        snapshot.elements = vec![button("ok", "OK", true), button("cancel", "Cancel", true)];

        let criteria = json!({"id": "cancel"});
        let found = snapshot.find_element(criteria.as_object().unwrap());
        assert_eq!(found.map(|e| e.id.as_str()), Some("cancel"));

        assert!(snapshot.has_text("Canc"));
        assert!(!snapshot.has_text("Submit"));
    }
}
