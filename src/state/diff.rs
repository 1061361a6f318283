//! Structured differences between two snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::snapshot::{StateSnapshot, WindowState};

/// Which part of the environment a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Windows,
    Applications,
    System,
    Mouse,
    Keyboard,
    ActiveWindow,
}

/// One detected change, with structured before/after detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub category: ChangeCategory,
    /// Change kind within the category, e.g. "window_created", "app_terminated".
    pub kind: String,
    pub detail: Value,
}

/// All changes detected between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    pub changes: Vec<StateChange>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Changes in one category, in detection order.
    pub fn in_category(&self, category: ChangeCategory) -> impl Iterator<Item = &StateChange> {
        self.changes.iter().filter(move |c| c.category == category)
    }
}

/// Compute the structured difference between two snapshots.
///
/// Pure function: no side effects, and `diff_snapshots(s, s)` is empty for
/// any snapshot `s`.
pub fn diff_snapshots(old: &StateSnapshot, new: &StateSnapshot) -> StateDiff {
    let mut changes = Vec::new();

    // Applications, keyed by pid.
    let old_apps: HashMap<u32, _> = old.applications.iter().map(|a| (a.pid, a)).collect();
    let new_apps: HashMap<u32, _> = new.applications.iter().map(|a| (a.pid, a)).collect();

    for (pid, app) in &new_apps {
        if !old_apps.contains_key(pid) {
            changes.push(StateChange {
                category: ChangeCategory::Applications,
                kind: "app_launched".to_string(),
                detail: json!({"app": app.name, "pid": pid}),
            });
        }
    }
    for (pid, app) in &old_apps {
        if !new_apps.contains_key(pid) {
            changes.push(StateChange {
                category: ChangeCategory::Applications,
                kind: "app_terminated".to_string(),
                detail: json!({"app": app.name, "pid": pid}),
            });
        }
    }

    // Windows across all applications, keyed by window id.
    let collect_windows = |snapshot: &StateSnapshot| -> HashMap<u64, WindowState> {
        snapshot
            .applications
            .iter()
            .flat_map(|app| app.windows.iter().cloned())
            .map(|window| (window.id, window))
            .collect()
    };
    let old_windows = collect_windows(old);
    let new_windows = collect_windows(new);

    for (id, window) in &new_windows {
        if !old_windows.contains_key(id) {
            changes.push(StateChange {
                category: ChangeCategory::Windows,
                kind: "window_created".to_string(),
                detail: json!({"window_id": id, "title": window.title}),
            });
        }
    }
    for (id, window) in &old_windows {
        if !new_windows.contains_key(id) {
            changes.push(StateChange {
                category: ChangeCategory::Windows,
                kind: "window_closed".to_string(),
                detail: json!({"window_id": id, "title": window.title}),
            });
        }
    }

    // Focus.
    if old.focused_app != new.focused_app {
        changes.push(StateChange {
            category: ChangeCategory::ActiveWindow,
            kind: "focus_changed".to_string(),
            detail: json!({"old_app": old.focused_app, "new_app": new.focused_app}),
        });
    }
    if old.active_window != new.active_window {
        changes.push(StateChange {
            category: ChangeCategory::ActiveWindow,
            kind: "active_window_changed".to_string(),
            detail: json!({"old": old.active_window, "new": new.active_window}),
        });
    }

    // System: display topology only. CPU and memory jitter constantly and
    // would make every diff non-empty.
    if old.metrics.active_displays != new.metrics.active_displays {
        changes.push(StateChange {
            category: ChangeCategory::System,
            kind: "displays_changed".to_string(),
            detail: json!({
                "old": old.metrics.active_displays,
                "new": new.metrics.active_displays,
            }),
        });
    }

    // Mouse.
    if old.mouse.position != new.mouse.position {
        changes.push(StateChange {
            category: ChangeCategory::Mouse,
            kind: "mouse_moved".to_string(),
            detail: json!({"old_pos": old.mouse.position, "new_pos": new.mouse.position}),
        });
    }

    // Keyboard.
    if old.keyboard.modifiers != new.keyboard.modifiers {
        changes.push(StateChange {
            category: ChangeCategory::Keyboard,
            kind: "modifiers_changed".to_string(),
            detail: json!({
                "old_mods": old.keyboard.modifiers,
                "new_mods": new.keyboard.modifiers,
            }),
        });
    }

    StateDiff { changes }
}
