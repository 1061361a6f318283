//! Structural state validation with severity-gated outcomes.
//!
//! Two input modes:
//! - **implicit**: an expected-state JSON tree, compared structurally against
//!   the actual tree (maps recurse, lists compare element by element, leaves
//!   compare by equality). Lists are order-sensitive; there is no reordering
//!   or fuzzy matching of list elements. Implicit mismatches carry normal
//!   severity, so they surface as warnings and never fail the result.
//! - **explicit**: a list of [`ValidationRule`]s, each a path, a condition,
//!   an expected value, and a severity.
//!
//! Strict-severity failures are fatal (`failures`); normal and lenient
//! failures are recorded as `warnings` and do not fail the result.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::AutomationError;

/// How severe a rule violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Violation fails the validation.
    Strict,
    /// Violation is reported as a warning.
    Normal,
    /// Violation is reported as a warning.
    Lenient,
}

/// Comparison applied between the value at a rule's path and its expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Deep equality.
    Equals,
    /// Substring for strings, membership for arrays, key presence for objects.
    Contains,
        /// Regex match against the stringified actual value, anchored at the
    /// start.
    Matches,
    GreaterThan,
    LessThan,
    /// JSON type name check: "null", "bool", "number", "string", "array", "object".
    TypeOf,
}

impl Condition {
    /// Parse a condition name as it appears in rule definitions.
    pub fn parse(name: &str) -> Result<Self, AutomationError> {
        match name {
            "equals" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "matches" => Ok(Self::Matches),
            "greater_than" => Ok(Self::GreaterThan),
            "less_than" => Ok(Self::LessThan),
            "type" | "type_of" => Ok(Self::TypeOf),
            other => Err(AutomationError::UnknownCondition(other.to_string())),
        }
    }
}

/// One explicit validation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Dotted path into the state tree; `segment[3]` indexes into a list.
    pub path: String,
    pub condition: Condition,
    pub expected: Value,
    pub severity: Severity,
}

impl ValidationRule {
    pub fn new(
        path: impl Into<String>,
        condition: Condition,
        expected: Value,
        severity: Severity,
    ) -> Self {
        Self {
            path: path.into(),
            condition,
            expected,
            severity,
        }
    }
}

/// What to validate a captured state against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValidationSpec {
    /// Explicit rule list.
    Rules(Vec<ValidationRule>),
    /// Expected-state tree, compared structurally.
    Expected(Value),
}

/// Outcome of one validation pass. Pure computed value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
    /// Per-path comparison metadata.
    pub details: Map<String, Value>,
}

/// Validates actual state trees against rules or expected trees.
#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, actual: &Value, spec: &ValidationSpec) -> ValidationResult {
        match spec {
            ValidationSpec::Rules(rules) => self.validate_rules(actual, rules),
            ValidationSpec::Expected(expected) => self.validate_expected(actual, expected),
        }
    }

    /// Apply explicit rules with severity routing.
    pub fn validate_rules(&self, actual: &Value, rules: &[ValidationRule]) -> ValidationResult {
        let mut result = ValidationResult {
            success: true,
            ..Default::default()
        };

        for rule in rules {
            let failure = self.check_rule(actual, rule, &mut result.details);
            if let Some(message) = failure {
                match rule.severity {
                    Severity::Strict => result.failures.push(message),
                    Severity::Normal | Severity::Lenient => result.warnings.push(message),
                }
            }
        }

        result.success = result.failures.is_empty();
        result
    }

    /// Compare `actual` against an expected tree. Mismatches are reported at
    /// normal severity, so they land in `warnings` and the result still
    /// succeeds; a caller that wants a fatal check uses explicit
    /// strict-severity rules instead.
    pub fn validate_expected(&self, actual: &Value, expected: &Value) -> ValidationResult {
        let mut warnings = Vec::new();
        compare_values(actual, expected, "", &mut warnings);
        ValidationResult {
            success: true,
            failures: Vec::new(),
            warnings,
            details: Map::new(),
        }
    }

    /// Check one rule; `None` means it passed. Records comparison metadata
    /// under the rule's path.
    fn check_rule(
        &self,
        actual: &Value,
        rule: &ValidationRule,
        details: &mut Map<String, Value>,
    ) -> Option<String> {
        let found = resolve_path(actual, &rule.path);
        let value = match found {
            Some(value) => value,
            // Missing path is its own failure kind, distinct from a mismatch.
            None => {
                details.insert(rule.path.clone(), json!({"missing_path": true}));
                return Some(format!("Path {} not found in state", rule.path));
            }
        };

        details.insert(
            rule.path.clone(),
            json!({
                "actual": value,
                "expected": rule.expected,
                "condition": rule.condition,
            }),
        );

        let passed = match rule.condition {
            Condition::Equals => value == &rule.expected,
            Condition::Contains => contains(value, &rule.expected),
            Condition::Matches => matches_regex(value, &rule.expected),
            Condition::GreaterThan => numeric_cmp(value, &rule.expected, |a, b| a > b),
            Condition::LessThan => numeric_cmp(value, &rule.expected, |a, b| a < b),
            Condition::TypeOf => type_name(value) == rule.expected.as_str().unwrap_or_default(),
        };

        if passed {
            None
        } else {
            Some(format!(
                "Validation failed for {}: expected {} ({:?}), got {}",
                rule.path, rule.expected, rule.condition, value
            ))
        }
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => expected.as_str().map(|e| s.contains(e)).unwrap_or(false),
        Value::Array(items) => items.contains(expected),
        Value::Object(map) => expected
            .as_str()
            .map(|key| map.contains_key(key))
            .unwrap_or(false),
        _ => false,
    }
}

fn matches_regex(actual: &Value, expected: &Value) -> bool {
    let pattern = match expected.as_str() {
        Some(pattern) => pattern,
        None => return false,
    };
    // Anchored at the start of the text: a prefix match passes, a match
    // further in does not.
    let regex = match Regex::new(&format!(r"\A(?:{pattern})")) {
        Ok(regex) => regex,
        Err(_) => return false,
    };
    let text = match actual {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    regex.is_match(&text)
}

fn numeric_cmp(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Structural comparison for implicit mode. Lists are compared index by
/// index; type mismatches, length mismatches, and per-index mismatches are
/// all reported.
fn compare_values(actual: &Value, expected: &Value, path: &str, mismatches: &mut Vec<String>) {
    match expected {
        Value::Object(expected_map) => {
            let actual_map = match actual.as_object() {
                Some(map) => map,
                None => {
                    mismatches.push(format!(
                        "Type mismatch at {}: expected object, got {}",
                        display_path(path),
                        type_name(actual)
                    ));
                    return;
                }
            };
            for (key, expected_value) in expected_map {
                match actual_map.get(key) {
                    Some(actual_value) => {
                        compare_values(actual_value, expected_value, &join_path(path, key), mismatches)
                    }
                    None => mismatches.push(format!("Missing key: {}", join_path(path, key))),
                }
            }
        }
        Value::Array(expected_items) => {
            let actual_items = match actual.as_array() {
                Some(items) => items,
                None => {
                    mismatches.push(format!(
                        "Type mismatch at {}: expected array, got {}",
                        display_path(path),
                        type_name(actual)
                    ));
                    return;
                }
            };
            if actual_items.len() != expected_items.len() {
                mismatches.push(format!(
                    "List length mismatch at {}: expected {}, got {}",
                    display_path(path),
                    expected_items.len(),
                    actual_items.len()
                ));
            }
            for (index, (actual_item, expected_item)) in
                actual_items.iter().zip(expected_items).enumerate()
            {
                compare_values(
                    actual_item,
                    expected_item,
                    &format!("{}[{index}]", display_path(path)),
                    mismatches,
                );
            }
        }
        leaf => {
            if actual != leaf {
                mismatches.push(format!(
                    "Value mismatch at {}: expected {}, got {}",
                    display_path(path),
                    leaf,
                    actual
                ));
            }
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "$"
    } else {
        path
    }
}

/// Walk a dotted path into a JSON tree. A trailing `[n]` on a segment indexes
/// into a list. Any missing key or out-of-range index resolves to `None`.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (key, index) = split_index(segment);
        if !key.is_empty() {
            current = current.as_object()?.get(key)?;
        }
        if let Some(index) = index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Split `name[3]` into `("name", Some(3))`; plain segments have no index.
fn split_index(segment: &str) -> (&str, Option<usize>) {
    if let Some(open) = segment.find('[') {
        if segment.ends_with(']') {
            let index = segment[open + 1..segment.len() - 1].parse().ok();
            if index.is_some() {
                return (&segment[..open], index);
            }
        }
    }
    (segment, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Value {
        json!({
            "focused_app": "Notes",
            "metrics": {"cpu_percent": 12.5, "active_displays": 2},
            "applications": [
                {"name": "Notes", "pid": 100},
                {"name": "Mail", "pid": 200},
            ],
        })
    }

    #[test]
    fn path_resolution_with_indexing() {
        let state = state();
        assert_eq!(
            resolve_path(&state, "applications[1].name"),
            Some(&json!("Mail"))
        );
        assert_eq!(resolve_path(&state, "metrics.cpu_percent"), Some(&json!(12.5)));
        assert_eq!(resolve_path(&state, "applications[5].name"), None);
        assert_eq!(resolve_path(&state, "metrics.missing"), None);
    }

    #[test]
    fn expected_tree_equal_to_actual_is_clean() {
        let state = state();
        let result = Validator::new().validate_expected(&state, &state);
        assert!(result.success);
        assert!(result.failures.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn expected_tree_reports_structural_mismatches() {
        let actual = json!({"apps": [{"name": "Notes"}], "count": 1});
        let expected = json!({"apps": [{"name": "Mail"}, {"name": "Notes"}], "count": "1"});
        let result = Validator::new().validate_expected(&actual, &expected);
        // Length mismatch, per-index mismatch, and leaf type/value mismatch.
        assert!(result.warnings.iter().any(|w| w.contains("length mismatch")));
        assert!(result.warnings.iter().any(|w| w.contains("apps[0].name")));
        assert!(result.warnings.iter().any(|w| w.contains("count")));
    }

    #[test]
    fn expected_tree_mismatches_warn_but_succeed() {
        let actual = json!({"focused_app": "Mail"});
        let expected = json!({"focused_app": "Notes"});
        let result = Validator::new().validate_expected(&actual, &expected);
        assert!(result.success);
        assert!(result.failures.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("focused_app"));
    }

    #[test]
    fn missing_key_is_reported() {
        let actual = json!({"a": 1});
        let expected = json!({"a": 1, "b": 2});
        let result = Validator::new().validate_expected(&actual, &expected);
        assert!(result.success);
        assert_eq!(result.warnings, vec!["Missing key: b".to_string()]);
    }

    #[test]
    fn severity_routes_failures_and_warnings() {
        let state = state();
        let strict = ValidationRule::new(
            "focused_app",
            Condition::Equals,
            json!("Mail"),
            Severity::Strict,
        );
        let lenient = ValidationRule::new(
            "focused_app",
            Condition::Equals,
            json!("Mail"),
            Severity::Lenient,
        );

        let result = Validator::new().validate_rules(&state, &[strict]);
        assert!(!result.success);
        assert_eq!(result.failures.len(), 1);
        assert!(result.warnings.is_empty());

        let result = Validator::new().validate_rules(&state, &[lenient]);
        assert!(result.success);
        assert!(result.failures.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn missing_path_is_distinct_from_mismatch() {
        let state = state();
        let rule = ValidationRule::new("ghost.path", Condition::Equals, json!(1), Severity::Strict);
        let result = Validator::new().validate_rules(&state, &[rule]);
        assert!(result.failures[0].contains("not found"));
        assert_eq!(result.details["ghost.path"]["missing_path"], json!(true));
    }

    #[test]
    fn condition_semantics() {
        let state = state();
        let validator = Validator::new();
        let pass = |condition, path: &str, expected| {
            let rule = ValidationRule::new(path, condition, expected, Severity::Strict);
            validator.validate_rules(&state, &[rule]).success
        };

        assert!(pass(Condition::Contains, "focused_app", json!("Not")));
        assert!(pass(Condition::Matches, "focused_app", json!("^No.*s$")));
        // Matches is anchored at the start: a prefix pattern passes, a
        // pattern that only occurs mid-string does not.
        assert!(pass(Condition::Matches, "focused_app", json!("Not")));
        assert!(!pass(Condition::Matches, "focused_app", json!("otes")));
        assert!(pass(Condition::GreaterThan, "metrics.cpu_percent", json!(10)));
        assert!(pass(Condition::LessThan, "metrics.cpu_percent", json!(50)));
        assert!(pass(Condition::TypeOf, "applications", json!("array")));
        assert!(!pass(Condition::TypeOf, "applications", json!("object")));
        assert!(!pass(Condition::GreaterThan, "focused_app", json!(1)));
    }

    #[test]
    fn unknown_condition_name_is_rejected() {
        let err = Condition::parse("fuzzy_match").unwrap_err();
        assert!(matches!(err, AutomationError::UnknownCondition(_)));
        assert!(Condition::parse("greater_than").is_ok());
    }
}
