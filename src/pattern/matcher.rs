//! Pattern registry and confidence-scored matching against snapshots.

use serde_json::{Map, Value};

use super::{InteractionPattern, PatternType, SuccessCriteria};
use crate::state::StateSnapshot;

/// Named patterns available for matching. Owned and injected; there is no
/// process-wide registry.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: Vec<(String, InteractionPattern)>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern under a name. Names are unique; re-registering
    /// replaces the previous pattern.
    pub fn register(&mut self, name: impl Into<String>, pattern: InteractionPattern) {
        let name = name.into();
        self.patterns.retain(|(existing, _)| existing != &name);
        self.patterns.push((name, pattern));
    }

    pub fn get(&self, name: &str) -> Option<&InteractionPattern> {
        self.patterns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, pattern)| pattern)
    }

    /// All registered names for one pattern type.
    pub fn names_for(&self, kind: PatternType) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|(_, pattern)| pattern.kind == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &InteractionPattern)> {
        self.patterns
            .iter()
            .map(|(name, pattern)| (name.as_str(), pattern))
    }
}

/// One scored match.
#[derive(Debug, Clone)]
pub struct PatternMatch<'a> {
    pub name: &'a str,
    pub pattern: &'a InteractionPattern,
    /// Applicability score in [0.0, 1.0].
    pub confidence: f64,
}

/// Scores registered patterns against a snapshot.
///
/// Confidence is the fraction of a pattern's element/text criteria already
/// satisfiable in the snapshot: a pattern whose target elements are present
/// is likely to apply to the current screen.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    registry: PatternRegistry,
}

impl PatternMatcher {
    pub fn new(registry: PatternRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Score all registered patterns, highest confidence first. Patterns
    /// scoring zero are omitted.
    pub fn match_patterns(&self, snapshot: &StateSnapshot) -> Vec<PatternMatch<'_>> {
        let mut matches: Vec<PatternMatch<'_>> = self
            .registry
            .iter()
            .map(|(name, pattern)| PatternMatch {
                name,
                pattern,
                confidence: score(pattern, snapshot),
            })
            .filter(|m| m.confidence > 0.0)
            .collect();
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }

    /// The best match at or above `threshold`, if any.
    pub fn best_match(&self, snapshot: &StateSnapshot, threshold: f64) -> Option<PatternMatch<'_>> {
        self.match_patterns(snapshot)
            .into_iter()
            .find(|m| m.confidence >= threshold)
    }
}

/// Fraction of checkable criteria the snapshot already satisfies.
///
/// Element queries embedded in the pattern's steps count alongside the
/// success criteria's visibility/text clauses. `state_changed` clauses are
/// not checkable from a single snapshot and are ignored.
fn score(pattern: &InteractionPattern, snapshot: &StateSnapshot) -> f64 {
    let mut checked = 0u32;
    let mut satisfied = 0u32;

    let mut check_query = |query: &Map<String, Value>| {
        checked += 1;
        if snapshot.find_element(query).is_some() {
            satisfied += 1;
        }
    };

    for step in &pattern.steps {
        for param in ["element", "source", "target"] {
            if let Some(Value::Object(query)) = step.params.get(param) {
                check_query(query);
            }
        }
    }
    score_criteria(&pattern.success_criteria, snapshot, &mut checked, &mut satisfied);

    if checked == 0 {
        0.0
    } else {
        f64::from(satisfied) / f64::from(checked)
    }
}

fn score_criteria(
    criteria: &SuccessCriteria,
    snapshot: &StateSnapshot,
    checked: &mut u32,
    satisfied: &mut u32,
) {
    if let Some(query) = &criteria.element_visible {
        *checked += 1;
        if snapshot.find_element(query).is_some() {
            *satisfied += 1;
        }
    }
    if let Some(query) = &criteria.element_clickable {
        *checked += 1;
        if snapshot
            .find_element(query)
            .is_some_and(|element| element.clickable)
        {
            *satisfied += 1;
        }
    }
    if let Some(text) = &criteria.text_present {
        *checked += 1;
        if snapshot.has_text(text) {
            *satisfied += 1;
        }
    }
}
