//! Factory functions for the six supported interaction patterns.
//!
//! Each factory expands simple per-pattern parameters into the full
//! steps-plus-criteria shape the executor consumes.

use serde_json::{json, Map, Value};

use super::{InteractionPattern, PatternStep, PatternType, SuccessCriteria};

fn params(entries: Vec<(&str, Value)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Click an element, then wait for `wait_criteria` to hold.
pub fn click_and_wait(
    element_criteria: Map<String, Value>,
    wait_criteria: SuccessCriteria,
) -> InteractionPattern {
    InteractionPattern::new(
        PatternType::ClickAndWait,
        vec![PatternStep::new(
            "click",
            params(vec![("element", Value::Object(element_criteria))]),
        )],
        wait_criteria,
    )
}

/// Type a value into each named field, then click the submit element.
///
/// Fields are filled in the given order; success is a visible
/// `success_message` element.
pub fn fill_and_submit(
    field_values: Vec<(String, String)>,
    submit_criteria: Map<String, Value>,
) -> InteractionPattern {
    let mut steps: Vec<PatternStep> = field_values
        .into_iter()
        .map(|(field, value)| {
            PatternStep::new(
                "type_text",
                params(vec![
                    ("element", json!({"name": field})),
                    ("text", Value::String(value)),
                ]),
            )
        })
        .collect();

    steps.push(PatternStep::new(
        "click",
        params(vec![("element", Value::Object(submit_criteria))]),
    ));

    InteractionPattern::new(
        PatternType::FillAndSubmit,
        steps,
        SuccessCriteria::element_visible(
            json!({"type": "success_message"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ),
    )
}

/// Scroll a container until the target element is visible and clickable.
pub fn scroll_to_find(
    scroll_container: Map<String, Value>,
    target_criteria: Map<String, Value>,
) -> InteractionPattern {
    let mut step = PatternStep::new(
        "scroll",
        params(vec![
            ("element", Value::Object(scroll_container)),
            ("direction", json!("down")),
            ("amount", json!(100)),
        ]),
    );
    step.repeat_until = Some(SuccessCriteria::element_visible(target_criteria.clone()));

    InteractionPattern::new(
        PatternType::ScrollToFind,
        vec![step],
        SuccessCriteria {
            element_visible: Some(target_criteria.clone()),
            element_clickable: Some(target_criteria),
            ..Default::default()
        },
    )
}

/// Drag a source element onto a target; success is any change in the
/// element tree since the pattern started.
pub fn drag_and_drop(
    source_criteria: Map<String, Value>,
    target_criteria: Map<String, Value>,
) -> InteractionPattern {
    InteractionPattern::new(
        PatternType::DragAndDrop,
        vec![PatternStep::new(
            "drag",
            params(vec![
                ("source", Value::Object(source_criteria)),
                ("target", Value::Object(target_criteria)),
            ]),
        )],
        SuccessCriteria {
            state_changed: Some([("elements".to_string(), None)].into_iter().collect()),
            ..Default::default()
        },
    )
}

/// Click a trigger, wait for the modal to appear, then click the action
/// inside it.
pub fn modal_dialog(
    trigger_criteria: Map<String, Value>,
    modal_criteria: Map<String, Value>,
    action_criteria: Map<String, Value>,
) -> InteractionPattern {
    InteractionPattern::new(
        PatternType::ModalDialog,
        vec![
            PatternStep::new(
                "click",
                params(vec![("element", Value::Object(trigger_criteria))]),
            ),
            PatternStep::new(
                "wait",
                params(vec![(
                    "condition",
                    json!({"element_visible": Value::Object(modal_criteria)}),
                )]),
            ),
            PatternStep::new(
                "click",
                params(vec![("element", Value::Object(action_criteria))]),
            ),
        ],
        SuccessCriteria::element_visible(
            json!({"type": "success_message"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ),
    )
}

/// Open a dropdown and click the option matching `option_criteria`; success
/// is the chosen option being visible (as the selected value).
pub fn dropdown_select(
    dropdown_criteria: Map<String, Value>,
    option_criteria: Map<String, Value>,
) -> InteractionPattern {
    InteractionPattern::new(
        PatternType::DropdownSelect,
        vec![
            PatternStep::new(
                "click",
                params(vec![("element", Value::Object(dropdown_criteria))]),
            ),
            PatternStep::new(
                "click",
                params(vec![("element", Value::Object(option_criteria.clone()))]),
            ),
        ],
        SuccessCriteria::element_visible(option_criteria),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_submit_expands_one_step_per_field_plus_click() {
        let pattern = fill_and_submit(
            vec![
                ("username".to_string(), "alice".to_string()),
                ("password".to_string(), "hunter2".to_string()),
            ],
            json!({"type": "button", "text": "Submit"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        assert_eq!(pattern.kind, PatternType::FillAndSubmit);
        assert_eq!(pattern.steps.len(), 3);
        assert_eq!(pattern.steps[0].action, "type_text");
        assert_eq!(pattern.steps[0].params["text"], json!("alice"));
        assert_eq!(pattern.steps[2].action, "click");
        assert!(pattern.success_criteria.element_visible.is_some());
    }

    #[test]
    fn scroll_to_find_repeats_until_target_visible() {
        let target = json!({"id": "row-42"}).as_object().cloned().unwrap();
        let pattern = scroll_to_find(
            json!({"type": "list"}).as_object().cloned().unwrap(),
            target.clone(),
        );

        assert_eq!(pattern.steps.len(), 1);
        let repeat = pattern.steps[0].repeat_until.as_ref().unwrap();
        assert_eq!(repeat.element_visible.as_ref().unwrap(), &target);
        assert!(pattern.success_criteria.element_clickable.is_some());
    }

    #[test]
    fn modal_dialog_has_trigger_wait_action_steps() {
        let pattern = modal_dialog(
            json!({"id": "open"}).as_object().cloned().unwrap(),
            json!({"type": "modal"}).as_object().cloned().unwrap(),
            json!({"text": "OK"}).as_object().cloned().unwrap(),
        );
        let actions: Vec<_> = pattern.steps.iter().map(|s| s.action.as_str()).collect();
        assert_eq!(actions, vec!["click", "wait", "click"]);
    }
}
