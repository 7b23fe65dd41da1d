// SPDX-License-Identifier: Apache-2.0

use movejson_rs::prelude::*;
use serde_json::json;

fn transaction_row() -> serde_json::Value {
    json!({
        "transaction_variations": [
            {"formatted_name": "Primary color", "formatted_value": "14k Gold"},
            {"formatted_name": "Size", "formatted_value": "Large"},
        ]
    })
}

// S3: a dict-list filtering pipeline narrows to the matching entry, extracts
// its value, and a case-insensitive substring comparer gates the action.
#[test]
fn test_dict_list_filtering_pipeline() {
    let registry = Registry::with_builtins();

    let mut env = Environment::new();
    env.add_attribute(JsonAttribute::input(
        "transaction_variations",
        Type::DictList,
        "Transaction variations",
    ));
    env.add_attribute(JsonAttribute::output("out_color", Type::String, "Out color"));

    let mut left = ValueSource::attribute("transaction_variations", Type::DictList);
    left.add_filter(
        &registry,
        "filter_by_subvalue_include",
        vec![
            ValueSource::constant(&json!("formatted_name.$val"), None).unwrap(),
            ValueSource::constant(&json!("Color"), None).unwrap(),
        ],
    )
    .unwrap();
    left.add_filter(
        &registry,
        "extract_with_dot_specifier_to_string",
        vec![ValueSource::constant(&json!("formatted_value.$val"), None).unwrap()],
    )
    .unwrap();

    let right = ValueSource::constant(&json!("Gold"), None).unwrap();

    let mut condition = ContainerNode::new(Container::And);
    condition
        .add_comparer(&registry, "string_includes_ignorecase", left, right, None, vec![])
        .unwrap();

    let mut expression = RuleExpression::new(condition);
    expression.add_action("out_color", ValueSource::constant(&json!("Gold"), None).unwrap());

    let mut program = RuleProgram::new();
    program.add_expression(expression);

    assert!(program.validate_with_environment(&env));

    let out = program.run_on_row(&transaction_row(), &env, &registry).unwrap();
    assert_eq!(out["out_color"], json!("Gold"));
}

// S3 negative case: a Color variation is found, but its value does not
// contain "Gold", so the comparer is false and the action never fires.
#[test]
fn test_dict_list_filtering_pipeline_no_match() {
    let registry = Registry::with_builtins();

    let mut env = Environment::new();
    env.add_attribute(JsonAttribute::input(
        "transaction_variations",
        Type::DictList,
        "Transaction variations",
    ));
    env.add_attribute(JsonAttribute::output("out_color", Type::String, "Out color"));

    let mut left = ValueSource::attribute("transaction_variations", Type::DictList);
    left.add_filter(
        &registry,
        "filter_by_subvalue_include",
        vec![
            ValueSource::constant(&json!("formatted_name.$val"), None).unwrap(),
            ValueSource::constant(&json!("Color"), None).unwrap(),
        ],
    )
    .unwrap();
    left.add_filter(
        &registry,
        "extract_with_dot_specifier_to_string",
        vec![ValueSource::constant(&json!("formatted_value.$val"), None).unwrap()],
    )
    .unwrap();

    let mut condition = ContainerNode::new(Container::And);
    condition
        .add_comparer(
            &registry,
            "string_includes_ignorecase",
            left,
            ValueSource::constant(&json!("Gold"), None).unwrap(),
            None,
            vec![],
        )
        .unwrap();

    let mut expression = RuleExpression::new(condition);
    expression.add_action("out_color", ValueSource::constant(&json!("Gold"), None).unwrap());

    let mut program = RuleProgram::new();
    program.add_expression(expression);

    let row = json!({
        "transaction_variations": [
            {"formatted_name": "Primary color", "formatted_value": "14k Silver"},
        ]
    });
    let out = program.run_on_row(&row, &env, &registry).unwrap();
    assert_eq!(out.get("out_color"), None);
}

// S5: a program built with the public builders evaluates identically after
// a to_dict/from_dict round trip, across a small row corpus.
#[test]
fn test_program_round_trip_evaluates_identically() {
    let registry = Registry::with_builtins();

    let mut env = Environment::new();
    env.add_attribute(JsonAttribute::input("a.$val", Type::Numeric, "A"));
    env.add_attribute(JsonAttribute::output("b", Type::String, "B"));
    env.add_attribute(JsonAttribute::output("c", Type::Numeric, "C"));
    env.add_default_mapping("a.$val", "c").unwrap();

    let mut condition = ContainerNode::new(Container::Or);
    condition
        .add_comparer(
            &registry,
            "equals",
            ValueSource::attribute("a.$val", Type::Numeric),
            ValueSource::constant(&json!(5), None).unwrap(),
            None,
            vec![],
        )
        .unwrap();
    let mut expression = RuleExpression::new(condition);
    let mut value = ValueSource::attribute("a.$val", Type::Numeric);
    value.add_filter(&registry, "numeric_to_string", vec![]).unwrap();
    expression.add_action("b", value);

    let mut program = RuleProgram::new();
    program.add_expression(expression);

    let dict = rule_program_to_dict(&program);
    let rehydrated = rule_program_from_dict(&dict, &registry).unwrap();

    for a in [json!(5), json!(6), json!(0)] {
        let row = json!({"a": a});
        let lhs = program.run_on_row(&row, &env, &registry).unwrap();
        let rhs = rehydrated.run_on_row(&row, &env, &registry).unwrap();
        assert_eq!(lhs, rhs);
    }
}

#[test]
fn test_unknown_tag_round_trip_via_dispatcher_fails() {
    let registry = Registry::with_builtins();
    let envelope = json!({"key": "SomethingElse", "obj": {}});
    assert!(from_dict(&envelope, &registry).is_err());
}
