// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Tagged-envelope JSON (de)serialization for every rule-program artifact
//! (§4.8). Every payload round-trips through `{"key": <tag>, "obj": <...>}`;
//! rehydration re-runs the same registration-time validation construction
//! does, so a program authored against a registry that has since dropped a
//! filter is rejected on load rather than silently accepted.
//!

use crate::environment::{Environment, JsonAttribute, JsonAttributeType};
use crate::error::{Error, Result};
use crate::expr::{Container, ContainerNode, Member};
use crate::program::{RuleExpression, RuleProgram};
use crate::registry::Registry;
use crate::types::Type;
use crate::value_source::ValueSource;
use serde_json::{Value as Json, json};

/// Any tagged artifact this module knows how to rehydrate.
#[derive(Debug)]
pub enum Artifact {
    /// A `Constant` value source.
    Constant(ValueSource),
    /// An `Attribute` value source.
    Attribute(ValueSource),
    /// An `AndOperator` container.
    AndOperator(ContainerNode),
    /// An `OrOperator` container.
    OrOperator(ContainerNode),
    /// A declared environment attribute.
    JsonAttribute(JsonAttribute),
    /// An environment schema.
    Environment(Environment),
    /// A single rule expression.
    RuleExpression(RuleExpression),
    /// A full rule program.
    RuleRunner(RuleProgram),
}

/// Dispatch on a tagged envelope's `key` and rehydrate the matching
/// artifact.
pub fn from_dict(envelope: &Json, registry: &Registry) -> Result<Artifact> {
    match tag_of(envelope)? {
        "Constant" => Ok(Artifact::Constant(value_source_from_dict(envelope, registry)?)),
        "Attribute" => Ok(Artifact::Attribute(value_source_from_dict(envelope, registry)?)),
        "AndOperator" => Ok(Artifact::AndOperator(container_from_dict(envelope, registry)?)),
        "OrOperator" => Ok(Artifact::OrOperator(container_from_dict(envelope, registry)?)),
        "JsonAttribute" => Ok(Artifact::JsonAttribute(json_attribute_from_dict(envelope)?)),
        "Environment" => Ok(Artifact::Environment(environment_from_dict(envelope)?)),
        "RuleExpression" => Ok(Artifact::RuleExpression(rule_expression_from_dict(envelope, registry)?)),
        "RuleRunner" => Ok(Artifact::RuleRunner(rule_program_from_dict(envelope, registry)?)),
        other => Err(Error::Api(format!("unknown tagged-envelope key `{other}`.").into())),
    }
}

fn tag_of(envelope: &Json) -> Result<&str> {
    envelope
        .get("key")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::Api("tagged envelope is missing a string `key`.".into()))
}

fn obj_of(envelope: &Json) -> Result<&Json> {
    envelope
        .get("obj")
        .ok_or_else(|| Error::Api("tagged envelope is missing `obj`.".into()))
}

fn field<'a>(obj: &'a Json, name: &str) -> Result<&'a Json> {
    obj.get(name)
        .ok_or_else(|| Error::Api(format!("missing required field `{name}`.").into()))
}

fn str_field<'a>(obj: &'a Json, name: &str) -> Result<&'a str> {
    field(obj, name)?
        .as_str()
        .ok_or_else(|| Error::Api(format!("field `{name}` must be a string.").into()))
}

fn array_field<'a>(obj: &'a Json, name: &str) -> Vec<&'a Json> {
    obj.get(name).and_then(Json::as_array).into_iter().flatten().collect()
}

// ---- ValueSource (Constant / Attribute) ----

/// Serialize a value source. `Constant.obj = {value, type, filters}`;
/// `Attribute.obj` is identical in shape, with `value` holding the path
/// string.
pub fn value_source_to_dict(source: &ValueSource) -> Json {
    let (tag, value, declared_type, filters) = match source {
        ValueSource::Constant {
            declared_type,
            value,
            filters,
        } => ("Constant", value.to_json(), *declared_type, filters),
        ValueSource::Attribute {
            path,
            declared_type,
            filters,
        } => ("Attribute", Json::String(path.clone()), *declared_type, filters),
    };
    let filters_json: Vec<Json> = filters
        .iter()
        .map(|step| {
            json!({
                "filter_key": step.key,
                "args": step.args.iter().map(value_source_to_dict).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "key": tag,
        "obj": {
            "value": value,
            "type": declared_type.to_string(),
            "filters": filters_json,
        }
    })
}

/// Rehydrate a `Constant` or `Attribute` envelope, re-attaching every
/// filter through [`ValueSource::add_filter`] so registration-time
/// validation re-runs against `registry`.
pub fn value_source_from_dict(envelope: &Json, registry: &Registry) -> Result<ValueSource> {
    let tag = tag_of(envelope)?;
    let obj = obj_of(envelope)?;
    let declared_type = Type::from_name(str_field(obj, "type")?)?;
    let value = field(obj, "value")?;

    let mut source = match tag {
        "Constant" => ValueSource::constant(value, Some(declared_type))?,
        "Attribute" => {
            let path = value
                .as_str()
                .ok_or_else(|| Error::Api("Attribute `value` must be a path string.".into()))?;
            ValueSource::attribute(path, declared_type)
        }
        other => return Err(Error::Api(format!("`{other}` is not a value-source tag.").into())),
    };

    for step in array_field(obj, "filters") {
        let filter_key = str_field(step, "filter_key")?;
        let mut args = Vec::new();
        for arg in array_field(step, "args") {
            args.push(value_source_from_dict(arg, registry)?);
        }
        source.add_filter(registry, filter_key, args)?;
    }
    Ok(source)
}

// ---- ContainerNode (AndOperator / OrOperator) ----

/// Serialize a container: `{comparers:[...], sub_containers:[...], not_operator}`.
pub fn container_to_dict(node: &ContainerNode) -> Json {
    let tag = match node.kind {
        Container::And => "AndOperator",
        Container::Or => "OrOperator",
    };
    let mut comparers = Vec::new();
    let mut sub_containers = Vec::new();
    for member in &node.members {
        match member {
            Member::Comparer(call) => comparers.push(json!({
                "comparer_key": call.key,
                "comparable1": value_source_to_dict(&call.left),
                "comparable2": value_source_to_dict(&call.right),
                "selected_collation": [call.collation.0.to_string(), call.collation.1.to_string()],
                "args": call.args.iter().map(value_source_to_dict).collect::<Vec<_>>(),
            })),
            Member::Container(child) => sub_containers.push(container_to_dict(child)),
        }
    }
    json!({
        "key": tag,
        "obj": {
            "comparers": comparers,
            "sub_containers": sub_containers,
            "not_operator": node.negated,
        }
    })
}

/// Rehydrate a container envelope, re-attaching every comparer through
/// [`ContainerNode::add_comparer`] so collation selection and argument
/// validation re-run against `registry`.
pub fn container_from_dict(envelope: &Json, registry: &Registry) -> Result<ContainerNode> {
    let tag = tag_of(envelope)?;
    let kind = match tag {
        "AndOperator" => Container::And,
        "OrOperator" => Container::Or,
        other => return Err(Error::Api(format!("`{other}` is not a container tag.").into())),
    };
    let obj = obj_of(envelope)?;
    let mut node = ContainerNode::new(kind);
    node.negated = obj.get("not_operator").and_then(Json::as_bool).unwrap_or(false);

    for sub in array_field(obj, "sub_containers") {
        node.add_sub_container(container_from_dict(sub, registry)?);
    }
    for comparer in array_field(obj, "comparers") {
        let key = str_field(comparer, "comparer_key")?;
        let left = value_source_from_dict(field(comparer, "comparable1")?, registry)?;
        let right = value_source_from_dict(field(comparer, "comparable2")?, registry)?;
        let collation = parse_collation(comparer.get("selected_collation"))?;
        let mut args = Vec::new();
        for arg in array_field(comparer, "args") {
            args.push(value_source_from_dict(arg, registry)?);
        }
        node.add_comparer(registry, key, left, right, collation, args)?;
    }
    Ok(node)
}

fn parse_collation(value: Option<&Json>) -> Result<Option<(Type, Type)>> {
    let Some(Json::Array(pair)) = value else {
        return Ok(None);
    };
    if pair.len() != 2 {
        return Err(Error::Api("`selected_collation` must have exactly two entries.".into()));
    }
    let left = Type::from_name(pair[0].as_str().unwrap_or_default())?;
    let right = Type::from_name(pair[1].as_str().unwrap_or_default())?;
    Ok(Some((left, right)))
}

// ---- JsonAttribute ----

/// Serialize a declared environment attribute.
pub fn json_attribute_to_dict(attribute: &JsonAttribute) -> Json {
    let attribute_type = match attribute.attribute_type {
        JsonAttributeType::Input => "in",
        JsonAttributeType::Output => "out",
    };
    json!({
        "key": "JsonAttribute",
        "obj": {
            "dot_specifier": attribute.dot_specifier,
            "attribute_type": attribute_type,
            "attribute_data_type": attribute.attribute_data_type.to_string(),
            "pretty_name": attribute.pretty_name,
            "description": attribute.description,
            "read_only": attribute.read_only,
            "max_length": attribute.max_length,
        }
    })
}

/// Rehydrate a declared environment attribute.
pub fn json_attribute_from_dict(envelope: &Json) -> Result<JsonAttribute> {
    let obj = obj_of(envelope)?;
    let attribute_type = match str_field(obj, "attribute_type")? {
        "in" => JsonAttributeType::Input,
        "out" => JsonAttributeType::Output,
        other => return Err(Error::Api(format!("`{other}` is not a valid attribute_type.").into())),
    };
    Ok(JsonAttribute {
        dot_specifier: str_field(obj, "dot_specifier")?.to_owned(),
        attribute_type,
        attribute_data_type: Type::from_name(str_field(obj, "attribute_data_type")?)?,
        pretty_name: str_field(obj, "pretty_name")?.to_owned(),
        description: obj
            .get("description")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_owned(),
        read_only: obj.get("read_only").and_then(Json::as_bool).unwrap_or(false),
        max_length: obj.get("max_length").and_then(Json::as_u64).map(|n| n as usize),
    })
}

// ---- Environment ----

/// Serialize an environment: its attributes, then default mappings as
/// `[in_idx, out_idx]` pairs.
pub fn environment_to_dict(env: &Environment) -> Json {
    let attributes: Vec<Json> = env.attributes().iter().map(json_attribute_to_dict).collect();
    let mappings: Vec<Json> = env
        .default_mapping_indices()
        .iter()
        .map(|&(i, o)| json!([i, o]))
        .collect();
    json!({
        "key": "Environment",
        "obj": {
            "attributes": attributes,
            "default_mappings": mappings,
        }
    })
}

/// Rehydrate an environment.
pub fn environment_from_dict(envelope: &Json) -> Result<Environment> {
    let obj = obj_of(envelope)?;
    let mut env = Environment::new();
    for attribute in array_field(obj, "attributes") {
        env.add_attribute(json_attribute_from_dict(attribute)?);
    }
    for mapping in array_field(obj, "default_mappings") {
        let pair = mapping
            .as_array()
            .ok_or_else(|| Error::Api("each default mapping must be a 2-element array.".into()))?;
        if pair.len() != 2 {
            return Err(Error::Api("each default mapping must be a 2-element array.".into()));
        }
        let input_idx = pair[0]
            .as_u64()
            .ok_or_else(|| Error::Api("default mapping index must be an integer.".into()))? as usize;
        let output_idx = pair[1]
            .as_u64()
            .ok_or_else(|| Error::Api("default mapping index must be an integer.".into()))? as usize;
        env.add_default_mapping_with_index(input_idx, output_idx)?;
    }
    Ok(env)
}

// ---- RuleExpression / RuleRunner ----

/// Serialize a rule expression.
pub fn rule_expression_to_dict(expression: &RuleExpression) -> Json {
    let actions: Vec<Json> = expression
        .actions
        .iter()
        .map(|action| {
            json!({
                "param_key": action.path,
                "value": value_source_to_dict(&action.value),
            })
        })
        .collect();
    json!({
        "key": "RuleExpression",
        "obj": {
            "base_container": container_to_dict(&expression.base_container),
            "actions": actions,
        }
    })
}

/// Rehydrate a rule expression.
pub fn rule_expression_from_dict(envelope: &Json, registry: &Registry) -> Result<RuleExpression> {
    let obj = obj_of(envelope)?;
    let base_container = container_from_dict(field(obj, "base_container")?, registry)?;
    let mut expression = RuleExpression::new(base_container);
    for action in array_field(obj, "actions") {
        let path = str_field(action, "param_key")?.to_owned();
        let value = value_source_from_dict(field(action, "value")?, registry)?;
        expression.add_action(path, value);
    }
    Ok(expression)
}

/// Serialize a full rule program, tagged `RuleRunner` (the reference
/// provider's name for this artifact).
pub fn rule_program_to_dict(program: &RuleProgram) -> Json {
    let expressions: Vec<Json> = program.expressions.iter().map(rule_expression_to_dict).collect();
    json!({
        "key": "RuleRunner",
        "obj": { "expressions": expressions }
    })
}

/// Rehydrate a full rule program.
pub fn rule_program_from_dict(envelope: &Json, registry: &Registry) -> Result<RuleProgram> {
    let obj = obj_of(envelope)?;
    let mut program = RuleProgram::new();
    for expression in array_field(obj, "expressions") {
        program.add_expression(rule_expression_from_dict(expression, registry)?);
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::JsonAttribute;
    use crate::registry::Registry;
    use crate::types::Type;
    use serde_json::json;

    #[test]
    fn test_constant_round_trip() {
        let registry = Registry::with_builtins();
        let source = ValueSource::constant(&json!(5), None).unwrap();
        let dict = value_source_to_dict(&source);
        assert_eq!(dict["key"], "Constant");
        let rehydrated = value_source_from_dict(&dict, &registry).unwrap();
        assert_eq!(
            source.get_type(&registry).unwrap(),
            rehydrated.get_type(&registry).unwrap()
        );
    }

    #[test]
    fn test_attribute_with_filter_round_trip() {
        let registry = Registry::with_builtins();
        let mut source = ValueSource::attribute("a.$val", Type::Numeric);
        source.add_filter(&registry, "numeric_to_string", vec![]).unwrap();
        let dict = value_source_to_dict(&source);
        let rehydrated = value_source_from_dict(&dict, &registry).unwrap();
        let row = json!({"a": 5});
        assert_eq!(
            source.get_value(&row, &registry).unwrap(),
            rehydrated.get_value(&row, &registry).unwrap()
        );
    }

    #[test]
    fn test_environment_round_trip() {
        let mut env = Environment::new();
        env.add_attribute(JsonAttribute::input("a", Type::String, "A"));
        env.add_attribute(JsonAttribute::output("b", Type::Numeric, "B"));
        env.add_default_mapping("a", "b").unwrap();
        let dict = environment_to_dict(&env);
        let rehydrated = environment_from_dict(&dict).unwrap();
        assert_eq!(rehydrated.attributes().len(), 2);
        assert_eq!(rehydrated.get_all_default_mappings().len(), 1);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let registry = Registry::with_builtins();
        let envelope = json!({"key": "NotARealTag", "obj": {}});
        assert!(from_dict(&envelope, &registry).is_err());
    }

    #[test]
    fn test_container_round_trip_reruns_validation() {
        let registry = Registry::with_builtins();
        let mut node = ContainerNode::new(Container::And);
        node.add_comparer(
            &registry,
            "equals",
            ValueSource::attribute("a.$val", Type::String),
            ValueSource::constant(&json!("x"), None).unwrap(),
            None,
            vec![],
        )
        .unwrap();
        let dict = container_to_dict(&node);
        let rehydrated = container_from_dict(&dict, &registry).unwrap();
        let row = json!({"a": "x"});
        assert_eq!(
            node.evaluate(&row, &registry).unwrap(),
            rehydrated.evaluate(&row, &registry).unwrap()
        );
    }
}
