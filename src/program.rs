// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Rule expressions and rule programs: the top-level artifacts that tie a
//! boolean condition to a set of output actions, and run a sequence of
//! such expressions over a stream of rows (§4.6).
//!

use crate::environment::{Environment, JsonAttributeType};
use crate::error::Result;
use crate::expr::ContainerNode;
use crate::path;
use crate::registry::Registry;
use crate::value_source::ValueSource;
use serde_json::Value as Json;
use std::collections::HashSet;
use tracing::debug;

/// One `path := value` assignment, applied when its owning expression's
/// condition holds.
#[derive(Debug, Clone)]
pub struct Action {
    /// The output dot-notation path written to.
    pub path: String,
    /// The value source computing what to write.
    pub value: ValueSource,
}

/// A condition (`base_container`) plus the actions applied to a row when
/// it holds.
#[derive(Debug, Clone)]
pub struct RuleExpression {
    /// The boolean condition gating this expression's actions.
    pub base_container: ContainerNode,
    /// Actions applied, in order, when the condition evaluates true.
    pub actions: Vec<Action>,
}

impl RuleExpression {
    /// A new expression with no actions, gated by `base_container`.
    pub fn new(base_container: ContainerNode) -> Self {
        Self {
            base_container,
            actions: Vec::new(),
        }
    }

    /// Append an action.
    pub fn add_action(&mut self, path: impl Into<String>, value: ValueSource) {
        self.actions.push(Action {
            path: path.into(),
            value,
        });
    }

    /// Evaluate this expression's condition against `row` and, if it
    /// holds, apply its actions in order. Each action's value is computed
    /// against the row as updated by this expression's own earlier
    /// actions, so later actions can read values written by earlier ones.
    /// Returns the (possibly unchanged) row and the set of paths written.
    pub fn run_on_row(&self, row: &Json, registry: &Registry) -> Result<(Json, HashSet<String>)> {
        let mut changed = HashSet::new();
        if !self.base_container.evaluate(row, registry)? {
            return Ok((row.clone(), changed));
        }
        debug!("condition held, applying {} action(s).", self.actions.len());
        let mut out = row.clone();
        for action in &self.actions {
            let value = action.value.get_value(&out, registry)?;
            out = path::set(&out, &action.path, &value.to_json())?;
            changed.insert(action.path.clone());
        }
        Ok((out, changed))
    }

    /// Statically validate this expression: the condition validates, and
    /// every action targets a known, non-read_only `Output` path with a
    /// validating value.
    pub fn validate(&self, env: &Environment) -> bool {
        if !self.base_container.validate(env) {
            return false;
        }
        self.actions.iter().all(|action| {
            let matches = env.query(Some(JsonAttributeType::Output), Some(&action.path));
            !matches.is_empty() && matches.iter().all(|a| !a.read_only) && action.value.validate(env)
        })
    }
}

/// A sequence of rule expressions run, in order, over every row of a
/// stream, followed by default-mapping fill-in for untouched outputs.
#[derive(Debug, Clone, Default)]
pub struct RuleProgram {
    /// The expressions run against every row, in declaration order.
    pub expressions: Vec<RuleExpression>,
}

impl RuleProgram {
    /// A program with no expressions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an expression.
    pub fn add_expression(&mut self, expression: RuleExpression) {
        self.expressions.push(expression);
    }

    /// Run every expression against `row` in declaration order, then fill
    /// in every default mapping whose output was not written by any
    /// expression.
    pub fn run_on_row(&self, row: &Json, env: &Environment, registry: &Registry) -> Result<Json> {
        let mut out = row.clone();
        let mut changed: HashSet<String> = HashSet::new();
        for expression in &self.expressions {
            let (next, expr_changed) = expression.run_on_row(&out, registry)?;
            out = next;
            changed.extend(expr_changed);
        }
        for (input_attr, output_attr) in env.get_all_default_mappings() {
            if changed.contains(&output_attr.dot_specifier) {
                continue;
            }
            let raw = path::get(&out, &input_attr.dot_specifier)?;
            let parsed = output_attr.attribute_data_type.parse(&raw)?;
            out = path::set(&out, &output_attr.dot_specifier, &parsed.to_json())?;
        }
        Ok(out)
    }

    /// Run this program over every row of `rows`, lazily, in declaration
    /// order.
    pub fn run_on_iterable<'a, I>(
        &'a self,
        rows: I,
        env: &'a Environment,
        registry: &'a Registry,
    ) -> impl Iterator<Item = Result<Json>> + 'a
    where
        I: IntoIterator<Item = Json> + 'a,
    {
        rows.into_iter().map(move |row| self.run_on_row(&row, env, registry))
    }

    /// Statically validate every expression in this program.
    pub fn validate_with_environment(&self, env: &Environment) -> bool {
        self.expressions.iter().all(|expression| expression.validate(env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::JsonAttribute;
    use crate::registry::Registry;
    use crate::types::Type;
    use serde_json::json;

    fn env_with_a_b_c() -> Environment {
        let mut env = Environment::new();
        env.add_attribute(JsonAttribute::input("a.$val", Type::String, "A"));
        env.add_attribute(JsonAttribute::output("b", Type::Numeric, "B"));
        env.add_attribute(JsonAttribute::output("c", Type::Numeric, "C"));
        env.add_default_mapping("a.$val", "b").unwrap();
        env
    }

    // S1: conjunction false leaves `c` unset and fills `b` via default mapping.
    #[test]
    fn test_scenario_s1() {
        let registry = Registry::with_builtins();
        let env = env_with_a_b_c();

        let mut container = ContainerNode::new(crate::expr::Container::And);
        container
            .add_comparer(
                &registry,
                "equals",
                ValueSource::attribute("a.$val", Type::String),
                ValueSource::constant(&json!(5), None).unwrap(),
                None,
                vec![],
            )
            .unwrap();
        container
            .add_comparer(
                &registry,
                "equals",
                ValueSource::attribute("a.$val", Type::String),
                ValueSource::constant(&json!(30), None).unwrap(),
                None,
                vec![],
            )
            .unwrap();
        let mut expr = RuleExpression::new(container);
        expr.add_action("c", ValueSource::constant(&json!(35), None).unwrap());

        let mut program = RuleProgram::new();
        program.add_expression(expr);

        assert!(program.validate_with_environment(&env));

        let out = program.run_on_row(&json!({"a": "5"}), &env, &registry).unwrap();
        assert_eq!(out.get("c"), None);
        assert_eq!(out.get("b"), Some(&json!(5.0)));
    }

    // S2: disjunction true assigns `c` and the default mapping still fills `b`.
    #[test]
    fn test_scenario_s2() {
        let registry = Registry::with_builtins();
        let env = env_with_a_b_c();

        let mut container = ContainerNode::new(crate::expr::Container::Or);
        container
            .add_comparer(
                &registry,
                "equals",
                ValueSource::attribute("a.$val", Type::String),
                ValueSource::constant(&json!(5), None).unwrap(),
                None,
                vec![],
            )
            .unwrap();
        container
            .add_comparer(
                &registry,
                "equals",
                ValueSource::attribute("a.$val", Type::String),
                ValueSource::constant(&json!(30), None).unwrap(),
                None,
                vec![],
            )
            .unwrap();
        let mut expr = RuleExpression::new(container);
        expr.add_action("c", ValueSource::constant(&json!(35), None).unwrap());

        let mut program = RuleProgram::new();
        program.add_expression(expr);

        let out = program.run_on_row(&json!({"a": "5.0"}), &env, &registry).unwrap();
        assert_eq!(out.get("c"), Some(&json!(35.0)));
        assert_eq!(out.get("b"), Some(&json!(5.0)));
    }

    #[test]
    fn test_default_mapping_never_overwrites_explicit_action() {
        let registry = Registry::with_builtins();
        let mut env = Environment::new();
        env.add_attribute(JsonAttribute::input("a.$val", Type::Numeric, "A"));
        env.add_attribute(JsonAttribute::output("b", Type::Numeric, "B"));
        env.add_default_mapping("a.$val", "b").unwrap();

        let container = ContainerNode::new(crate::expr::Container::And);
        let mut expr = RuleExpression::new(container);
        expr.add_action("b", ValueSource::constant(&json!(999), None).unwrap());
        let mut program = RuleProgram::new();
        program.add_expression(expr);

        let out = program.run_on_row(&json!({"a": 1}), &env, &registry).unwrap();
        assert_eq!(out.get("b"), Some(&json!(999.0)));
    }
}
