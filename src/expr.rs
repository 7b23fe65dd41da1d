// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The boolean expression tree: comparer calls as leaves, composed under
//! `AND`/`OR` containers with optional negation (§4.5).
//!

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::registry::{ComparerInfo, Registry, ValueClass};
use crate::types::Type;
use crate::value_source::ValueSource;
use serde_json::Value as Json;
use tracing::debug;

/// Which boolean composition a [`ContainerNode`] performs over its
/// members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Conjunction; an empty container evaluates to `true`.
    And,
    /// Disjunction; an empty container evaluates to `false`.
    Or,
}

/// A single leaf: a registered comparer applied to a left `Attribute`
/// operand and a right operand, with its collation already resolved.
#[derive(Debug, Clone)]
pub struct ComparerCall {
    /// The registered comparer key.
    pub key: String,
    /// The left operand; always an `Attribute` (§4.5).
    pub left: ValueSource,
    /// The right operand.
    pub right: ValueSource,
    /// The `(left_type, right_type)` collation chosen at build time.
    pub collation: (Type, Type),
    /// Extra arguments, beyond the two compared operands.
    pub args: Vec<ValueSource>,
}

/// A member of a container: either a nested container, or a comparer
/// leaf.
#[derive(Debug, Clone)]
pub enum Member {
    /// A nested boolean container.
    Container(ContainerNode),
    /// A comparer leaf.
    Comparer(ComparerCall),
}

/// A boolean composition node: `AndContainer`/`OrContainer` in the source
/// terminology, unified here as one tagged type (§9, "Closed variants over
/// inheritance").
#[derive(Debug, Clone)]
pub struct ContainerNode {
    /// Whether this composes its members by conjunction or disjunction.
    pub kind: Container,
    /// The container's children, in declaration order.
    pub members: Vec<Member>,
    /// Whether the composed result is negated.
    pub negated: bool,
}

impl ContainerNode {
    /// An empty container of the given kind, not negated.
    pub fn new(kind: Container) -> Self {
        Self {
            kind,
            members: Vec::new(),
            negated: false,
        }
    }

    /// Evaluate this container's members against `row` and combine them.
    pub fn evaluate(&self, row: &Json, registry: &Registry) -> Result<bool> {
        let base = match self.kind {
            Container::And => {
                let mut acc = true;
                for member in &self.members {
                    acc = member.evaluate(row, registry)? && acc;
                }
                acc
            }
            Container::Or => {
                let mut acc = false;
                for member in &self.members {
                    acc = member.evaluate(row, registry)? || acc;
                }
                acc
            }
        };
        Ok(base ^ self.negated)
    }

    /// Append a nested container as a member.
    pub fn add_sub_container(&mut self, child: ContainerNode) {
        self.members.push(Member::Container(child));
    }

    /// Build and append a comparer leaf. See §4.5 for the validation and
    /// collation-selection rules enforced here.
    pub fn add_comparer(
        &mut self,
        registry: &Registry,
        key: &str,
        left: ValueSource,
        right: ValueSource,
        collation: Option<(Type, Type)>,
        args: Vec<ValueSource>,
    ) -> Result<()> {
        let info = registry
            .comparer(key)
            .ok_or_else(|| Error::rule_creation(format!("no comparer registered under key `{key}`.")))?;

        let mut violations = Vec::new();

        if !matches!(left.value_class(), ValueClass::Attribute) {
            violations.push("a comparer's left operand must be an Attribute.".to_owned());
        }
        if !info.value_classes.contains(&right.value_class()) {
            violations.push(format!(
                "comparer `{key}`'s right operand has a disallowed value class."
            ));
        }

        let left_type = left.get_type(registry)?;
        let right_type = right.get_type(registry)?;
        let selected_collation = select_collation(info, collation, left_type, right_type, &mut violations);

        if args.len() != info.params.len() {
            violations.push(format!(
                "comparer `{key}` expects {} argument(s), got {}.",
                info.params.len(),
                args.len()
            ));
        }
        for (i, (arg, param)) in args.iter().zip(info.params.iter()).enumerate() {
            if !param.value_classes.contains(&arg.value_class()) {
                violations.push(format!(
                    "argument {i} to comparer `{key}` has a disallowed value class."
                ));
                continue;
            }
            match arg.get_type(registry) {
                Ok(arg_type) if arg_type.is_allowed_source_for(param.param_type) => {}
                Ok(arg_type) => violations.push(format!(
                    "argument {i} to comparer `{key}` has type {arg_type}, not convertible to {}.",
                    param.param_type
                )),
                Err(e) => violations.push(format!(
                    "argument {i} to comparer `{key}` failed to type-check: {e}"
                )),
            }
        }

        let Some(collation) = selected_collation else {
            return Err(Error::RuleCreation { detail: violations });
        };
        if !violations.is_empty() {
            return Err(Error::RuleCreation { detail: violations });
        }

        self.members.push(Member::Comparer(ComparerCall {
            key: key.to_owned(),
            left,
            right,
            collation,
            args,
        }));
        Ok(())
    }

    /// Statically validate every member of this container.
    pub fn validate(&self, env: &Environment) -> bool {
        self.members.iter().all(|member| member.validate(env))
    }
}

/// Resolve the `(left_type, right_type)` collation a comparer call should
/// run under, recording any violation encountered.
fn select_collation(
    info: &ComparerInfo,
    explicit: Option<(Type, Type)>,
    left_type: Type,
    right_type: Type,
    violations: &mut Vec<String>,
) -> Option<(Type, Type)> {
    match explicit {
        Some(pair) => {
            if !info.collation_types.contains(&pair) {
                violations.push(format!(
                    "({}, {}) is not a declared collation for comparer `{}`.",
                    pair.0, pair.1, info.key
                ));
                return None;
            }
            if !left_type.is_allowed_source_for(pair.0) || !right_type.is_allowed_source_for(pair.1) {
                violations.push(format!(
                    "operand types ({left_type}, {right_type}) are not compatible with collation ({}, {}).",
                    pair.0, pair.1
                ));
                return None;
            }
            Some(pair)
        }
        None => {
            let exact = info
                .collation_types
                .iter()
                .copied()
                .find(|&(l, r)| l == left_type && r == right_type);
            let found = exact.or_else(|| {
                info.collation_types
                    .iter()
                    .copied()
                    .find(|&(l, r)| left_type.is_allowed_source_for(l) && right_type.is_allowed_source_for(r))
            });
            if found.is_none() {
                debug!(
                    "no declared collation for comparer `{}` accepts operand types ({left_type}, {right_type}).",
                    info.key
                );
                violations.push(format!(
                    "no declared collation for comparer `{}` accepts operand types ({left_type}, {right_type}).",
                    info.key
                ));
            }
            found
        }
    }
}

impl Member {
    fn evaluate(&self, row: &Json, registry: &Registry) -> Result<bool> {
        match self {
            Member::Container(c) => c.evaluate(row, registry),
            Member::Comparer(c) => c.evaluate(row, registry),
        }
    }

    fn validate(&self, env: &Environment) -> bool {
        match self {
            Member::Container(c) => c.validate(env),
            Member::Comparer(c) => c.validate(env),
        }
    }
}

impl ComparerCall {
    fn evaluate(&self, row: &Json, registry: &Registry) -> Result<bool> {
        let info = registry
            .comparer(&self.key)
            .ok_or_else(|| Error::Api(format!("unknown comparer `{}`.", self.key).into()))?;

        let (left_collation, right_collation) = self.collation;
        let left_value = self.left.get_value(row, registry)?;
        let left_type = self.left.get_type(registry)?;
        let left_converted = left_collation.implicit_parse(&left_value, left_type)?;

        let right_value = self.right.get_value(row, registry)?;
        let right_type = self.right.get_type(registry)?;
        let right_converted = right_collation.implicit_parse(&right_value, right_type)?;

        let mut call_args = Vec::with_capacity(2 + self.args.len());
        call_args.push(left_converted);
        call_args.push(right_converted);
        for (arg, param) in self.args.iter().zip(info.params.iter()) {
            let arg_value = arg.get_value(row, registry)?;
            let arg_type = arg.get_type(registry)?;
            let converted = if arg_type == param.param_type {
                arg_value
            } else {
                param.param_type.implicit_parse(&arg_value, arg_type)?
            };
            call_args.push(converted);
        }
        info.call(&call_args)
    }

    fn validate(&self, env: &Environment) -> bool {
        self.left.validate(env) && self.right.validate(env) && self.args.iter().all(|a| a.validate(env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde_json::json;

    #[test]
    fn test_empty_and_is_true() {
        let registry = Registry::with_builtins();
        let node = ContainerNode::new(Container::And);
        assert!(node.evaluate(&json!({}), &registry).unwrap());
    }

    #[test]
    fn test_empty_and_negated_is_false() {
        let registry = Registry::with_builtins();
        let mut node = ContainerNode::new(Container::And);
        node.negated = true;
        assert!(!node.evaluate(&json!({}), &registry).unwrap());
    }

    #[test]
    fn test_empty_or_is_false() {
        let registry = Registry::with_builtins();
        let node = ContainerNode::new(Container::Or);
        assert!(!node.evaluate(&json!({}), &registry).unwrap());
    }

    #[test]
    fn test_add_comparer_and_evaluate() {
        let registry = Registry::with_builtins();
        let mut node = ContainerNode::new(Container::And);
        let left = ValueSource::attribute("a.$val", Type::String);
        let right = ValueSource::constant(&json!(5), None).unwrap();
        node.add_comparer(&registry, "equals", left, right, None, vec![])
            .unwrap();
        assert!(node.evaluate(&json!({"a": "5.0"}), &registry).unwrap());
        assert!(!node.evaluate(&json!({"a": "6.0"}), &registry).unwrap());
    }

    #[test]
    fn test_add_comparer_rejects_non_attribute_left() {
        let registry = Registry::with_builtins();
        let mut node = ContainerNode::new(Container::And);
        let left = ValueSource::constant(&json!("x"), None).unwrap();
        let right = ValueSource::constant(&json!("x"), None).unwrap();
        assert!(
            node.add_comparer(&registry, "equals", left, right, None, vec![])
                .is_err()
        );
    }
}
