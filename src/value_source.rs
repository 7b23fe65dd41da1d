// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Value sources: the leaves that produce a typed [`Value`] either from a
//! literal ([`ValueSource::Constant`]) or from the current row
//! ([`ValueSource::Attribute`]), each optionally threaded through a chain
//! of registered filters.
//!

use crate::environment::{Environment, JsonAttributeType};
use crate::error::{Error, Result};
use crate::path;
use crate::registry::{FilterInfo, Registry, ValueClass};
use crate::types::{AUTO_DETECT_ORDER, Type, Value};
use serde_json::Value as Json;
use tracing::error;

/// One filter attached to a value source's pipeline, with its resolved
/// argument sources.
#[derive(Debug, Clone)]
pub struct FilterStep {
    /// The registered filter key.
    pub key: String,
    /// Argument sources, evaluated against the same row as the pipeline
    /// itself.
    pub args: Vec<ValueSource>,
}

/// A leaf that produces a value: either a literal or a row-attribute
/// lookup, each with an attached filter pipeline (§4.4).
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// A literal value, parsed once at construction time.
    Constant {
        /// The type the literal was parsed as.
        declared_type: Type,
        /// The parsed literal.
        value: Value,
        /// Filters threaded over the literal at evaluation time.
        filters: Vec<FilterStep>,
    },
    /// A value read from the current row by dot-notation path.
    Attribute {
        /// The dot-notation path into the row.
        path: String,
        /// The type the row value is parsed as.
        declared_type: Type,
        /// Filters threaded over the read value at evaluation time.
        filters: Vec<FilterStep>,
    },
}

impl ValueSource {
    /// Build a `Constant`. If `declared_type` is absent, try every type in
    /// [`AUTO_DETECT_ORDER`], keeping the first one that parses `raw`.
    pub fn constant(raw: &Json, declared_type: Option<Type>) -> Result<Self> {
        let (declared_type, value) = match declared_type {
            Some(ty) => (ty, ty.parse(raw)?),
            None => auto_detect(raw)?,
        };
        Ok(ValueSource::Constant {
            declared_type,
            value,
            filters: Vec::new(),
        })
    }

    /// Build an `Attribute` reading `path` out of each row, parsed as
    /// `declared_type`.
    pub fn attribute(path: impl Into<String>, declared_type: Type) -> Self {
        ValueSource::Attribute {
            path: path.into(),
            declared_type,
            filters: Vec::new(),
        }
    }

    /// Which [`ValueClass`] this source is.
    pub fn value_class(&self) -> ValueClass {
        match self {
            ValueSource::Constant { .. } => ValueClass::Constant,
            ValueSource::Attribute { .. } => ValueClass::Attribute,
        }
    }

    /// The dot-notation path, for `Attribute` sources.
    pub fn path(&self) -> Option<&str> {
        match self {
            ValueSource::Attribute { path, .. } => Some(path),
            ValueSource::Constant { .. } => None,
        }
    }

    fn declared_type(&self) -> Type {
        match self {
            ValueSource::Constant { declared_type, .. }
            | ValueSource::Attribute { declared_type, .. } => *declared_type,
        }
    }

    fn filters(&self) -> &[FilterStep] {
        match self {
            ValueSource::Constant { filters, .. } | ValueSource::Attribute { filters, .. } => filters,
        }
    }

    fn filters_mut(&mut self) -> &mut Vec<FilterStep> {
        match self {
            ValueSource::Constant { filters, .. } | ValueSource::Attribute { filters, .. } => filters,
        }
    }

    /// The type this pipeline's output carries, threading the declared
    /// type through each attached filter's first-matching manipulation
    /// pair.
    pub fn get_type(&self, registry: &Registry) -> Result<Type> {
        let mut current = self.declared_type();
        for step in self.filters() {
            let info = filter_info(registry, &step.key)?;
            let (_, out) = matching_pair_or_fail(info, current)?;
            current = out;
        }
        Ok(current)
    }

    /// Evaluate this pipeline against `row`.
    pub fn get_value(&self, row: &Json, registry: &Registry) -> Result<Value> {
        let mut current_value = match self {
            ValueSource::Constant { value, .. } => value.clone(),
            ValueSource::Attribute {
                path: p,
                declared_type,
                ..
            } => {
                let raw = path::get(row, p)?;
                declared_type.parse(&raw)?
            }
        };
        let mut current_type = self.declared_type();
        for step in self.filters() {
            let info = filter_info(registry, &step.key)?;
            let (in_type, out_type) = matching_pair_or_fail(info, current_type)?;
            let converted = in_type.implicit_parse(&current_value, current_type)?;
            let mut call_args = Vec::with_capacity(1 + step.args.len());
            call_args.push(converted);
            for arg in &step.args {
                call_args.push(arg.get_value(row, registry)?);
            }
            current_value = info.call(&call_args)?;
            current_type = out_type;
        }
        Ok(current_value)
    }

    /// Attach a filter to this pipeline. Validates the filter exists,
    /// accepts the pipeline's current type, and that every argument's
    /// value class and type are acceptable for the corresponding
    /// parameter. All violations are reported together.
    pub fn add_filter(&mut self, registry: &Registry, key: &str, args: Vec<ValueSource>) -> Result<()> {
        let info = registry
            .filter(key)
            .ok_or_else(|| Error::rule_creation(format!("no filter registered under key `{key}`.")))?;

        let mut violations = Vec::new();

        if args.len() != info.params.len() {
            violations.push(format!(
                "filter `{key}` expects {} argument(s), got {}.",
                info.params.len(),
                args.len()
            ));
        }

        let current_type = self.get_type(registry)?;
        if info.matching_pair(current_type).is_none() {
            violations.push(format!(
                "filter `{key}` does not accept the pipeline's current type {current_type}."
            ));
        }

        for (i, (arg, param)) in args.iter().zip(info.params.iter()).enumerate() {
            if !param.value_classes.contains(&arg.value_class()) {
                violations.push(format!(
                    "argument {i} to filter `{key}` has a disallowed value class."
                ));
                continue;
            }
            match arg.get_type(registry) {
                Ok(arg_type) if arg_type.is_allowed_source_for(param.param_type) => {}
                Ok(arg_type) => violations.push(format!(
                    "argument {i} to filter `{key}` has type {arg_type}, not convertible to {}.",
                    param.param_type
                )),
                Err(e) => violations.push(format!("argument {i} to filter `{key}` failed to type-check: {e}")),
            }
        }

        if !violations.is_empty() {
            return Err(Error::RuleCreation { detail: violations });
        }

        self.filters_mut().push(FilterStep {
            key: key.to_owned(),
            args,
        });
        Ok(())
    }

    /// Enumerate filters that could extend this pipeline from its current
    /// type.
    pub fn fetch_addable_filters<'a>(&self, registry: &'a Registry) -> Result<Vec<&'a FilterInfo>> {
        let current = self.get_type(registry)?;
        Ok(registry.fetch_addable_filters(current))
    }

    /// Change the declared type of an as-yet-unfiltered source. Rejected
    /// once filters are attached, to prevent silent reinterpretation of an
    /// already-typed pipeline.
    pub fn set_declared_type(&mut self, declared_type: Type) -> Result<()> {
        if !self.filters().is_empty() {
            return Err(Error::Api(
                "cannot change the declared type after filters have been attached.".into(),
            ));
        }
        match self {
            ValueSource::Constant { declared_type: dt, value, .. } => {
                let reparsed = declared_type.parse(&value.to_json())?;
                *dt = declared_type;
                *value = reparsed;
            }
            ValueSource::Attribute { declared_type: dt, .. } => {
                *dt = declared_type;
            }
        }
        Ok(())
    }

    /// Statically validate this source against `env`: every filter
    /// argument must validate, and `Attribute` sources additionally
    /// require a matching declared `Input` path.
    pub fn validate(&self, env: &Environment) -> bool {
        let filters_ok = self
            .filters()
            .iter()
            .all(|step| step.args.iter().all(|arg| arg.validate(env)));
        if !filters_ok {
            return false;
        }
        match self {
            ValueSource::Constant { .. } => true,
            ValueSource::Attribute { path: p, .. } => {
                !env.query(Some(JsonAttributeType::Input), Some(p)).is_empty()
            }
        }
    }
}

fn filter_info<'a>(registry: &'a Registry, key: &str) -> Result<&'a FilterInfo> {
    registry
        .filter(key)
        .ok_or_else(|| Error::Api(format!("unknown filter `{key}`.").into()))
}

fn matching_pair_or_fail(info: &FilterInfo, current: Type) -> Result<(Type, Type)> {
    info.matching_pair(current).ok_or_else(|| {
        error!("no convenient propagation for filter `{}` from {current}.", info.key);
        Error::Runner(
            format!(
                "no convenient propagation for filter `{}` from {current}.",
                info.key
            )
            .into(),
        )
    })
}

fn auto_detect(raw: &Json) -> Result<(Type, Value)> {
    for ty in AUTO_DETECT_ORDER {
        if let Ok(value) = ty.parse(raw) {
            return Ok((*ty, value));
        }
    }
    Err(Error::Parse(
        "no type in the lattice could parse this constant value.".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde_json::json;

    #[test]
    fn test_constant_auto_detect_numeric() {
        let source = ValueSource::constant(&json!(42), None).unwrap();
        let registry = Registry::with_builtins();
        assert_eq!(source.get_type(&registry).unwrap(), Type::Numeric);
    }

    #[test]
    fn test_constant_auto_detect_falls_back_to_string() {
        let source = ValueSource::constant(&json!("hello"), None).unwrap();
        let registry = Registry::with_builtins();
        assert_eq!(source.get_type(&registry).unwrap(), Type::String);
    }

    #[test]
    fn test_attribute_get_value() {
        let registry = Registry::with_builtins();
        let source = ValueSource::attribute("a.$val", Type::String);
        let row = json!({"a": "5"});
        let value = source.get_value(&row, &registry).unwrap();
        assert_eq!(value, Value::Str("5".to_owned()));
    }

    #[test]
    fn test_add_filter_and_evaluate() {
        let registry = Registry::with_builtins();
        let mut source = ValueSource::attribute("a.$val", Type::Numeric);
        source.add_filter(&registry, "numeric_to_string", vec![]).unwrap();
        assert_eq!(source.get_type(&registry).unwrap(), Type::String);
        let row = json!({"a": 5});
        let value = source.get_value(&row, &registry).unwrap();
        assert_eq!(value, Value::Str("5.0".to_owned()));
    }

    #[test]
    fn test_set_declared_type_rejected_after_filter() {
        let registry = Registry::with_builtins();
        let mut source = ValueSource::attribute("a.$val", Type::Numeric);
        source.add_filter(&registry, "numeric_to_string", vec![]).unwrap();
        assert!(source.set_declared_type(Type::String).is_err());
    }

    #[test]
    fn test_add_filter_rejects_wrong_arity() {
        let registry = Registry::with_builtins();
        let mut source = ValueSource::attribute("a.$val", Type::Numeric);
        let bogus_arg = ValueSource::constant(&json!("x"), None).unwrap();
        assert!(
            source
                .add_filter(&registry, "numeric_to_string", vec![bogus_arg])
                .is_err()
        );
    }
}
