// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The reference set of filters and comparers shipped with this crate's
//! default [`Registry`]. Registered through the same public entry points
//! external providers use (§4.9) — nothing here is wired in specially.
//!

use crate::error::{Error, Result};
use crate::path;
use crate::registry::{ParamDescriptor, Registry, ValueClass};
use crate::types::{Type, Value};
use jiff::{Timestamp, tz::TimeZone};
use serde_json::Value as Json;
use std::rc::Rc;
use unicase::UniCase;

/// Populate `registry` with every built-in filter and comparer.
pub fn register_builtins(registry: &mut Registry) -> Result<()> {
    register_comparers(registry)?;
    register_filters(registry)?;
    Ok(())
}

fn register_comparers(registry: &mut Registry) -> Result<()> {
    registry.register_comparer(
        "Equals",
        "Compares two values of the same type for equality. Null never equals.",
        None,
        "equals",
        vec![
            (Type::Boolean, Type::Boolean),
            (Type::String, Type::String),
            (Type::Numeric, Type::Numeric),
            (Type::DateTime, Type::DateTime),
        ],
        vec![],
        vec![ValueClass::Constant, ValueClass::Attribute],
        true,
        Rc::new(|args| {
            let (left, right) = (&args[0], &args[1]);
            if matches!(left, Value::Null) || matches!(right, Value::Null) {
                return Ok(false);
            }
            Ok(left == right)
        }),
    )?;

    registry.register_comparer(
        "Includes",
        "Tests whether a list contains a scalar value.",
        None,
        "includes",
        vec![
            (Type::StringList, Type::String),
            (Type::NumericList, Type::Numeric),
            (Type::DateTimeList, Type::DateTime),
        ],
        vec![],
        vec![ValueClass::Constant, ValueClass::Attribute],
        true,
        Rc::new(|args| {
            let (left, right) = (&args[0], &args[1]);
            if matches!(right, Value::Null) {
                return Ok(false);
            }
            let items = as_list(left)?;
            Ok(items.iter().any(|item| item == right))
        }),
    )?;

    registry.register_comparer(
        "StringIncludesIgnoreCase",
        "Case-insensitive substring containment of the right value inside the left value.",
        None,
        "string_includes_ignorecase",
        vec![(Type::String, Type::String)],
        vec![],
        vec![ValueClass::Constant, ValueClass::Attribute],
        true,
        Rc::new(|args| {
            let (left, right) = (&args[0], &args[1]);
            if matches!(left, Value::Null) || matches!(right, Value::Null) {
                return Ok(false);
            }
            let left = as_str(left)?;
            let right = as_str(right)?;
            Ok(left.to_lowercase().contains(&right.to_lowercase()))
        }),
    )?;

    Ok(())
}

fn register_filters(registry: &mut Registry) -> Result<()> {
    registry.register_filter(
        "StringToNumeric",
        "Parses a string as a number.",
        None,
        "string_to_numeric",
        vec![(Type::String, Type::Numeric)],
        vec![],
        true,
        Rc::new(|args| {
            let s = as_str(&args[0])?;
            Type::Numeric.parse(&Json::String(s.to_owned()))
        }),
    )?;

    registry.register_filter(
        "NumericToString",
        "Formats a number as a string.",
        None,
        "numeric_to_string",
        vec![(Type::Numeric, Type::String)],
        vec![],
        true,
        Rc::new(|args| args[0].to_string_value()),
    )?;

    registry.register_filter(
        "UnixEpochToDatetime",
        "Interprets a number as UTC Unix seconds.",
        None,
        "unixepoch_to_datetime",
        vec![(Type::Numeric, Type::DateTime)],
        vec![],
        true,
        Rc::new(|args| {
            let n = as_num(&args[0])?;
            let ts = Timestamp::from_second(n as i64)?;
            Ok(Value::DateTime(ts.to_zoned(TimeZone::UTC)))
        }),
    )?;

    let dot_specifier_param = |pretty_name: &str| ParamDescriptor {
        pretty_name: pretty_name.to_owned(),
        description: "dot-notation path to a sub-value within each entry.".to_owned(),
        param_type: Type::String,
        value_classes: vec![ValueClass::Constant, ValueClass::Attribute],
    };
    let needle_param = || ParamDescriptor {
        pretty_name: "needle".to_owned(),
        description: "value to search for.".to_owned(),
        param_type: Type::String,
        value_classes: vec![ValueClass::Constant, ValueClass::Attribute],
    };

    registry.register_filter(
        "FilterBySubvalueInclude",
        "Selects the first dict entry whose dot-specified sub-value case-insensitively contains the needle.",
        None,
        "filter_by_subvalue_include",
        vec![(Type::DictList, Type::Dict)],
        vec![dot_specifier_param("dot_specifier"), needle_param()],
        true,
        Rc::new(|args| {
            let entries = as_list(&args[0])?;
            let dot_specifier = as_str(&args[1])?;
            let needle = as_str(&args[2])?.to_lowercase();
            for entry in entries {
                let sub = extract_sub_value(entry, dot_specifier)?;
                if sub.to_string_lossy().to_lowercase().contains(&needle) {
                    return Ok(entry.clone());
                }
            }
            Ok(Value::Null)
        }),
    )?;

    registry.register_filter(
        "MultipleFilterBySubvalueInclude",
        "Selects every dict entry whose dot-specified sub-value case-insensitively contains the needle.",
        None,
        "multiple_filter_by_subvalue_include",
        vec![(Type::DictList, Type::DictList)],
        vec![dot_specifier_param("dot_specifier"), needle_param()],
        true,
        Rc::new(|args| {
            let entries = as_list(&args[0])?;
            let dot_specifier = as_str(&args[1])?;
            let needle = as_str(&args[2])?.to_lowercase();
            let mut matched = Vec::new();
            for entry in entries {
                let sub = extract_sub_value(entry, dot_specifier)?;
                if sub.to_string_lossy().to_lowercase().contains(&needle) {
                    matched.push(entry.clone());
                }
            }
            Ok(Value::List(matched))
        }),
    )?;

    registry.register_filter(
        "FilterBySubvalue",
        "Selects the first dict entry whose dot-specified sub-value case-insensitively equals the needle.",
        None,
        "filter_by_subvalue",
        vec![(Type::DictList, Type::Dict)],
        vec![dot_specifier_param("dot_specifier"), needle_param()],
        true,
        Rc::new(|args| {
            let entries = as_list(&args[0])?;
            let dot_specifier = as_str(&args[1])?;
            let needle = UniCase::new(as_str(&args[2])?);
            for entry in entries {
                let sub = extract_sub_value(entry, dot_specifier)?;
                if UniCase::new(sub.to_string_lossy()) == needle {
                    return Ok(entry.clone());
                }
            }
            Ok(Value::Null)
        }),
    )?;

    registry.register_filter(
        "MultipleFilterBySubvalue",
        "Selects every dict entry whose dot-specified sub-value case-insensitively equals the needle.",
        None,
        "multiple_filter_by_subvalue",
        vec![(Type::DictList, Type::DictList)],
        vec![dot_specifier_param("dot_specifier"), needle_param()],
        true,
        Rc::new(|args| {
            let entries = as_list(&args[0])?;
            let dot_specifier = as_str(&args[1])?;
            let needle = UniCase::new(as_str(&args[2])?);
            let mut matched = Vec::new();
            for entry in entries {
                let sub = extract_sub_value(entry, dot_specifier)?;
                if UniCase::new(sub.to_string_lossy()) == needle {
                    matched.push(entry.clone());
                }
            }
            Ok(Value::List(matched))
        }),
    )?;

    registry.register_filter(
        "ExtractWithDotSpecifierToString",
        "Extracts and parses a sub-value out of a single dict, as a String.",
        None,
        "extract_with_dot_specifier_to_string",
        vec![(Type::Dict, Type::String)],
        vec![dot_specifier_param("dot_specifier")],
        true,
        Rc::new(|args| {
            let dict = as_dict_json(&args[0])?;
            let dot_specifier = as_str(&args[1])?;
            let scalar = get_scalar(&dict, dot_specifier)?;
            Type::String.parse(&scalar)
        }),
    )?;

    registry.register_filter(
        "ExtractWithDotSpecifierToNumeric",
        "Extracts and parses a sub-value out of a single dict, as a Numeric.",
        None,
        "extract_with_dot_specifier_to_numeric",
        vec![(Type::Dict, Type::Numeric)],
        vec![dot_specifier_param("dot_specifier")],
        true,
        Rc::new(|args| {
            let dict = as_dict_json(&args[0])?;
            let dot_specifier = as_str(&args[1])?;
            let scalar = get_scalar(&dict, dot_specifier)?;
            Type::Numeric.parse(&scalar)
        }),
    )?;

    Ok(())
}

fn as_str(value: &Value) -> Result<&str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Error::Runner(format!("{other} is not a String.").into())),
    }
}

fn as_num(value: &Value) -> Result<f64> {
    match value {
        Value::Num(n) => Ok(*n),
        other => Err(Error::Runner(format!("{other} is not a Numeric.").into())),
    }
}

fn as_list(value: &Value) -> Result<&[Value]> {
    match value {
        Value::List(xs) => Ok(xs),
        other => Err(Error::Runner(format!("{other} is not a list.").into())),
    }
}

fn as_dict_json(value: &Value) -> Result<Json> {
    match value {
        Value::Dict(map) => Ok(Json::Object(map.clone())),
        other => Err(Error::Runner(format!("{other} is not a Dict.").into())),
    }
}

/// Extract a raw sub-value out of a `Dict` entry using a dot specifier,
/// without committing to a final lattice type yet.
fn extract_sub_value(entry: &Value, dot_specifier: &str) -> Result<Json> {
    let dict = as_dict_json(entry)?;
    get_scalar(&dict, dot_specifier)
}

/// Run the path engine and unwrap a single-leaf result, accepting both a
/// `.$val`-terminated specifier (already scalar) and a plain one (wrapped
/// in a one-element array).
fn get_scalar(obj: &Json, dot_specifier: &str) -> Result<Json> {
    let result = path::get(obj, dot_specifier)?;
    match result {
        Json::Array(mut items) if items.len() == 1 => Ok(items.remove(0)),
        Json::Array(items) => Err(Error::DotNotation(
            format!("`{dot_specifier}` resolved to {} values, expected one.", items.len()).into(),
        )),
        other => Ok(other),
    }
}

trait ToStringLossy {
    fn to_string_lossy(&self) -> String;
}

impl ToStringLossy for Json {
    fn to_string_lossy(&self) -> String {
        match self {
            Json::String(s) => s.clone(),
            Json::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equals_null_is_false() {
        let registry = Registry::with_builtins();
        let comparer = registry.comparer("equals").unwrap();
        assert!(!comparer.call(&[Value::Null, Value::Num(1.0)]).unwrap());
    }

    #[test]
    fn test_string_includes_ignorecase() {
        let registry = Registry::with_builtins();
        let comparer = registry.comparer("string_includes_ignorecase").unwrap();
        let got = comparer
            .call(&[Value::Str("14k Gold".into()), Value::Str("gold".into())])
            .unwrap();
        assert!(got);
    }

    #[test]
    fn test_filter_by_subvalue_include() {
        let registry = Registry::with_builtins();
        let filter = registry.filter("filter_by_subvalue_include").unwrap();
        let mut entry1 = serde_json::Map::new();
        entry1.insert("formatted_name".into(), json!("Primary color"));
        entry1.insert("formatted_value".into(), json!("14k Gold"));
        let mut entry2 = serde_json::Map::new();
        entry2.insert("formatted_name".into(), json!("Size"));
        entry2.insert("formatted_value".into(), json!("Large"));
        let entries = Value::List(vec![Value::Dict(entry1), Value::Dict(entry2)]);
        let got = filter
            .call(&[
                entries,
                Value::Str("formatted_name.$val".into()),
                Value::Str("Color".into()),
            ])
            .unwrap();
        match got {
            Value::Dict(m) => assert_eq!(m.get("formatted_value"), Some(&json!("14k Gold"))),
            _ => panic!("expected a dict"),
        }
    }

    #[test]
    fn test_unixepoch_to_datetime() {
        let registry = Registry::with_builtins();
        let filter = registry.filter("unixepoch_to_datetime").unwrap();
        let got = filter.call(&[Value::Num(0.0)]).unwrap();
        assert!(matches!(got, Value::DateTime(_)));
    }
}
