// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The closed semantic type lattice, the implicit-conversion relation
//! between its members, and the canonical parsers that turn an arbitrary
//! JSON value into a lattice-tagged runtime [`Value`].
//!

use crate::config::config;
use crate::error::{Error, Result};
use core::fmt;
use jiff::{Timestamp, Zoned, fmt::strtime, tz::TimeZone};
use serde_json::{Map, Value as Json};

/// A semantic type in the closed lattice this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// A true/false value.
    Boolean,
    /// A decimal number.
    Numeric,
    /// A Unicode string.
    String,
    /// An instant in time, always carried in UTC.
    DateTime,
    /// A JSON object.
    Dict,
    /// A homogeneous list of [`Type::Boolean`].
    BooleanList,
    /// A homogeneous list of [`Type::Numeric`].
    NumericList,
    /// A homogeneous list of [`Type::String`].
    StringList,
    /// A homogeneous list of [`Type::DateTime`].
    DateTimeList,
    /// A homogeneous list of [`Type::Dict`].
    DictList,
}

/// All types in the closed lattice, in the order the auto-detect parser
/// tries them against an undeclared [`Constant`][crate::value_source::ValueSource::Constant].
pub const AUTO_DETECT_ORDER: &[Type] = &[
    Type::BooleanList,
    Type::NumericList,
    Type::DateTimeList,
    Type::DictList,
    Type::StringList,
    Type::Boolean,
    Type::Numeric,
    Type::DateTime,
    Type::Dict,
    Type::String,
];

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Boolean => "Boolean",
            Type::Numeric => "Numeric",
            Type::String => "String",
            Type::DateTime => "DateTime",
            Type::Dict => "Dict",
            Type::BooleanList => "BooleanList",
            Type::NumericList => "NumericList",
            Type::StringList => "StringList",
            Type::DateTimeList => "DateTimeList",
            Type::DictList => "DictList",
        };
        write!(f, "{s}")
    }
}

impl Type {
    /// Parse a type name as used in registry metadata and serialized
    /// payloads. Unknown names are an API-contract violation.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "Boolean" => Type::Boolean,
            "Numeric" => Type::Numeric,
            "String" => Type::String,
            "DateTime" => Type::DateTime,
            "Dict" => Type::Dict,
            "BooleanList" => Type::BooleanList,
            "NumericList" => Type::NumericList,
            "StringList" => Type::StringList,
            "DateTimeList" => Type::DateTimeList,
            "DictList" => Type::DictList,
            other => return Err(Error::Api(format!("{other} is not a known type.").into())),
        })
    }

    /// The set of types from which this type may be reached via the
    /// implicit-conversion relation, including the type itself.
    pub fn allowed_sources(self) -> Vec<Type> {
        let mut sources = vec![self];
        for (from, to) in IMPLICIT_CONVERSIONS {
            if *to == self {
                sources.push(*from);
            }
        }
        sources
    }

    /// Whether `self` is an allowed source for `target` under the
    /// implicit-conversion relation.
    pub fn is_allowed_source_for(self, target: Type) -> bool {
        target.allowed_sources().contains(&self)
    }

    /// Parse a raw JSON value into this type's runtime representation.
    pub fn parse(self, value: &Json) -> Result<Value> {
        match self {
            Type::Boolean => parse_boolean(value),
            Type::Numeric => parse_numeric(value),
            Type::String => parse_string(value),
            Type::DateTime => parse_datetime(value),
            Type::Dict => parse_dict(value),
            Type::BooleanList => parse_list(value, Type::Boolean),
            Type::NumericList => parse_list(value, Type::Numeric),
            Type::StringList => parse_list(value, Type::String),
            Type::DateTimeList => parse_list(value, Type::DateTime),
            Type::DictList => parse_list(value, Type::Dict),
        }
    }

    /// Implicitly convert `value` (already parsed as `from`) to this type,
    /// failing unless `from` is an allowed source for `self`. Conversions
    /// into `String`/`StringList` go through [`Value::to_string_value`]
    /// rather than round-tripping through [`Value::to_json`], since a
    /// `DateTime`'s JSON carrier (an epoch number) has already lost the
    /// tag `parse_string` needs to format it instead of treating it as a
    /// plain number.
    pub fn implicit_parse(self, value: &Value, from: Type) -> Result<Value> {
        if !from.is_allowed_source_for(self) {
            return Err(Error::Runner(
                format!("{from} cannot be implicitly converted to {self}.").into(),
            ));
        }
        match self {
            Type::String | Type::StringList => value.to_string_value(),
            _ => self.parse(&value.to_json()),
        }
    }
}

/// Directed implicit-conversion relation. Nothing here is transitive.
pub const IMPLICIT_CONVERSIONS: &[(Type, Type)] = &[
    (Type::Boolean, Type::String),
    (Type::Numeric, Type::String),
    (Type::DateTime, Type::String),
    (Type::BooleanList, Type::StringList),
    (Type::NumericList, Type::StringList),
    (Type::DateTimeList, Type::StringList),
];

/// A runtime value tagged by a member of the [`Type`] lattice. Distinct from
/// the raw JSON carrier ([`serde_json::Value`]) used by the path engine:
/// `Numeric` and `DateTime` share the same JSON carrier (a number), so the
/// lattice tag must be tracked alongside the value, not derived from it.
#[derive(Debug, Clone)]
pub enum Value {
    /// The JSON `null` value, valid under every type.
    Null,
    /// A `Boolean` value.
    Bool(bool),
    /// A `Numeric` value.
    Num(f64),
    /// A `String` value.
    Str(String),
    /// A `DateTime` value, always UTC.
    DateTime(Zoned),
    /// A `Dict` value.
    Dict(Map<String, Json>),
    /// Any of the `*List` types; element type is determined by context.
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::DateTime(z) => write!(f, "{z}"),
            Value::Dict(_) => write!(f, "<dict>"),
            Value::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Convert this lattice value back into a plain JSON value, the shape
    /// used both by the path engine and by the tagged-envelope serializer.
    /// `DateTime` values serialize as UTC epoch seconds, per §4.8.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Num(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::DateTime(z) => serde_json::Number::from_f64(z.timestamp().as_second() as f64)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Dict(m) => Json::Object(m.clone()),
            Value::List(xs) => Json::Array(xs.iter().map(Value::to_json).collect()),
        }
    }

    /// Extract the inner `bool`, failing if this is not a `Boolean`.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::Runner(format!("{other} is not a Boolean.").into())),
        }
    }

    /// Coerce this value to its `String`-typed lattice representation.
    /// `DateTime` is formatted via [`format_datetime`] rather than through
    /// its epoch-number JSON carrier, and lists are converted element-wise
    /// (covering the `DateTimeList -> StringList` conversion the same way).
    pub fn to_string_value(&self) -> Result<Value> {
        match self {
            Value::DateTime(z) => Ok(Value::Str(format_datetime(z)?)),
            Value::List(xs) => {
                let converted: Result<Vec<Value>> = xs.iter().map(Value::to_string_value).collect();
                Ok(Value::List(converted?))
            }
            other => parse_string(&other.to_json()),
        }
    }
}

/// Format an `f64` the way Python's `str(float)` does: a whole number still
/// carries a trailing `.0`, matching the numeric-through-decimal parser
/// contract every `Numeric -> String` conversion relies on.
fn format_numeric(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}

fn parse_boolean(value: &Json) -> Result<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        other => Err(Error::Parse(format!("{other} is not a Boolean value.").into())),
    }
}

fn parse_numeric(value: &Json) -> Result<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Number(n) => n
            .as_f64()
            .map(Value::Num)
            .ok_or_else(|| Error::Parse(format!("{n} cannot be represented as f64.").into())),
        Json::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Num)
            .map_err(|e| Error::Parse(format!("{s} is not numeric: {e}").into())),
        other => Err(Error::Parse(format!("{other} cannot become Numeric.").into())),
    }
}

fn parse_string(value: &Json) -> Result<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::String(s) => Ok(Value::Str(s.clone())),
        Json::Number(_) => {
            // integers are converted via Numeric first, per the type lattice's
            // String parser contract.
            let Value::Num(n) = parse_numeric(value)? else {
                unreachable!()
            };
            Ok(Value::Str(format_numeric(n)))
        }
        Json::Bool(b) => Ok(Value::Str(b.to_string())),
        other => Err(Error::Parse(format!("{other} cannot become String.").into())),
    }
}

fn parse_dict(value: &Json) -> Result<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Object(m) => Ok(Value::Dict(m.clone())),
        other => Err(Error::Parse(format!("{other} is not a Dict value.").into())),
    }
}

fn parse_datetime(value: &Json) -> Result<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Number(n) => {
            let secs = n
                .as_f64()
                .ok_or_else(|| Error::Parse("epoch value is not representable as f64.".into()))?;
            let ts = Timestamp::from_second(secs as i64)?;
            Ok(Value::DateTime(ts.to_zoned(TimeZone::UTC)))
        }
        Json::String(s) => {
            let format = config().datetime_format();
            let tm = strtime::parse(format, s)?;
            let z = tm.to_zoned()?.with_time_zone(TimeZone::UTC);
            Ok(Value::DateTime(z))
        }
        other => Err(Error::Parse(format!("{other} cannot become DateTime.").into())),
    }
}

/// Format a `DateTime` value using the configured format string, the
/// inverse of [`parse_datetime`]'s string branch.
pub fn format_datetime(z: &Zoned) -> Result<String> {
    let format = config().datetime_format();
    Ok(strtime::format(format, z)?)
}

fn parse_list(value: &Json, element_type: Type) -> Result<Value> {
    match value {
        Json::Array(items) => {
            let parsed: Result<Vec<Value>> = items.iter().map(|v| element_type.parse(v)).collect();
            Ok(Value::List(parsed?))
        }
        other => Err(Error::Parse(format!("{other} is not a list value.").into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_sources() {
        let sources = Type::String.allowed_sources();
        assert!(sources.contains(&Type::String));
        assert!(sources.contains(&Type::Boolean));
        assert!(sources.contains(&Type::Numeric));
        assert!(sources.contains(&Type::DateTime));
        assert!(!sources.contains(&Type::Dict));
    }

    #[test]
    fn test_numeric_from_string() {
        let v = Type::Numeric.parse(&Json::String("42.5".into())).unwrap();
        assert_eq!(v, Value::Num(42.5));
    }

    #[test]
    fn test_numeric_from_bool_fails() {
        assert!(Type::Numeric.parse(&Json::Bool(true)).is_err());
    }

    #[test]
    fn test_string_from_number() {
        let v = Type::String.parse(&Json::from(42)).unwrap();
        assert_eq!(v, Value::Str("42.0".to_owned()));
    }

    #[test]
    fn test_dict_list() {
        let json = serde_json::json!([{"a": 1}, {"b": 2}]);
        let v = Type::DictList.parse(&json).unwrap();
        match v {
            Value::List(xs) => assert_eq!(xs.len(), 2),
            _ => panic!("expected a list"),
        }
    }

    #[test]
    fn test_implicit_parse_rejects_unrelated_source() {
        assert!(
            Type::Dict
                .implicit_parse(&Value::Num(1.0), Type::Numeric)
                .is_err()
        );
    }

    #[test]
    fn test_implicit_parse_formats_datetime_as_string() {
        let value = parse_datetime(&Json::from(0)).unwrap();
        let Value::DateTime(z) = &value else {
            panic!("expected a DateTime")
        };
        let expected = Value::Str(format_datetime(z).unwrap());
        assert_eq!(Type::String.implicit_parse(&value, Type::DateTime).unwrap(), expected);
    }
}
