// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The environment: a schema of typed input/output paths a rule program is
//! statically validated against before it is run (§4.7).
//!

use crate::error::{Error, Result};
use crate::types::Type;

/// Whether a [`JsonAttribute`] describes a path a program may read from, or
/// one it may write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonAttributeType {
    /// Readable by `Attribute` value sources.
    Input,
    /// Writable by rule-expression actions and default mappings.
    Output,
}

/// One declared, typed path in an [`Environment`].
#[derive(Debug, Clone)]
pub struct JsonAttribute {
    /// The dot-notation path this attribute describes.
    pub dot_specifier: String,
    /// Whether this is an input or output path.
    pub attribute_type: JsonAttributeType,
    /// The semantic type values at this path carry.
    pub attribute_data_type: Type,
    /// Human-readable label.
    pub pretty_name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether an action may write to this path (always `false` for
    /// `Input` attributes; `Output` attributes may also be read-only, e.g.
    /// a computed key no rule may overwrite).
    pub read_only: bool,
    /// An optional bound on string length, informational only.
    pub max_length: Option<usize>,
}

impl JsonAttribute {
    /// An input attribute with no description, not read-only, and no
    /// length bound.
    pub fn input(dot_specifier: impl Into<String>, data_type: Type, pretty_name: impl Into<String>) -> Self {
        Self {
            dot_specifier: dot_specifier.into(),
            attribute_type: JsonAttributeType::Input,
            attribute_data_type: data_type,
            pretty_name: pretty_name.into(),
            description: String::new(),
            read_only: false,
            max_length: None,
        }
    }

    /// An output attribute with no description, not read-only, and no
    /// length bound.
    pub fn output(dot_specifier: impl Into<String>, data_type: Type, pretty_name: impl Into<String>) -> Self {
        Self {
            dot_specifier: dot_specifier.into(),
            attribute_type: JsonAttributeType::Output,
            attribute_data_type: data_type,
            pretty_name: pretty_name.into(),
            description: String::new(),
            read_only: false,
            max_length: None,
        }
    }
}

/// A schema of declared input/output paths, plus default mappings that
/// copy an input value to an output path whenever no rule expression
/// assigned that output.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    attributes: Vec<JsonAttribute>,
    default_mappings: Vec<(usize, usize)>,
}

impl Environment {
    /// An environment with no declared attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute, returning its index for later default-mapping
    /// registration.
    pub fn add_attribute(&mut self, attribute: JsonAttribute) -> usize {
        self.attributes.push(attribute);
        self.attributes.len() - 1
    }

    /// All declared attributes, in declaration order.
    pub fn attributes(&self) -> &[JsonAttribute] {
        &self.attributes
    }

    /// Attributes matching `attribute_type` and/or `dot_specifier`; either
    /// filter absent (`None`) acts as a wildcard.
    pub fn query(
        &self,
        attribute_type: Option<JsonAttributeType>,
        dot_specifier: Option<&str>,
    ) -> Vec<&JsonAttribute> {
        self.attributes
            .iter()
            .filter(|a| attribute_type.is_none_or(|t| a.attribute_type == t))
            .filter(|a| dot_specifier.is_none_or(|p| a.dot_specifier == p))
            .collect()
    }

    /// Register a default mapping by attribute index: whenever `output_idx`
    /// is not in a row's change set after all expressions have run, copy
    /// `input_idx`'s value there.
    pub fn add_default_mapping_with_index(&mut self, input_idx: usize, output_idx: usize) -> Result<()> {
        let input = self
            .attributes
            .get(input_idx)
            .ok_or_else(|| Error::Validation("default mapping input index out of range.".into()))?;
        let output = self
            .attributes
            .get(output_idx)
            .ok_or_else(|| Error::Validation("default mapping output index out of range.".into()))?;
        if input.attribute_type != JsonAttributeType::Input {
            return Err(Error::Validation(
                "default mapping's input attribute must be an Input attribute.".into(),
            ));
        }
        if output.attribute_type != JsonAttributeType::Output {
            return Err(Error::Validation(
                "default mapping's output attribute must be an Output attribute.".into(),
            ));
        }
        self.default_mappings.push((input_idx, output_idx));
        Ok(())
    }

    /// Register a default mapping by dot specifier, looking up the unique
    /// matching attribute on each side.
    pub fn add_default_mapping(&mut self, input_path: &str, output_path: &str) -> Result<()> {
        let input_idx = self
            .attributes
            .iter()
            .position(|a| a.attribute_type == JsonAttributeType::Input && a.dot_specifier == input_path)
            .ok_or_else(|| Error::Validation(format!("no Input attribute declared at `{input_path}`.").into()))?;
        let output_idx = self
            .attributes
            .iter()
            .position(|a| a.attribute_type == JsonAttributeType::Output && a.dot_specifier == output_path)
            .ok_or_else(|| Error::Validation(format!("no Output attribute declared at `{output_path}`.").into()))?;
        self.add_default_mapping_with_index(input_idx, output_idx)
    }

    /// All registered default mappings, as `(input, output)` attribute
    /// pairs.
    pub fn get_all_default_mappings(&self) -> Vec<(&JsonAttribute, &JsonAttribute)> {
        self.default_mappings
            .iter()
            .map(|&(i, o)| (&self.attributes[i], &self.attributes[o]))
            .collect()
    }

    /// All registered default mappings, as raw attribute indices. Used by
    /// the serialization layer, which encodes mappings as index pairs.
    pub fn default_mapping_indices(&self) -> &[(usize, usize)] {
        &self.default_mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_wildcard() {
        let mut env = Environment::new();
        env.add_attribute(JsonAttribute::input("a", Type::String, "A"));
        env.add_attribute(JsonAttribute::output("b", Type::Numeric, "B"));
        assert_eq!(env.query(None, None).len(), 2);
        assert_eq!(env.query(Some(JsonAttributeType::Input), None).len(), 1);
    }

    #[test]
    fn test_default_mapping_direction_validated() {
        let mut env = Environment::new();
        let a = env.add_attribute(JsonAttribute::input("a", Type::String, "A"));
        let b = env.add_attribute(JsonAttribute::input("b", Type::String, "B"));
        assert!(env.add_default_mapping_with_index(a, b).is_err());
    }

    #[test]
    fn test_default_mapping_by_path() {
        let mut env = Environment::new();
        env.add_attribute(JsonAttribute::input("a", Type::String, "A"));
        env.add_attribute(JsonAttribute::output("b", Type::Numeric, "B"));
        env.add_default_mapping("a", "b").unwrap();
        assert_eq!(env.get_all_default_mappings().len(), 1);
    }
}
