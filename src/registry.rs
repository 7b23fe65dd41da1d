// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The filter/comparer registry: the catalog of callable operations a rule
//! program may reference by key, plus the registration-time validation that
//! keeps the catalog internally consistent.
//!

use crate::error::{Error, Result};
use crate::types::{Type, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// Which [`crate::value_source::ValueSource`] variants may supply a given
/// parameter or operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    /// A literal, pre-parsed value.
    Constant,
    /// A value read from the current row.
    Attribute,
}

/// One parameter accepted by a registered filter or comparer, beyond the
/// implicit leading operand(s).
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    /// Human-readable label shown to authoring tools.
    pub pretty_name: String,
    /// Human-readable description shown to authoring tools.
    pub description: String,
    /// The semantic type this parameter's resolved value must carry.
    pub param_type: Type,
    /// The value-source variants allowed to supply this parameter.
    pub value_classes: Vec<ValueClass>,
}

/// A filter callable: takes the pipeline's current value followed by one
/// resolved value per declared parameter, and produces the filter's output
/// value.
pub type FilterFn = Rc<dyn Fn(&[Value]) -> Result<Value>>;

/// A comparer callable: takes the left and right operand followed by one
/// resolved value per declared parameter, and produces a boolean outcome.
pub type ComparerFn = Rc<dyn Fn(&[Value]) -> Result<bool>>;

/// Registration metadata and callable for one filter.
#[derive(Clone)]
pub struct FilterInfo {
    /// The key value sources reference this filter by.
    pub key: String,
    /// Human-readable label.
    pub pretty_name: String,
    /// Human-readable description.
    pub description: String,
    /// `(input, output)` pairs this filter supports, sorted so that
    /// `String`-rooted inputs sort last.
    pub manipulation_types: Vec<(Type, Type)>,
    /// Declared extra parameters, beyond the piped-in value.
    pub params: Vec<ParamDescriptor>,
    /// Whether this filter ships with the default registry.
    pub builtin: bool,
    method: FilterFn,
}

impl std::fmt::Debug for FilterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterInfo")
            .field("key", &self.key)
            .field("manipulation_types", &self.manipulation_types)
            .field("params", &self.params)
            .field("builtin", &self.builtin)
            .finish()
    }
}

impl FilterInfo {
    /// Invoke the underlying callable.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.method)(args)
    }

    /// The first `(in, out)` pair whose input type `current` may reach via
    /// implicit conversion, in declared (sorted) order.
    pub fn matching_pair(&self, current: Type) -> Option<(Type, Type)> {
        self.manipulation_types
            .iter()
            .copied()
            .find(|(in_type, _)| current.is_allowed_source_for(*in_type))
    }
}

/// Registration metadata and callable for one comparer.
#[derive(Clone)]
pub struct ComparerInfo {
    /// The key expression trees reference this comparer by.
    pub key: String,
    /// Human-readable label.
    pub pretty_name: String,
    /// Human-readable description.
    pub description: String,
    /// Unique `(left, right)` collation pairs this comparer supports.
    pub collation_types: Vec<(Type, Type)>,
    /// Declared extra parameters, beyond the two compared operands.
    pub params: Vec<ParamDescriptor>,
    /// The value-source variants allowed to supply the right-hand operand.
    pub value_classes: Vec<ValueClass>,
    /// Whether this comparer ships with the default registry.
    pub builtin: bool,
    method: ComparerFn,
}

impl std::fmt::Debug for ComparerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparerInfo")
            .field("key", &self.key)
            .field("collation_types", &self.collation_types)
            .field("params", &self.params)
            .field("builtin", &self.builtin)
            .finish()
    }
}

impl ComparerInfo {
    /// Invoke the underlying callable.
    pub fn call(&self, args: &[Value]) -> Result<bool> {
        (self.method)(args)
    }
}

/// The catalog of callable filters and comparers a rule program may
/// reference. Built mutably, then frozen into a [`SharedRegistry`] shared
/// read-only by every value source, container, and evaluator built against
/// it (§9, "Registry as a value").
#[derive(Debug, Default)]
pub struct Registry {
    filters: HashMap<String, FilterInfo>,
    comparers: HashMap<String, ComparerInfo>,
}

/// What every artifact built against a [`Registry`] holds a handle to.
pub type SharedRegistry = Rc<Registry>;

impl Registry {
    /// An empty registry, with no filters or comparers registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with this crate's built-in filters and
    /// comparers, for ergonomic default use.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_builtins(&mut registry)
            .expect("built-in registrations are statically valid");
        registry
    }

    /// Freeze this registry into a shareable, read-only handle.
    pub fn freeze(self) -> SharedRegistry {
        Rc::new(self)
    }

    /// Convenience: build a default, builtin-populated, frozen registry.
    pub fn new_shared() -> SharedRegistry {
        Self::with_builtins().freeze()
    }

    /// Register a filter. See §4.3 for the validation rules enforced here.
    #[allow(clippy::too_many_arguments)]
    pub fn register_filter(
        &mut self,
        pretty_name: &str,
        description: &str,
        key: Option<&str>,
        method_name: &str,
        mut manipulation_types: Vec<(Type, Type)>,
        params: Vec<ParamDescriptor>,
        builtin: bool,
        method: FilterFn,
    ) -> Result<()> {
        let mut violations = Vec::new();
        if manipulation_types.is_empty() {
            violations.push("manipulation_types must be nonempty.".to_owned());
        }
        let mut seen_inputs = std::collections::HashSet::new();
        for (input, _) in &manipulation_types {
            if !seen_inputs.insert(*input) {
                violations.push(format!("duplicate manipulation input type {input}."));
            }
        }
        for param in &params {
            if param.value_classes.is_empty() {
                violations.push(format!(
                    "parameter `{}` must declare at least one value class.",
                    param.pretty_name
                ));
            }
        }
        if !violations.is_empty() {
            return Err(Error::Api(violations.join("; ").into()));
        }

        // biases implicit conversion toward non-string-lossy paths.
        manipulation_types.sort_by_key(|(input, _)| {
            matches!(input, Type::String | Type::StringList)
        });

        let key = key
            .map(str::to_owned)
            .unwrap_or_else(|| default_filter_key(method_name, builtin));

        self.filters.insert(
            key.clone(),
            FilterInfo {
                key,
                pretty_name: pretty_name.to_owned(),
                description: description.to_owned(),
                manipulation_types,
                params,
                builtin,
                method,
            },
        );
        Ok(())
    }

    /// Register a comparer. See §4.3 for the validation rules enforced here.
    #[allow(clippy::too_many_arguments)]
    pub fn register_comparer(
        &mut self,
        pretty_name: &str,
        description: &str,
        key: Option<&str>,
        method_name: &str,
        collation_types: Vec<(Type, Type)>,
        params: Vec<ParamDescriptor>,
        value_classes: Vec<ValueClass>,
        builtin: bool,
        method: ComparerFn,
    ) -> Result<()> {
        let mut violations = Vec::new();
        if collation_types.is_empty() {
            violations.push("collation_types must be nonempty.".to_owned());
        }
        let mut seen = std::collections::HashSet::new();
        for pair in &collation_types {
            if !seen.insert(*pair) {
                violations.push(format!("duplicate collation pair {:?}.", pair));
            }
        }
        for param in &params {
            if param.value_classes.is_empty() {
                violations.push(format!(
                    "parameter `{}` must declare at least one value class.",
                    param.pretty_name
                ));
            }
        }
        if value_classes.is_empty() {
            violations.push("value_classes must be nonempty.".to_owned());
        }
        if !violations.is_empty() {
            return Err(Error::Api(violations.join("; ").into()));
        }

        let key = key
            .map(str::to_owned)
            .unwrap_or_else(|| default_comparer_key(method_name, builtin));

        self.comparers.insert(
            key.clone(),
            ComparerInfo {
                key,
                pretty_name: pretty_name.to_owned(),
                description: description.to_owned(),
                collation_types,
                params,
                value_classes,
                builtin,
                method,
            },
        );
        Ok(())
    }

    /// Look up a registered filter by key.
    pub fn filter(&self, key: &str) -> Option<&FilterInfo> {
        self.filters.get(key)
    }

    /// Look up a registered comparer by key.
    pub fn comparer(&self, key: &str) -> Option<&ComparerInfo> {
        self.comparers.get(key)
    }

    /// Every filter with at least one manipulation pair whose input type
    /// `current` can reach via implicit conversion.
    pub fn fetch_addable_filters(&self, current: Type) -> Vec<&FilterInfo> {
        self.filters
            .values()
            .filter(|info| info.matching_pair(current).is_some())
            .collect()
    }

    /// All registered filters.
    pub fn filters(&self) -> impl Iterator<Item = &FilterInfo> {
        self.filters.values()
    }

    /// All registered comparers.
    pub fn comparers(&self) -> impl Iterator<Item = &ComparerInfo> {
        self.comparers.values()
    }
}

fn default_filter_key(method_name: &str, builtin: bool) -> String {
    if builtin {
        method_name.to_owned()
    } else {
        format!("f_{method_name}")
    }
}

fn default_comparer_key(method_name: &str, builtin: bool) -> String {
    if builtin {
        method_name.to_owned()
    } else {
        format!("c_{method_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manipulation_types_sort_string_last() {
        let mut registry = Registry::new();
        registry
            .register_filter(
                "double",
                "doubles a number or numeric string",
                None,
                "double",
                vec![(Type::String, Type::Numeric), (Type::Numeric, Type::Numeric)],
                vec![],
                true,
                Rc::new(|args| Ok(args[0].clone())),
            )
            .unwrap();
        let info = registry.filter("double").unwrap();
        assert_eq!(info.manipulation_types[0].0, Type::Numeric);
        assert_eq!(info.manipulation_types[1].0, Type::String);
    }

    #[test]
    fn test_empty_manipulation_types_rejected() {
        let mut registry = Registry::new();
        let err = registry.register_filter(
            "noop",
            "does nothing",
            None,
            "noop",
            vec![],
            vec![],
            true,
            Rc::new(|args| Ok(args[0].clone())),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_default_builtin_key() {
        let mut registry = Registry::new();
        registry
            .register_comparer(
                "equals",
                "equality",
                None,
                "equals",
                vec![(Type::Numeric, Type::Numeric)],
                vec![],
                vec![ValueClass::Constant, ValueClass::Attribute],
                true,
                Rc::new(|args| Ok(args[0] == args[1])),
            )
            .unwrap();
        assert!(registry.comparer("equals").is_some());
    }

    #[test]
    fn test_fetch_addable_filters() {
        let registry = Registry::with_builtins();
        let addable = registry.fetch_addable_filters(Type::Numeric);
        assert!(addable.iter().any(|f| f.key == "numeric_to_string"));
    }
}
