// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! A declarative rule engine for JSON row streams.
//!
//! A [`RuleProgram`] is a sequence of [`RuleExpression`]s, each pairing a
//! boolean condition tree (§4.5) with a list of output actions. Running a
//! program over a row evaluates each expression's condition against the
//! row as updated by prior expressions, applies its actions in order, then
//! fills in every [`Environment`] default mapping whose output path no
//! expression touched.
//!
//! ```rust
//! use movejson_rs::prelude::*;
//! use serde_json::json;
//!
//! # fn test() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new_shared();
//!
//! let mut env = Environment::new();
//! env.add_attribute(JsonAttribute::input("speed.$val", Type::Numeric, "Speed"));
//! env.add_attribute(JsonAttribute::output("flag", Type::Boolean, "Flag"));
//!
//! let mut condition = ContainerNode::new(Container::And);
//! condition.add_comparer(
//!     &registry,
//!     "equals",
//!     ValueSource::attribute("speed.$val", Type::Numeric),
//!     ValueSource::constant(&json!(88), None)?,
//!     None,
//!     vec![],
//! )?;
//!
//! let mut expression = RuleExpression::new(condition);
//! expression.add_action("flag", ValueSource::constant(&json!(true), None)?);
//!
//! let mut program = RuleProgram::new();
//! program.add_expression(expression);
//!
//! let row = program.run_on_row(&json!({"speed": 88}), &env, &registry)?;
//! assert_eq!(row["flag"], json!(true));
//! #    Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! * [`path`] — the dot-and-bracket path language rule programs use to
//!   read and write nested JSON.
//! * [`types`] — the closed semantic type lattice (`Boolean`, `Numeric`,
//!   `String`, `DateTime`, `Dict`, and their `*List` counterparts) and the
//!   directed implicit-conversion relation between its members.
//! * [`registry`] — the catalog of callable filters and comparers a rule
//!   program may reference by key.
//! * [`builtins`] — the filters and comparers registered by default.
//! * [`value_source`] — `Constant` and `Attribute` value pipelines.
//! * [`expr`] — the `AND`/`OR` condition tree.
//! * [`environment`] — the typed input/output schema a program is
//!   statically validated against.
//! * [`program`] — `RuleExpression` and `RuleProgram` themselves.
//! * [`json`] — tagged-envelope serialization for every artifact above.
//!
//! # Configuration
//!
//! `BUSINESS_RULE_DATETIME_FORMAT` (optionally set via a `.env` file) is a
//! `strftime`-style format string used to parse and format `DateTime`
//! values; see [`config`].
//!
//! # Concurrency
//!
//! A [`Registry`][registry::Registry] is built mutably, then frozen into a
//! [`SharedRegistry`][registry::SharedRegistry] (an `Rc`) shared read-only
//! by every artifact built against it. Nothing in this crate spawns
//! threads or takes locks; a program is run synchronously, row by row.
//!

mod builtins;
mod config;
mod environment;
mod error;
mod expr;
mod json;
mod path;
mod program;
mod registry;
mod types;
mod value_source;

pub use config::{Config, config};
pub use environment::{Environment, JsonAttribute, JsonAttributeType};
pub use error::{Error, Result};
pub use expr::{ComparerCall, Container, ContainerNode, Member};
pub use json::{
    Artifact, container_from_dict, container_to_dict, environment_from_dict, environment_to_dict,
    from_dict, json_attribute_from_dict, json_attribute_to_dict, rule_expression_from_dict,
    rule_expression_to_dict, rule_program_from_dict, rule_program_to_dict, value_source_from_dict,
    value_source_to_dict,
};
pub use program::{Action, RuleExpression, RuleProgram};
pub use registry::{ComparerInfo, FilterInfo, ParamDescriptor, Registry, SharedRegistry, ValueClass};
pub use types::{AUTO_DETECT_ORDER, IMPLICIT_CONVERSIONS, Type, Value, format_datetime};
pub use value_source::{FilterStep, ValueSource};

pub mod prelude;
