// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Group imports of the common traits and types by adding a glob import for
//! use by clients of this library.
//!

pub use super::environment::*;
pub use super::error::*;
pub use super::expr::*;
pub use super::json::*;
pub use super::program::*;
pub use super::registry::*;
pub use super::types::*;
pub use super::value_source::*;
