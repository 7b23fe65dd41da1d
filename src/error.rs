// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Errors raised from this library.
//!

use std::borrow::Cow;
use thiserror::Error;

/// Variants of error raised from this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be parsed into its declared semantic type.
    #[error("Parse error: {0}")]
    Parse(Cow<'static, str>),

    /// Structural failure while traversing a dot-notation path.
    #[error("Dot-notation error: {0}")]
    DotNotation(Cow<'static, str>),

    /// A bracket subscription was applied to a non-sequence, or was malformed.
    #[error("Subscription error: {0}")]
    Subscription(Cow<'static, str>),

    /// An invariant was violated while building a rule artifact. Carries one
    /// detail string per violation found, accumulated rather than
    /// short-circuited on the first problem.
    #[error("Rule creation error: {}", .detail.join("; "))]
    RuleCreation {
        /// Per-violation detail messages.
        detail: Vec<String>,
    },

    /// No implicit conversion could propagate a type through a filter chain
    /// at evaluation time.
    #[error("Runner error: {0}")]
    Runner(Cow<'static, str>),

    /// A registration-time contract was violated (unknown type, bad arity,
    /// duplicate collation, etc).
    #[error("API error: {0}")]
    Api(Cow<'static, str>),

    /// Reserved for environment validation failure surfaces.
    #[error("Validation error: {0}")]
    Validation(Cow<'static, str>),

    /// JSON encoding/decoding error at the serialization boundary.
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Date-time parsing/formatting (`jiff`) error.
    #[error("Date-time error: {0}")]
    Time(#[from] jiff::Error),
}

/// Convenience alias for `Result`s returned from this library.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Construct a [`Error::RuleCreation`] from a single detail message.
    pub fn rule_creation<S: Into<String>>(detail: S) -> Self {
        Error::RuleCreation {
            detail: vec![detail.into()],
        }
    }
}
