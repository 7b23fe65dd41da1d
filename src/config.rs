// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Configuration parameters affecting the behaviour of this library.
//!

use dotenvy::var;
use std::sync::OnceLock;

const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[allow(dead_code)]
#[derive(Debug)]
pub struct Config {
    datetime_format: String,
}

static CONFIG: OnceLock<Config> = OnceLock::new();
/// This library's configuration singleton.
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

impl Default for Config {
    fn default() -> Self {
        let datetime_format =
            var("BUSINESS_RULE_DATETIME_FORMAT").unwrap_or(DEFAULT_DATETIME_FORMAT.to_owned());
        Self { datetime_format }
    }
}

impl Config {
    /// Return the configured `strftime`-style format used to parse and
    /// format `DateTime` values.
    pub fn datetime_format(&self) -> &str {
        &self.datetime_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_default_format() {
        let format = config().datetime_format();
        assert_eq!(format, DEFAULT_DATETIME_FORMAT);
    }
}
