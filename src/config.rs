//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid configuration:
//!
//! ```
//! # use protodyn::config::Config;
//! let config = Config::from_toml(r#"
//!     [limits]
//!     max_length = 4096
//!
//!     [compare]
//!     nan_equal = false
//! "#).unwrap();
//! assert_eq!(config.limits.max_length, 4096);
//! assert_eq!(config.limits.max_depth, 100);
//! assert!(!config.compare.nan_equal);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Default ceiling on any single declared length: 100 MiB.
pub const DEFAULT_MAX_LENGTH: usize = 100 * 1024 * 1024;
/// Default ceiling on message nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 100;

/// Bounds applied while decoding binary input or parsing text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Limits {
    /// The largest length a length-delimited field may declare. Checked as soon as the length
    /// prefix is read, before anything proportional to it is allocated.
    pub max_length: usize,
    /// The deepest allowed nesting of messages.
    pub max_depth: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Policy knobs for the equivalence checker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CompareOptions {
    /// Treat two NaN floats as equal to each other. All other float comparisons are bit-exact.
    pub nan_equal: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self { nan_equal: true }
    }
}

impl CompareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nan_equal(mut self, nan_equal: bool) -> Self {
        self.nan_equal = nan_equal;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub limits: Limits,
    pub compare: CompareOptions,
}

impl Config {
    pub fn from_toml(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|e| SchemaError::Toml(e.to_string()).into())
    }
}
