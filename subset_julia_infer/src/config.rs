//! Tunable inference thresholds and per-request options.
//!
//! The widening thresholds trade precision for speed. None of them are
//! load-bearing for soundness: any positive value yields a correct (if less
//! precise) analysis.
//!
//! Limits can be loaded from a TOML document:
//!
//! ```
//! use subset_julia_infer::config::InferenceLimits;
//!
//! let limits = InferenceLimits::from_toml_str("max_union_length = 2").unwrap();
//! assert_eq!(limits.max_union_length, 2);
//! assert_eq!(limits.max_type_depth, InferenceLimits::default().max_type_depth);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum number of leaves in a `Union2` chain.
pub const DEFAULT_MAX_UNION_LENGTH: usize = 4;

/// Default maximum nesting depth of type parameters after widening.
pub const DEFAULT_MAX_TYPE_DEPTH: usize = 4;

/// Default maximum tuple length kept precise.
pub const DEFAULT_MAX_TUPLE_LENGTH: usize = 32;

/// Default number of visits to one statement before its frame is limited.
pub const DEFAULT_MAX_STATEMENT_VISITS: u32 = 128;

/// Default number of rounds a cycle root may drive its members.
pub const DEFAULT_MAX_CYCLE_ITERATIONS: usize = 64;

/// Default maximum length of the synchronous call chain.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Error raised while reading inference configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid inference configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("limit `{0}` must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Widening and limiting thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceLimits {
    pub max_union_length: usize,
    pub max_type_depth: usize,
    pub max_tuple_length: usize,
    pub max_statement_visits: u32,
    pub max_cycle_iterations: usize,
    pub max_call_depth: usize,
}

impl Default for InferenceLimits {
    fn default() -> Self {
        Self {
            max_union_length: DEFAULT_MAX_UNION_LENGTH,
            max_type_depth: DEFAULT_MAX_TYPE_DEPTH,
            max_tuple_length: DEFAULT_MAX_TUPLE_LENGTH,
            max_statement_visits: DEFAULT_MAX_STATEMENT_VISITS,
            max_cycle_iterations: DEFAULT_MAX_CYCLE_ITERATIONS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl InferenceLimits {
    /// Parse limits from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let limits: InferenceLimits = toml::from_str(src)?;
        limits.validate()?;
        Ok(limits)
    }

    /// Reject thresholds that would make widening degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_union_length == 0 {
            return Err(ConfigError::ZeroLimit("max_union_length"));
        }
        if self.max_type_depth == 0 {
            return Err(ConfigError::ZeroLimit("max_type_depth"));
        }
        if self.max_statement_visits == 0 {
            return Err(ConfigError::ZeroLimit("max_statement_visits"));
        }
        if self.max_cycle_iterations == 0 {
            return Err(ConfigError::ZeroLimit("max_cycle_iterations"));
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::ZeroLimit("max_call_depth"));
        }
        Ok(())
    }
}

/// Options recognized by a single `infer` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Retain per-SSA detail and cost estimates for the optimizer.
    pub optimize: bool,
    /// Permit writing finished frames into the global cache.
    pub cached: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            optimize: false,
            cached: true,
        }
    }
}

impl InferenceConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }
}
