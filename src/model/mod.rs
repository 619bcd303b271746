//! Location and selector model.
//!
//! Pure value types: descriptors, refinements, call selectors, conditions
//! and literals. Everything here is `Eq + Hash` so descriptors can be used
//! as grouping keys at weave time and as lookup keys at run time.

pub mod condition;
pub mod descriptor;
pub mod errors;
pub mod literal;
pub mod location;
pub mod selector;

pub use condition::{CompareOp, Condition};
pub use descriptor::{InjectionDescriptor, InjectionKind, PointKey};
pub use errors::ConfigError;
pub use literal::Literal;
pub use location::{AnchorSpec, LineSpec, Location, NearSpec, Occurrence, SliceSpec};
pub use selector::{
    ArgPattern, CallSelector, CallShape, KeywordMode, KeywordPattern, KeywordSource,
    PositionalMode, UnresolvedPolicy,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a `require` / `expect` match-count mismatch is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Policy {
    /// Both `require` and `expect` mismatches are fatal.
    Strict,
    /// `require` is fatal, `expect` warns.
    #[default]
    Error,
    /// Both warn.
    Warn,
    /// Both are silent.
    Ignore,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Strict => "STRICT",
            Policy::Error => "ERROR",
            Policy::Warn => "WARN",
            Policy::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STRICT" => Ok(Policy::Strict),
            "ERROR" => Ok(Policy::Error),
            "WARN" => Ok(Policy::Warn),
            "IGNORE" => Ok(Policy::Ignore),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_from_str() {
        assert_eq!("warn".parse::<Policy>().unwrap(), Policy::Warn);
        assert_eq!(
            "LOUD".parse::<Policy>().unwrap_err(),
            ConfigError::UnknownPolicy("LOUD".into())
        );
        assert_eq!(Policy::default(), Policy::Error);
    }
}
