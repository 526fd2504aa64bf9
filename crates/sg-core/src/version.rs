//! Strongly-typed migration version token.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version token identifying a migration.
///
/// Versions are positive integers and totally ordered; the catalog applies
/// migrations in ascending version order. Displayed as `v001`, `v042`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct MigrationVersion(i64);

impl MigrationVersion {
    /// Create a new version, panicking in debug builds if `value` is not positive.
    ///
    /// Prefer [`try_new`](Self::try_new) when handling untrusted input.
    pub const fn new(value: i64) -> Self {
        debug_assert!(value > 0, "MigrationVersion must be positive");
        Self(value)
    }

    /// Try to create a new version, returning `None` unless `value > 0`.
    pub fn try_new(value: i64) -> Option<Self> {
        if value > 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Return the raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:03}", self.0)
    }
}

impl FromStr for MigrationVersion {
    type Err = CoreError;

    /// Accepts `7`, `v7` and `v007`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        digits
            .parse::<i64>()
            .ok()
            .and_then(Self::try_new)
            .ok_or_else(|| CoreError::InvalidVersion {
                value: s.to_string(),
            })
    }
}

impl TryFrom<i64> for MigrationVersion {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::try_new(value).ok_or_else(|| CoreError::InvalidVersion {
            value: value.to_string(),
        })
    }
}

impl From<MigrationVersion> for i64 {
    fn from(version: MigrationVersion) -> Self {
        version.0
    }
}
