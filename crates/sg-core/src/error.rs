//! Error types for sg-core

use crate::version::MigrationVersion;
use thiserror::Error;

/// Core error type for schemagate
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Two catalog entries share a version
    #[error("[E004] Duplicate migration version {version} in catalog ('{first}' and '{second}')")]
    DuplicateVersion {
        version: MigrationVersion,
        first: String,
        second: String,
    },

    /// E005: Catalog entries are not in strictly increasing version order
    #[error("[E005] Migration {version} ('{name}') is out of order: it follows {previous}")]
    VersionOutOfOrder {
        version: MigrationVersion,
        name: String,
        previous: MigrationVersion,
    },

    /// E006: Catalog entry is malformed
    #[error("[E006] Invalid migration {version}: {reason}")]
    InvalidMigration {
        version: MigrationVersion,
        reason: String,
    },

    /// E007: Version token is not a positive integer
    #[error("[E007] Invalid migration version '{value}': versions are positive integers")]
    InvalidVersion { value: String },

    /// E008: IO error with file path context
    #[error("[E008] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E002: YAML parse error
    #[error("[E002] Failed to parse config: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
