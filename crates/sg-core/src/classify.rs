//! Transient/fatal classification of store failures.
//!
//! Classification is an explicit allow-list: a failure is [`FailureClass::Transient`]
//! only when it matches an entry of [`TRANSIENT_SIGNATURES`]. Anything else,
//! including failures we have never seen before, is [`FailureClass::Fatal`].
//! Extending the table is a reviewed change; bump [`CLASSIFIER_TABLE_VERSION`]
//! whenever an entry is added or removed.

use serde::Serialize;
use std::fmt;
use std::io;

/// Revision of [`TRANSIENT_SIGNATURES`], logged with every classification decision.
pub const CLASSIFIER_TABLE_VERSION: u32 = 1;

/// Outcome of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Expected to resolve with time; the connection loop retries it.
    Transient,
    /// Retrying cannot help; reconciliation stops.
    Fatal,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Transient => write!(f, "transient"),
            FailureClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// Backend-neutral description of a store failure.
///
/// Backends fill in whatever they know: a SQLSTATE-style `code`, the
/// `io::ErrorKind` of an underlying socket error, and the message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub code: Option<String>,
    pub io_kind: Option<io::ErrorKind>,
    pub message: String,
}

impl StoreFailure {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            io_kind: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            io_kind: None,
            message: message.into(),
        }
    }

    pub fn from_io(err: &io::Error) -> Self {
        Self {
            code: None,
            io_kind: Some(err.kind()),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// A single allow-listed transient signature.
#[derive(Debug, Clone, Copy)]
pub enum TransientSignature {
    /// Exact SQLSTATE / backend error code.
    Code(&'static str),
    /// I/O error kind of the underlying connection.
    Io(io::ErrorKind),
    /// Case-sensitive substring of the backend error message.
    Message(&'static str),
}

impl TransientSignature {
    fn matches(&self, failure: &StoreFailure) -> bool {
        match self {
            TransientSignature::Code(code) => failure.code.as_deref() == Some(*code),
            TransientSignature::Io(kind) => failure.io_kind == Some(*kind),
            TransientSignature::Message(fragment) => failure.message.contains(fragment),
        }
    }
}

/// Failures that are retried while connecting.
pub static TRANSIENT_SIGNATURES: &[TransientSignature] = &[
    // SQLSTATE class 08: connection exception
    TransientSignature::Code("08000"),
    TransientSignature::Code("08001"),
    TransientSignature::Code("08003"),
    TransientSignature::Code("08004"),
    TransientSignature::Code("08006"),
    // admin_shutdown, crash_shutdown, cannot_connect_now (server starting up)
    TransientSignature::Code("57P01"),
    TransientSignature::Code("57P02"),
    TransientSignature::Code("57P03"),
    // too_many_connections
    TransientSignature::Code("53300"),
    TransientSignature::Io(io::ErrorKind::ConnectionRefused),
    TransientSignature::Io(io::ErrorKind::ConnectionReset),
    TransientSignature::Io(io::ErrorKind::ConnectionAborted),
    TransientSignature::Io(io::ErrorKind::NotConnected),
    TransientSignature::Io(io::ErrorKind::TimedOut),
    TransientSignature::Message("the database system is starting up"),
    // DuckDB: another process holds the database file
    TransientSignature::Message("Could not set lock on file"),
];

/// Classify a failure against [`TRANSIENT_SIGNATURES`].
pub fn classify(failure: &StoreFailure) -> FailureClass {
    if TRANSIENT_SIGNATURES.iter().any(|sig| sig.matches(failure)) {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
