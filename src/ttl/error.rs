//! Engine Errors

use thiserror::Error;

/// Errors surfaced synchronously by the engine.
///
/// Only correctness-critical failures end up here. Failures on the
/// maintenance paths (read-path corrections, sweeper ticks) are logged and
/// dropped instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TtlError {
    /// The TTL field could not be read as an integer
    #[error("TTL field `{field}` not found (found {found})")]
    MissingField { field: String, found: &'static str },

    /// A field holds a value of the wrong type
    #[error("field `{field}` has type {found}, expected {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A numeric value does not fit the target representation
    #[error("field `{field}` value {value} is out of range")]
    OutOfRange { field: String, value: String },

    /// `now + ttl` is not representable
    #[error("expiration overflow: ttl of {ttl}s cannot be added to the current time")]
    ExpirationOverflow { ttl: i64 },

    /// The engine configuration is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background sweeper was requested outside a Tokio runtime
    #[error("sweeper requires a running Tokio runtime")]
    NoRuntime,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, TtlError>;
