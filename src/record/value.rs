//! Field Values
//!
//! Records are loosely typed maps, so every field is stored as a [`FieldValue`].
//! The engine never inspects a value through an unchecked cast: each read goes
//! through a fallible accessor that reports the actual type on mismatch.
//!
//! ## Integer Normalization
//!
//! Callers hand us TTLs in whatever integer width they happen to have.
//! All of them are widened into one `i64`:
//!
//! ```text
//! i8 / i16 / i32 / i64 / isize ──> Int(i64) ──┐
//!                                             ├──> as_i64() ──> i64
//! u8 / u16 / u32 / u64 / usize ──> UInt(u64) ─┘        │
//!                                                      └── UInt > i64::MAX => OutOfRange
//! ```
//!
//! Overflow is rejected, never saturated.

use crate::ttl::clock::Moment;
use crate::ttl::error::{Result, TtlError};
use bytes::Bytes;
use chrono::DateTime;
use std::fmt;

/// A single value stored in a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit absence of a value
    Null,
    /// Boolean flag (the `active` field)
    Bool(bool),
    /// Signed integer, the widened form of every signed width
    Int(i64),
    /// Unsigned integer that may not fit into `i64`
    UInt(u64),
    /// Floating point number (never accepted as a TTL)
    Float(f64),
    /// UTF-8 text
    String(String),
    /// Opaque binary payload
    Bytes(Bytes),
    /// Absolute UTC moment
    Timestamp(Moment),
}

impl FieldValue {
    /// Returns a short name for the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::UInt(_) => "uint",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Timestamp(_) => "timestamp",
        }
    }

    /// Returns true for [`FieldValue::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Reads the value as a 64-bit signed integer.
    ///
    /// Every integer representation is accepted. Unsigned values above
    /// `i64::MAX` fail with [`TtlError::OutOfRange`]; any other type fails
    /// with [`TtlError::FieldType`].
    pub fn as_i64(&self, field: &str) -> Result<i64> {
        match *self {
            FieldValue::Int(v) => Ok(v),
            FieldValue::UInt(v) => i64::try_from(v).map_err(|_| TtlError::OutOfRange {
                field: field.to_string(),
                value: v.to_string(),
            }),
            _ => Err(self.type_error(field, "integer")),
        }
    }

    /// Reads the value as a boolean.
    pub fn as_bool(&self, field: &str) -> Result<bool> {
        match *self {
            FieldValue::Bool(v) => Ok(v),
            _ => Err(self.type_error(field, "bool")),
        }
    }

    /// Reads the value as an absolute moment.
    ///
    /// Both encodings of an expiration are understood: a timestamp, or an
    /// integer number of seconds since the Unix epoch.
    pub fn as_moment(&self, field: &str) -> Result<Moment> {
        match self {
            FieldValue::Timestamp(t) => Ok(*t),
            FieldValue::Int(_) | FieldValue::UInt(_) => {
                let secs = self.as_i64(field)?;
                DateTime::from_timestamp(secs, 0).ok_or_else(|| TtlError::OutOfRange {
                    field: field.to_string(),
                    value: secs.to_string(),
                })
            }
            _ => Err(self.type_error(field, "timestamp or epoch seconds")),
        }
    }

    fn type_error(&self, field: &str, expected: &'static str) -> TtlError {
        TtlError::FieldType {
            field: field.to_string(),
            expected,
            found: self.type_name(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::UInt(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{:?}", v),
            FieldValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            FieldValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Int(i64::from(v))
                }
            }
        )*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::UInt(u64::from(v))
                }
            }
        )*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<isize> for FieldValue {
    fn from(v: isize) -> Self {
        // isize is at most 64 bits on every supported target
        FieldValue::Int(v as i64)
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::UInt(v as u64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<Bytes> for FieldValue {
    fn from(v: Bytes) -> Self {
        FieldValue::Bytes(v)
    }
}

impl From<Moment> for FieldValue {
    fn from(v: Moment) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
