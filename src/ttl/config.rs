//! Engine Configuration
//!
//! The engine has exactly five knobs: three field names, the expiry policy and
//! the encoding used for `expires_at`. The store handle is passed separately
//! to [`TtlEngine::new`](crate::ttl::TtlEngine::new).
//!
//! ## Expiry Policies
//!
//! ```text
//! ExpiryPolicy::Lazy               ExpiryPolicy::Eager { interval }
//! ──────────────────               ────────────────────────────────
//! reads flip `active` to false     reads are untouched
//! one update per expired record    one bulk clear per tick
//! no background task               background sweeper task
//! ```
//!
//! The two are mutually exclusive.

use crate::record::{FieldValue, Record};
use crate::ttl::clock::{self, Moment};
use crate::ttl::error::{Result, TtlError};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use std::time::Duration;

/// Epoch seconds of the "never expires" sentinel, 9999-12-31T00:00:00Z.
pub const NEVER_EPOCH_SECONDS: i64 = 253_402_214_400;

/// Returns the far-future sentinel used as the `expires_at` default.
pub fn never_expires() -> Moment {
    DateTime::from_timestamp(NEVER_EPOCH_SECONDS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// How expired records are dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Deactivate expired records when they are read
    #[default]
    Lazy,
    /// Delete expired records from a background sweeper every `interval`
    Eager { interval: Duration },
}

impl ExpiryPolicy {
    /// Maps the classic `(auto_delete, interval_seconds)` pair onto a policy.
    ///
    /// Auto-delete with a zero interval would mean neither sweeping nor
    /// deactivating, so it is rejected.
    pub fn from_flags(auto_delete: bool, interval_secs: u64) -> Result<Self> {
        match (auto_delete, interval_secs) {
            (false, _) => Ok(ExpiryPolicy::Lazy),
            (true, 0) => Err(TtlError::InvalidConfig(
                "auto-delete requires a positive sweep interval".to_string(),
            )),
            (true, secs) => Ok(ExpiryPolicy::Eager {
                interval: Duration::from_secs(secs),
            }),
        }
    }

    /// Returns true for [`ExpiryPolicy::Lazy`].
    #[inline]
    pub fn is_lazy(&self) -> bool {
        matches!(self, ExpiryPolicy::Lazy)
    }
}

/// How `expires_at` is written to records and serialized into sweep filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpirationFormat {
    /// A UTC timestamp with microsecond resolution
    #[default]
    Timestamp,
    /// Whole seconds since the Unix epoch
    EpochSeconds,
}

impl ExpirationFormat {
    /// Truncates a moment to the resolution this format can carry.
    pub fn truncate(self, moment: Moment) -> Moment {
        match self {
            ExpirationFormat::Timestamp => clock::truncate(moment),
            ExpirationFormat::EpochSeconds => moment.trunc_subsecs(0),
        }
    }

    /// Encodes a moment as a field value.
    pub fn encode(self, moment: Moment) -> FieldValue {
        match self {
            ExpirationFormat::Timestamp => FieldValue::Timestamp(clock::truncate(moment)),
            ExpirationFormat::EpochSeconds => FieldValue::Int(moment.timestamp()),
        }
    }

    /// Serializes a moment as a literal for a filter expression.
    pub fn literal(self, moment: Moment) -> String {
        match self {
            ExpirationFormat::Timestamp => format!(
                "\"{}\"",
                clock::truncate(moment).to_rfc3339_opts(SecondsFormat::Micros, true)
            ),
            ExpirationFormat::EpochSeconds => moment.timestamp().to_string(),
        }
    }
}

/// Configuration for a [`TtlEngine`](crate::ttl::TtlEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlConfig {
    /// Field holding the TTL in seconds (default: `ttl`)
    pub ttl_field: String,

    /// Field holding the expiration moment (default: `expires_at`)
    pub expires_at_field: String,

    /// Field holding the active flag (default: `active`)
    pub active_field: String,

    /// Lazy deactivation or eager sweeping (default: lazy)
    pub policy: ExpiryPolicy,

    /// Encoding of `expires_at` (default: timestamp)
    pub format: ExpirationFormat,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            ttl_field: "ttl".to_string(),
            expires_at_field: "expires_at".to_string(),
            active_field: "active".to_string(),
            policy: ExpiryPolicy::Lazy,
            format: ExpirationFormat::Timestamp,
        }
    }
}

impl TtlConfig {
    /// Creates a lazy, timestamp-encoded configuration with custom field names.
    pub fn new(
        ttl_field: impl Into<String>,
        expires_at_field: impl Into<String>,
        active_field: impl Into<String>,
    ) -> Self {
        Self {
            ttl_field: ttl_field.into(),
            expires_at_field: expires_at_field.into(),
            active_field: active_field.into(),
            ..Default::default()
        }
    }

    /// Sets the expiry policy.
    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enables eager sweeping every `interval`.
    pub fn with_sweep_interval(self, interval: Duration) -> Self {
        self.with_policy(ExpiryPolicy::Eager { interval })
    }

    /// Sets the `expires_at` encoding.
    pub fn with_format(mut self, format: ExpirationFormat) -> Self {
        self.format = format;
        self
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("ttl", &self.ttl_field),
            ("expiration", &self.expires_at_field),
            ("active", &self.active_field),
        ];

        for (role, name) in names {
            if name.trim().is_empty() {
                return Err(TtlError::InvalidConfig(format!("{} field name is empty", role)));
            }
        }

        if self.ttl_field == self.expires_at_field
            || self.ttl_field == self.active_field
            || self.expires_at_field == self.active_field
        {
            return Err(TtlError::InvalidConfig(
                "ttl, expiration and active fields must be distinct".to_string(),
            ));
        }

        if let ExpiryPolicy::Eager { interval } = self.policy {
            if interval.is_zero() {
                return Err(TtlError::InvalidConfig(
                    "sweep interval must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Fills absent fields with their schema defaults.
    ///
    /// `ttl` defaults to 0 (never expires), `expires_at` to the far-future
    /// sentinel and `active` to true. Present fields are left untouched.
    pub fn apply_defaults(&self, record: &mut Record) {
        if !record.contains(&self.ttl_field) {
            record.set(self.ttl_field.as_str(), 0i64);
        }
        if !record.contains(&self.expires_at_field) {
            record.set(self.expires_at_field.as_str(), self.format.encode(never_expires()));
        }
        if !record.contains(&self.active_field) {
            record.set(self.active_field.as_str(), true);
        }
    }
}
