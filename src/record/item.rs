//! Records
//!
//! A [`Record`] is an identified bag of fields. The engine owns none of it:
//! it reads `ttl`, writes `expires_at` and `active`, and leaves every other
//! field alone.

use crate::record::value::FieldValue;
use crate::ttl::clock::Moment;
use crate::ttl::error::Result;
use std::collections::HashMap;

/// A stored record: an id plus a map of field name to value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// Identity used by the store to locate the record
    id: String,
    /// Field payload
    fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    /// Builder-style field setter.
    ///
    /// ```
    /// use ttlkeeper::Record;
    ///
    /// let record = Record::new("session:1").with("ttl", 60).with("user", "ariz");
    /// assert_eq!(record.integer("ttl").unwrap(), Some(60));
    /// ```
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns the record id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the raw value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Sets a field, returning the previous value.
    pub fn set(
        &mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.fields.insert(field.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Returns true if the field is present and not null.
    pub fn contains(&self, field: &str) -> bool {
        self.present(field).is_some()
    }

    /// Iterates over all fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reads an integer field. `Ok(None)` when absent or null.
    pub fn integer(&self, field: &str) -> Result<Option<i64>> {
        self.present(field).map(|v| v.as_i64(field)).transpose()
    }

    /// Reads a boolean field. `Ok(None)` when absent or null.
    pub fn boolean(&self, field: &str) -> Result<Option<bool>> {
        self.present(field).map(|v| v.as_bool(field)).transpose()
    }

    /// Reads a moment field (timestamp or epoch seconds). `Ok(None)` when absent or null.
    pub fn moment(&self, field: &str) -> Result<Option<Moment>> {
        self.present(field).map(|v| v.as_moment(field)).transpose()
    }

    #[inline]
    fn present(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).filter(|v| !v.is_null())
    }
}
