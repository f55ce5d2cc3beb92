//! Ledger records.
//!
//! A [`Record`] is one JSON object from a ledger file. Field order is kept as
//! encountered. A record that came straight off disk also remembers its exact
//! source text. Unmodified single-line records re-encode byte for byte; any
//! mutation drops that text and the record is re-encoded from its fields.

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use thiserror::Error;

/// Ordered field map backing a record.
pub type Fields = Map<String, Value>;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Fields,
    /// Exact source text; `None` once the record is mutated.
    source: Option<Box<RawValue>>,
    /// Source fits on one line and can be written back as-is.
    verbatim: bool,
}

impl Record {
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            source: None,
            verbatim: false,
        }
    }

    /// Build a record from a decoded raw JSON value.
    ///
    /// The raw text is always kept (it still carries repeated keys the
    /// parsed map has collapsed) but is only re-emitted verbatim when it fits
    /// on a single line; multi-line sources are re-encoded compactly.
    pub fn from_raw(raw: Box<RawValue>) -> Result<Self, RecordError> {
        match serde_json::from_str::<Value>(raw.get())? {
            Value::Object(fields) => {
                let verbatim = !raw.get().contains(['\n', '\r']);
                Ok(Self {
                    fields,
                    source: Some(raw),
                    verbatim,
                })
            }
            other => Err(RecordError::NotAnObject {
                found: value_kind(&other),
            }),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, RecordError> {
        let raw: Box<RawValue> = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Mutable access to the field map. Drops the cached source text.
    pub fn fields_mut(&mut self) -> &mut Fields {
        self.source = None;
        self.verbatim = false;
        &mut self.fields
    }

    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    #[must_use]
    pub fn source(&self) -> Option<&RawValue> {
        self.source.as_deref()
    }

    /// Unmodified since it was decoded.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.source.is_some()
    }

    /// Serializes as its exact source text.
    #[must_use]
    pub fn is_verbatim(&self) -> bool {
        self.verbatim && self.source.is_some()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Set a field. Existing keys keep their position; new keys go last.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields_mut().insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if !self.fields.contains_key(key) {
            return None;
        }
        self.fields_mut().shift_remove(key)
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Fields> for Record {
    fn from(fields: Fields) -> Self {
        Self::new(fields)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.source {
            Some(raw) if self.verbatim => raw.serialize(serializer),
            _ => self.fields.serialize(serializer),
        }
    }
}

#[must_use]
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
