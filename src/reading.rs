//! Borrowed view of one publisher reading.
//!
//! A reading looks like:
//!
//! ```json
//! {
//!   "ApplicationUri": "urn:plc1",
//!   "NodeId": "ns=2;s=T1",
//!   "DisplayName": "Temp",
//!   "Value": { "Value": 21.5, "SourceTimestamp": "2024-01-01T00:00:00Z" }
//! }
//! ```
//!
//! The tag id and display name property names come from
//! [`FlattenerConfig`]; the rest are fixed.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::config::{
    scalar_text, FlattenerConfig, APPLICATION_URI_PROPERTY, SOURCE_TIMESTAMP_PROPERTY,
    VALUE_PROPERTY,
};
use crate::error::{FlattenError, Result};
use crate::identity::IdentityKey;

/// One reading, validated for identity fields. Owned by the input document.
#[derive(Debug, Clone)]
pub struct Reading<'a> {
    index: usize,
    key: IdentityKey,
    display_name: Option<String>,
    raw: &'a Map<String, Value>,
}

impl<'a> Reading<'a> {
    /// Wrap element `index` of a message.
    ///
    /// Fails with [`FlattenError::MalformedReading`] when the element is not
    /// an object, or lacks the application URI or tag id.
    pub fn from_value(index: usize, value: &'a Value, config: &FlattenerConfig) -> Result<Self> {
        let raw = value
            .as_object()
            .ok_or_else(|| FlattenError::MalformedReading {
                index,
                field: "<object>".to_string(),
            })?;

        let field = |name: &str| -> Result<String> {
            raw.get(name)
                .and_then(scalar_text)
                .ok_or_else(|| FlattenError::MalformedReading {
                    index,
                    field: name.to_string(),
                })
        };

        let origin = field(APPLICATION_URI_PROPERTY)?;
        let tag_id = field(config.node_id_property.as_str())?;
        let display_name = raw.get(&config.display_name_property).and_then(scalar_text);

        Ok(Self {
            index,
            key: IdentityKey::new(origin, tag_id),
            display_name,
            raw,
        })
    }

    /// Position in the inbound message.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    pub fn origin(&self) -> &str {
        self.key.origin()
    }

    pub fn tag_id(&self) -> &str {
        self.key.tag_id()
    }

    /// Raw display name, if the reading carries a scalar one.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// The value envelope, if present and an object.
    pub fn envelope(&self) -> Option<&'a Map<String, Value>> {
        self.raw.get(VALUE_PROPERTY).and_then(Value::as_object)
    }

    /// Payload inside the envelope (one level unwrapped).
    ///
    /// Fails with [`FlattenError::MalformedValue`] when the envelope or its
    /// nested value is missing. A JSON `null` payload is a valid payload.
    pub fn payload(&self) -> Result<&'a Value> {
        self.envelope()
            .and_then(|env| env.get(VALUE_PROPERTY))
            .ok_or_else(|| FlattenError::MalformedValue {
                tag_id: self.tag_id().to_string(),
            })
    }

    /// Source timestamp, or `None` when absent or unparseable.
    pub fn source_timestamp(&self) -> Option<DateTime<Utc>> {
        self.envelope()
            .and_then(|env| env.get(SOURCE_TIMESTAMP_PROPERTY))
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }
}

/// Parse an ISO-8601 timestamp. RFC 3339 is tried first; a date-time without
/// offset is taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
