//! Transport-neutral message envelope.
//!
//! The flattener only rewrites the body; properties attached by the
//! transport are carried over to the outbound message untouched.

use std::collections::HashMap;

/// A message body plus its transport properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub body: Vec<u8>,
    pub properties: HashMap<String, String>,
}

impl Message {
    /// Message with a body and no properties.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            properties: HashMap::new(),
        }
    }

    /// Builder: add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Body decoded as UTF-8; invalid sequences are replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// New message with `body` and a copy of this message's properties.
    pub fn reply(&self, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            properties: self.properties.clone(),
        }
    }
}
