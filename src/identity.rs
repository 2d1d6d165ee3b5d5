//! Composite identity of a tag within one message.

use std::fmt;

/// `(application URI, tag id)` pair naming one tag's timeseries.
///
/// Equality and hashing are structural over both parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    origin: String,
    tag_id: String,
}

impl IdentityKey {
    pub fn new(origin: impl Into<String>, tag_id: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            tag_id: tag_id.into(),
        }
    }

    /// Publisher application URI.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Tag (node) id.
    pub fn tag_id(&self) -> &str {
        &self.tag_id
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.origin, self.tag_id)
    }
}
