//! Flattener configuration and the documents loaded once at startup.
//!
//! [`FlattenerConfig`] carries the typed options; [`OutputTemplate`] and
//! [`NameOverrides`] hold the parsed template and mapping documents. Reading
//! the files is the host's job, these types only take the text.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Property holding the publisher application URI (fixed).
pub const APPLICATION_URI_PROPERTY: &str = "ApplicationUri";

/// Property holding the value envelope, and the payload inside it (fixed).
pub const VALUE_PROPERTY: &str = "Value";

/// Property holding the source timestamp inside the envelope (fixed).
pub const SOURCE_TIMESTAMP_PROPERTY: &str = "SourceTimestamp";

/// Default property holding the tag id.
pub const DEFAULT_NODE_ID_PROPERTY: &str = "NodeId";

/// Default property holding the display name.
pub const DEFAULT_DISPLAY_NAME_PROPERTY: &str = "DisplayName";

/// Default output key for the freshness stamp.
pub const DEFAULT_TIME_CREATED_PROPERTY: &str = "TimeCreated";

/// Root key of the mapping document.
pub const NODES_MAPPING_PROPERTY: &str = "NodesMapping";

/// Typed options for the flattening engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenerConfig {
    /// Log raw input and flattened output at info level (default: false).
    pub verbose: bool,

    /// Property name carrying the tag id.
    pub node_id_property: String,

    /// Property name carrying the display name.
    pub display_name_property: String,

    /// Stamp the output with the freshest source timestamp (default: true).
    pub add_time_created: bool,

    /// Output key for the freshness stamp.
    pub time_created_property: String,

    /// Prefix display names with the application URI (default: true).
    pub use_application_uri: bool,
}

impl Default for FlattenerConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            node_id_property: DEFAULT_NODE_ID_PROPERTY.to_string(),
            display_name_property: DEFAULT_DISPLAY_NAME_PROPERTY.to_string(),
            add_time_created: true,
            time_created_property: DEFAULT_TIME_CREATED_PROPERTY.to_string(),
            use_application_uri: true,
        }
    }
}

impl FlattenerConfig {
    /// Builder: toggle verbose diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builder: rename the tag id property.
    pub fn with_node_id_property(mut self, name: impl Into<String>) -> Self {
        self.node_id_property = name.into();
        self
    }

    /// Builder: rename the display name property.
    pub fn with_display_name_property(mut self, name: impl Into<String>) -> Self {
        self.display_name_property = name.into();
        self
    }

    /// Builder: toggle the freshness stamp.
    pub fn with_time_created(mut self, enabled: bool) -> Self {
        self.add_time_created = enabled;
        self
    }

    /// Builder: rename the freshness stamp key.
    pub fn with_time_created_property(mut self, name: impl Into<String>) -> Self {
        self.time_created_property = name.into();
        self
    }

    /// Builder: toggle the application URI prefix.
    pub fn with_application_uri(mut self, enabled: bool) -> Self {
        self.use_application_uri = enabled;
        self
    }

    /// Parse from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Base object every flattened output starts from.
///
/// Shared read-only; [`OutputTemplate::instantiate`] hands out a deep copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTemplate {
    fields: Map<String, Value>,
}

impl OutputTemplate {
    /// Wrap an already parsed object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Parse a template document. The root must be an object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(fields) => Ok(Self::new(fields)),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Fresh, independently owned copy of the template fields.
    pub fn instantiate(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the template has no keys.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Administrator supplied output keys, by tag id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameOverrides {
    names: HashMap<String, String>,
}

impl NameOverrides {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a mapping document:
    ///
    /// ```json
    /// { "NodesMapping": [ { "ns=2;s=T1": { "DisplayName": "Reactor1Temp" } } ] }
    /// ```
    ///
    /// Each element must be a single-key object. Mapping the same tag twice
    /// is rejected.
    pub fn from_mapping_json(json: &str) -> Result<Self, ConfigError> {
        let root = match serde_json::from_str::<Value>(json)? {
            Value::Object(root) => root,
            _ => return Err(ConfigError::NotAnObject),
        };

        let entries = root
            .get(NODES_MAPPING_PROPERTY)
            .and_then(Value::as_array)
            .ok_or(ConfigError::MissingNodesMapping)?;

        let mut names = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let (tag_id, body) = entry
                .as_object()
                .and_then(|obj| obj.iter().next())
                .ok_or_else(|| ConfigError::InvalidMappingEntry {
                    index,
                    reason: "expected a single-key object".to_string(),
                })?;

            let name = body
                .get(DEFAULT_DISPLAY_NAME_PROPERTY)
                .and_then(scalar_text)
                .ok_or_else(|| ConfigError::InvalidMappingEntry {
                    index,
                    reason: format!("'{}' has no DisplayName", tag_id),
                })?;

            if names.insert(tag_id.clone(), name).is_some() {
                return Err(ConfigError::DuplicateMapping {
                    tag_id: tag_id.clone(),
                });
            }
        }

        Ok(Self { names })
    }

    /// Register an override, replacing any previous one.
    pub fn insert(&mut self, tag_id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(tag_id.into(), name.into());
    }

    /// Override for a tag id, if any.
    pub fn get(&self, tag_id: &str) -> Option<&str> {
        self.names.get(tag_id).map(String::as_str)
    }

    /// Whether an override exists for a tag id.
    pub fn contains(&self, tag_id: &str) -> bool {
        self.names.contains_key(tag_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Text form of a scalar JSON value. Strings are taken verbatim, numbers and
/// booleans use their JSON spelling; null, arrays and objects yield `None`.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
