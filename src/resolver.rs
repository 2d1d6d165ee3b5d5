//! Output key resolution.
//!
//! The computed candidate is `"<ApplicationUri>;<DisplayName>"` (or just the
//! display name when the URI prefix is disabled). A registered override for
//! the reading's tag id always replaces the candidate, not only when the
//! candidate is empty. An empty candidate with no override is an error.

use crate::config::NameOverrides;
use crate::error::{FlattenError, Result};
use crate::reading::Reading;

/// Maps a reading to its output key.
#[derive(Debug, Clone, Copy)]
pub struct DisplayNameResolver<'a> {
    overrides: &'a NameOverrides,
    use_application_uri: bool,
}

impl<'a> DisplayNameResolver<'a> {
    pub fn new(overrides: &'a NameOverrides, use_application_uri: bool) -> Self {
        Self {
            overrides,
            use_application_uri,
        }
    }

    /// Name computed from the reading alone, before overrides.
    pub fn candidate(&self, reading: &Reading<'_>) -> Option<String> {
        if self.use_application_uri {
            Some(format!(
                "{};{}",
                reading.origin(),
                reading.display_name().unwrap_or_default()
            ))
        } else {
            reading.display_name().map(str::to_string)
        }
    }

    /// Output key for `reading`.
    pub fn resolve(&self, reading: &Reading<'_>) -> Result<String> {
        let tag_id = reading.tag_id();
        let candidate = self.candidate(reading);
        let candidate_empty = candidate.as_deref().map_or(true, str::is_empty);

        let name = if self.overrides.contains(tag_id) || candidate_empty {
            self.overrides
                .get(tag_id)
                .ok_or_else(|| FlattenError::MissingOverride {
                    tag_id: tag_id.to_string(),
                })?
                .to_string()
        } else {
            candidate.unwrap_or_default()
        };

        if name.is_empty() {
            return Err(FlattenError::IdentityResolution {
                tag_id: tag_id.to_string(),
            });
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlattenerConfig;
    use serde_json::{json, Value};

    fn reading_value(name: Option<&str>) -> Value {
        let mut value = json!({
            "ApplicationUri": "uri1",
            "NodeId": "n1",
            "Value": { "Value": 1 }
        });
        if let Some(name) = name {
            value["DisplayName"] = json!(name);
        }
        value
    }

    fn resolve(value: &Value, overrides: &NameOverrides, use_uri: bool) -> Result<String> {
        let reading = Reading::from_value(0, value, &FlattenerConfig::default()).unwrap();
        DisplayNameResolver::new(overrides, use_uri).resolve(&reading)
    }

    #[test]
    fn test_full_identity_candidate() {
        let value = reading_value(Some("Temp"));
        assert_eq!(
            resolve(&value, &NameOverrides::new(), true).unwrap(),
            "uri1;Temp"
        );
    }

    #[test]
    fn test_plain_candidate() {
        let value = reading_value(Some("Temp"));
        assert_eq!(resolve(&value, &NameOverrides::new(), false).unwrap(), "Temp");
    }

    #[test]
    fn test_missing_display_name_keeps_separator() {
        let value = reading_value(None);
        assert_eq!(resolve(&value, &NameOverrides::new(), true).unwrap(), "uri1;");
    }

    #[test]
    fn test_override_wins_over_usable_candidate() {
        let overrides: NameOverrides = [("n1", "Reactor1Temp")].into_iter().collect();
        let value = reading_value(Some("Temp"));

        assert_eq!(resolve(&value, &overrides, true).unwrap(), "Reactor1Temp");
        assert_eq!(resolve(&value, &overrides, false).unwrap(), "Reactor1Temp");
    }

    #[test]
    fn test_override_fills_empty_candidate() {
        let overrides: NameOverrides = [("n1", "Reactor1Temp")].into_iter().collect();
        let value = reading_value(Some(""));
        assert_eq!(resolve(&value, &overrides, false).unwrap(), "Reactor1Temp");
    }

    #[test]
    fn test_override_for_other_tag_is_ignored() {
        let overrides: NameOverrides = [("n2", "Other")].into_iter().collect();
        let value = reading_value(Some("Temp"));
        assert_eq!(resolve(&value, &overrides, false).unwrap(), "Temp");
    }

    #[test]
    fn test_empty_candidate_without_override() {
        let value = reading_value(None);
        let err = resolve(&value, &NameOverrides::new(), false).unwrap_err();
        assert!(matches!(err, FlattenError::MissingOverride { ref tag_id } if tag_id == "n1"));

        let value = reading_value(Some(""));
        assert!(matches!(
            resolve(&value, &NameOverrides::new(), false),
            Err(FlattenError::MissingOverride { .. })
        ));
    }

    #[test]
    fn test_empty_override_is_rejected() {
        let overrides: NameOverrides = [("n1", "")].into_iter().collect();
        let value = reading_value(Some("Temp"));
        assert!(matches!(
            resolve(&value, &overrides, true),
            Err(FlattenError::IdentityResolution { .. })
        ));
    }
}
