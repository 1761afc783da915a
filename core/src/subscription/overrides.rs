//! Enable overrides - user toggles for groups and apps
//!
//! Overrides are stored separately from subscription documents so that:
//! - A refresh replacing the document never resets the user's choices
//! - Local edits and remote documents share one toggle mechanism

use std::path::Path;

use serde::{Deserialize, Serialize};
use taprule_types::{EnableOverride, GroupRaw};

use super::error::OverridesError;

/// Every override record, persisted as a TOML array of tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnableOverrides {
    #[serde(default)]
    pub overrides: Vec<EnableOverride>,
}

impl EnableOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from a TOML file. A missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, OverridesError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|source| OverridesError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| OverridesError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), OverridesError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| OverridesError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|source| OverridesError::Serialize { source })?;

        std::fs::write(path, content).map_err(|source| OverridesError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn find(&self, subs_id: i64, app_id: &str, group_key: Option<i32>) -> Option<&EnableOverride> {
        self.overrides
            .iter()
            .find(|o| o.subs_item_id == subs_id && o.app_id == app_id && o.group_key == group_key)
    }

    /// Group-level override, if set
    pub fn group_override(&self, subs_id: i64, app_id: &str, group_key: i32) -> Option<bool> {
        self.find(subs_id, app_id, Some(group_key)).map(|o| o.enable)
    }

    /// App-level override, if set
    pub fn app_override(&self, subs_id: i64, app_id: &str) -> Option<bool> {
        self.find(subs_id, app_id, None).map(|o| o.enable)
    }

    /// Insert or replace one override record
    pub fn set(&mut self, record: EnableOverride) {
        let existing = self.overrides.iter_mut().find(|o| {
            o.subs_item_id == record.subs_item_id
                && o.app_id == record.app_id
                && o.group_key == record.group_key
        });
        match existing {
            Some(o) => o.enable = record.enable,
            None => self.overrides.push(record),
        }
    }

    pub fn set_group(&mut self, subs_id: i64, app_id: &str, group_key: i32, enable: bool) {
        self.set(EnableOverride {
            subs_item_id: subs_id,
            app_id: app_id.to_string(),
            group_key: Some(group_key),
            enable,
        });
    }

    pub fn set_app(&mut self, subs_id: i64, app_id: &str, enable: bool) {
        self.set(EnableOverride {
            subs_item_id: subs_id,
            app_id: app_id.to_string(),
            group_key: None,
            enable,
        });
    }

    /// Remove a group's override (reset to the document default)
    pub fn clear_group(&mut self, subs_id: i64, app_id: &str, group_key: i32) {
        self.overrides.retain(|o| {
            !(o.subs_item_id == subs_id && o.app_id == app_id && o.group_key == Some(group_key))
        });
    }

    /// Remove every override of a subscription
    pub fn clear_subscription(&mut self, subs_id: i64) {
        self.overrides.retain(|o| o.subs_item_id != subs_id);
    }

    /// Effective enabled state: an app turned off disables all of its groups,
    /// otherwise a group override beats the document default.
    pub fn is_group_enabled(&self, subs_id: i64, app_id: &str, group: &GroupRaw) -> bool {
        if self.app_override(subs_id, app_id) == Some(false) {
            return false;
        }
        self.group_override(subs_id, app_id, group.key)
            .unwrap_or(group.default_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: i32, enable: Option<bool>) -> GroupRaw {
        GroupRaw {
            key,
            name: format!("g{key}"),
            desc: None,
            enable,
            rules: Vec::new(),
        }
    }

    #[test]
    fn group_override_beats_document_default() {
        let mut overrides = EnableOverrides::new();
        let off_by_default = group(1, Some(false));
        assert!(!overrides.is_group_enabled(7, "com.x", &off_by_default));

        overrides.set_group(7, "com.x", 1, true);
        assert!(overrides.is_group_enabled(7, "com.x", &off_by_default));
        // Scoped to the subscription and app
        assert!(!overrides.is_group_enabled(8, "com.x", &off_by_default));
        assert!(!overrides.is_group_enabled(7, "com.y", &off_by_default));
    }

    #[test]
    fn app_override_disables_every_group() {
        let mut overrides = EnableOverrides::new();
        overrides.set_group(7, "com.x", 1, true);
        overrides.set_app(7, "com.x", false);
        assert!(!overrides.is_group_enabled(7, "com.x", &group(1, None)));
        assert!(!overrides.is_group_enabled(7, "com.x", &group(2, None)));

        overrides.set_app(7, "com.x", true);
        assert_eq!(overrides.overrides.len(), 2, "set replaces existing record");
        assert!(overrides.is_group_enabled(7, "com.x", &group(2, None)));
    }

    #[test]
    fn clear_resets_to_default() {
        let mut overrides = EnableOverrides::new();
        overrides.set_group(7, "com.x", 1, false);
        overrides.set_group(9, "com.x", 1, false);
        overrides.clear_group(7, "com.x", 1);
        assert_eq!(overrides.group_override(7, "com.x", 1), None);
        assert_eq!(overrides.group_override(9, "com.x", 1), Some(false));

        overrides.clear_subscription(9);
        assert!(overrides.overrides.is_empty());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = EnableOverrides::load(&dir.path().join("overrides.toml")).unwrap();
        assert_eq!(loaded, EnableOverrides::new());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("overrides.toml");

        let mut overrides = EnableOverrides::new();
        overrides.set_group(-2, "com.x", 3, false);
        overrides.set_app(7, "com.y", false);
        overrides.save(&path).unwrap();

        assert_eq!(EnableOverrides::load(&path).unwrap(), overrides);
    }
}
