//! Shared subscription and settings types for taprule
//!
//! This crate contains the serializable data model that is shared between the
//! engine (taprule-core) and any editing surface. It carries no behavior
//! beyond defaults and small lookups; parsing, validation and compilation
//! live in the core crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

/// What to do with the node a rule located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionKind {
    /// Tap the center of the target's bounds
    #[default]
    #[serde(rename = "clickCenter")]
    TapCenter,
    /// Tap inside the located node's bounds
    #[serde(rename = "clickNode")]
    TapNode,
    /// Dispatch a click event on the node itself
    #[serde(rename = "click")]
    DispatchClick,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::TapCenter => "clickCenter",
            ActionKind::TapNode => "clickNode",
            ActionKind::DispatchClick => "click",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription Document
// ─────────────────────────────────────────────────────────────────────────────

/// One selector-to-action binding inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRaw {
    /// Stable key, unique within the owning group
    pub key: i32,

    /// Selector sources, tried in order until one matches
    #[serde(default)]
    pub matches: Vec<String>,

    /// Delay in milliseconds between first match and action (default 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    /// Action to perform (default: tap center)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,

    /// Maximum number of fires (None = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_triggers: Option<u32>,

    /// Milliseconds after which the trigger count starts over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_interval: Option<u64>,

    /// Minimum milliseconds between two fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_cd: Option<u64>,
}

impl RuleRaw {
    pub fn new(key: i32, matches: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            key,
            matches: matches.into_iter().map(Into::into).collect(),
            delay: None,
            action: None,
            max_triggers: None,
            reset_interval: None,
            action_cd: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.unwrap_or(0)
    }

    pub fn action_kind(&self) -> ActionKind {
        self.action.unwrap_or_default()
    }
}

/// A named, keyed collection of rules for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRaw {
    /// Unique within the owning app; identifies the group to overrides
    pub key: i32,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    /// Default enabled state (None = enabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,

    #[serde(default)]
    pub rules: Vec<RuleRaw>,
}

impl GroupRaw {
    /// Enabled state declared by the document, before overrides
    pub fn default_enabled(&self) -> bool {
        self.enable.unwrap_or(true)
    }
}

/// Groups scoped to one application id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRaw {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub groups: Vec<GroupRaw>,
}

impl AppRaw {
    pub fn group(&self, key: i32) -> Option<&GroupRaw> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Highest group key in use, if any group exists
    pub fn max_group_key(&self) -> Option<i32> {
        self.groups.iter().map(|g| g.key).max()
    }
}

/// Top-level subscription document: the unit of distribution and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRaw {
    pub id: i64,

    pub version: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,

    #[serde(default)]
    pub apps: Vec<AppRaw>,
}

impl SubscriptionRaw {
    pub fn app(&self, app_id: &str) -> Option<&AppRaw> {
        self.apps.iter().find(|a| a.id == app_id)
    }

    pub fn app_mut(&mut self, app_id: &str) -> Option<&mut AppRaw> {
        self.apps.iter_mut().find(|a| a.id == app_id)
    }

    /// Display label: name if present, otherwise the id
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription Items & Overrides (persisted apart from documents)
// ─────────────────────────────────────────────────────────────────────────────

/// Local metadata record for one subscription document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsItem {
    /// Same as the document id. Negative ids are local, user-editable documents.
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,

    /// Last local modification time (ms since epoch)
    #[serde(default)]
    pub mtime: i64,

    /// Where the serialized document lives
    pub file_path: PathBuf,

    #[serde(default = "default_true")]
    pub enable: bool,

    /// Evaluation order between subscriptions (ascending)
    #[serde(default)]
    pub order: i32,
}

impl SubsItem {
    pub fn new(id: i64, file_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            update_url: None,
            mtime: 0,
            file_path: file_path.into(),
            enable: true,
            order: 0,
        }
    }

    /// Local subscriptions are the only ones users may edit in place
    pub fn is_local(&self) -> bool {
        self.id < 0
    }
}

/// User-set enable state for a group, or a whole app when `group_key` is None.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableOverride {
    pub subs_item_id: i64,
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<i32>,
    pub enable: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Trigger Records
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only record of one fired rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickLog {
    /// ms since epoch
    pub timestamp: i64,
    pub app_id: Option<String>,
    pub activity_id: Option<String>,
    pub subs_id: i64,
    pub group_key: i32,
    pub rule_index: usize,
    pub rule_key: i32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Refresh intervals shorter than this are raised to it
pub const MIN_UPDATE_SUBS_INTERVAL_MS: i64 = 60 * 60_000;

/// Global key-value settings for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Master switch: when false, passes run no rules
    #[serde(default = "default_true")]
    pub enable_service: bool,

    /// Evaluation loop period
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Wait between passes while the screen is locked
    #[serde(default = "default_locked_backoff_ms")]
    pub locked_backoff_ms: u64,

    /// Foreground tracker period
    #[serde(default = "default_foreground_poll_ms")]
    pub foreground_poll_ms: u64,

    /// How often the refresh task wakes up to check whether a refresh is due
    #[serde(default = "default_update_check_interval_ms")]
    pub update_check_interval_ms: u64,

    /// Minimum time between refresh cycles; <= 0 pauses refresh
    #[serde(default = "default_update_subs_interval_ms")]
    pub update_subs_interval_ms: i64,

    /// Directory for subscription files (None = platform data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enable_service: true,
            scan_interval_ms: default_scan_interval_ms(),
            locked_backoff_ms: default_locked_backoff_ms(),
            foreground_poll_ms: default_foreground_poll_ms(),
            update_check_interval_ms: default_update_check_interval_ms(),
            update_subs_interval_ms: default_update_subs_interval_ms(),
            subscriptions_dir: None,
        }
    }
}

impl EngineSettings {
    /// Refresh interval after clamping, or None when refresh is paused
    pub fn effective_update_interval_ms(&self) -> Option<i64> {
        if self.update_subs_interval_ms <= 0 {
            None
        } else {
            Some(self.update_subs_interval_ms.max(MIN_UPDATE_SUBS_INTERVAL_MS))
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_scan_interval_ms() -> u64 {
    150
}

fn default_locked_backoff_ms() -> u64 {
    1000
}

fn default_foreground_poll_ms() -> u64 {
    500
}

fn default_update_check_interval_ms() -> u64 {
    30 * 60_000
}

fn default_update_subs_interval_ms() -> i64 {
    MIN_UPDATE_SUBS_INTERVAL_MS
}
