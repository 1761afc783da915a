//! Error types for subscription documents, edits and the registry

use std::path::PathBuf;
use thiserror::Error;

use crate::selector::SelectorSyntaxError;
use crate::storage::StorageError;

/// Errors while reading or writing a subscription document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document JSON")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize document")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate app id '{app_id}'")]
    DuplicateApp { app_id: String },

    #[error("duplicate group key {key} in app '{app_id}'")]
    DuplicateGroup { app_id: String, key: i32 },

    #[error("duplicate rule key {key} in group {group_key}")]
    DuplicateRule { group_key: i32, key: i32 },
}

/// Why a group's rules cannot be activated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleCompileError {
    #[error("rule {rule_key} has no selectors")]
    NoSelectors { rule_key: i32 },

    #[error("rule {rule_key} has an invalid selector '{text}'")]
    Selector {
        rule_key: i32,
        text: String,
        #[source]
        source: SelectorSyntaxError,
    },
}

/// Rejected group edits. The document is left untouched.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("app '{app_id}' is not in the subscription")]
    UnknownApp { app_id: String },

    #[error("group {key} is not in app '{app_id}'")]
    UnknownGroup { app_id: String, key: i32 },

    #[error("no groups to add")]
    EmptyBatch,

    #[error("group '{name}' is invalid")]
    InvalidGroup {
        name: String,
        #[source]
        source: RuleCompileError,
    },

    #[error("a group named '{name}' already exists")]
    NameCollision { name: String },

    #[error("group key cannot change from {original} to {key}")]
    KeyChanged { original: i32, key: i32 },

    #[error("no group keys left in app '{app_id}'")]
    KeysExhausted { app_id: String },

    #[error("app payload '{app_id}' is invalid")]
    InvalidApp {
        app_id: String,
        #[source]
        source: DocumentError,
    },

    #[error("payload is for app '{found}', expected '{expected}'")]
    AppMismatch { expected: String, found: String },

    #[error("subscription {subs_id} is not editable")]
    ReadOnly { subs_id: i64 },

    #[error("payload is neither an app nor a group")]
    Payload {
        #[source]
        source: DocumentError,
    },
}

/// Errors from the on-disk override set
#[derive(Debug, Error)]
pub enum OverridesError {
    #[error("failed to access overrides file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse overrides TOML in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize overrides")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
}

/// Errors from the subscription registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subscription {id} is not registered")]
    UnknownSubscription { id: i64 },

    #[error("subscription {id} is already registered")]
    AlreadyRegistered { id: i64 },

    #[error("failed to read subscription file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write subscription file {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid subscription file {path}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error(transparent)]
    Serialize(#[from] DocumentError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Overrides(#[from] OverridesError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
