//! Persistence for subscription items and click logs.
//!
//! The engine only talks to the [`SubsItemStore`] and [`ClickLogStore`]
//! traits. Two implementations ship with the crate: [`MemoryStore`] for tests
//! and embedding, and [`FileStore`] which keeps JSON files under the data
//! directory (`~/.local/share/taprule/` by default).

mod error;
mod file;
mod memory;
mod writer;

pub use error::StorageError;
pub use file::FileStore;
pub(crate) use file::ITEMS_FILE;
pub use memory::MemoryStore;
pub use writer::spawn_click_log_writer;

use std::collections::BTreeMap;
use std::path::PathBuf;

use taprule_types::{ClickLog, SubsItem};

/// Append-only sink for fired-rule records
pub trait ClickLogStore: Send + Sync {
    fn insert(&self, log: &ClickLog) -> Result<(), StorageError>;

    /// Most recent records first
    fn recent(&self, limit: usize) -> Result<Vec<ClickLog>, StorageError>;

    /// Bump the fire counter of a subscription and return the new value
    fn increase_click_count(&self, subs_id: i64) -> Result<u64, StorageError>;

    /// Fire counters keyed by subscription id. Subscriptions that never
    /// fired are absent.
    fn click_counts(&self) -> Result<BTreeMap<i64, u64>, StorageError>;
}

/// Subscription metadata records, keyed by subscription id
pub trait SubsItemStore: Send + Sync {
    /// All items sorted by `order`, then id
    fn list(&self) -> Result<Vec<SubsItem>, StorageError>;

    fn get(&self, id: i64) -> Result<Option<SubsItem>, StorageError>;

    fn upsert(&self, item: &SubsItem) -> Result<(), StorageError>;

    /// Returns whether an item was removed
    fn delete(&self, id: i64) -> Result<bool, StorageError>;
}

/// Get the taprule data directory.
/// Creates `~/.local/share/taprule/` if it doesn't exist.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taprule");

    std::fs::create_dir_all(&base).map_err(|source| StorageError::CreateDir {
        path: base.clone(),
        source,
    })?;
    Ok(base)
}

/// File name used for a subscription document
pub fn subscription_filename(id: i64) -> String {
    format!("{id}.json")
}

fn sort_items(items: &mut [SubsItem]) {
    items.sort_by_key(|item| (item.order, item.id));
}
