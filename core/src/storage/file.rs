//! JSON-file store
//!
//! Items live in one `subs_items.json` array that is rewritten on change.
//! Click logs are appended to `click_log.jsonl`, one record per line, and
//! per-subscription fire counters are kept in `click_counts.json`.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use taprule_types::{ClickLog, SubsItem};

use super::{ClickLogStore, StorageError, SubsItemStore, sort_items};

pub(crate) const ITEMS_FILE: &str = "subs_items.json";
const CLICK_LOG_FILE: &str = "click_log.jsonl";
const CLICK_COUNTS_FILE: &str = "click_counts.json";

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles on the items file
    items_lock: Mutex<()>,
    log_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            items_lock: Mutex::new(()),
            log_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn items_path(&self) -> PathBuf {
        self.dir.join(ITEMS_FILE)
    }

    fn read_items(&self) -> Result<Vec<SubsItem>, StorageError> {
        let path = self.items_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StorageError::Decode { path, source })
    }

    fn read_counts(&self) -> Result<BTreeMap<i64, u64>, StorageError> {
        let path = self.dir.join(CLICK_COUNTS_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StorageError::Decode { path, source })
    }

    fn write_items(&self, items: &[SubsItem]) -> Result<(), StorageError> {
        let path = self.items_path();
        let content =
            serde_json::to_string_pretty(items).map_err(|source| StorageError::Encode { source })?;
        std::fs::write(&path, content).map_err(|source| StorageError::Write { path, source })
    }
}

impl SubsItemStore for FileStore {
    fn list(&self) -> Result<Vec<SubsItem>, StorageError> {
        let _guard = self.items_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.read_items()?;
        sort_items(&mut items);
        Ok(items)
    }

    fn get(&self, id: i64) -> Result<Option<SubsItem>, StorageError> {
        let _guard = self.items_lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_items()?.into_iter().find(|item| item.id == id))
    }

    fn upsert(&self, item: &SubsItem) -> Result<(), StorageError> {
        let _guard = self.items_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.read_items()?;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        self.write_items(&items)
    }

    fn delete(&self, id: i64) -> Result<bool, StorageError> {
        let _guard = self.items_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.read_items()?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.write_items(&items)?;
        Ok(true)
    }
}

impl ClickLogStore for FileStore {
    fn insert(&self, log: &ClickLog) -> Result<(), StorageError> {
        let _guard = self.log_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let path = self.dir.join(CLICK_LOG_FILE);
        let mut line =
            serde_json::to_string(log).map_err(|source| StorageError::Encode { source })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .map_err(|source| StorageError::Write { path, source })
    }

    fn recent(&self, limit: usize) -> Result<Vec<ClickLog>, StorageError> {
        let _guard = self.log_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let path = self.dir.join(CLICK_LOG_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.clone(),
            source,
        })?;

        content
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .take(limit)
            .map(|line| {
                serde_json::from_str(line).map_err(|source| StorageError::Decode {
                    path: path.clone(),
                    source,
                })
            })
            .collect()
    }

    fn increase_click_count(&self, subs_id: i64) -> Result<u64, StorageError> {
        let _guard = self.log_lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut counts = self.read_counts()?;
        let count = counts.entry(subs_id).or_default();
        *count = count.saturating_add(1);
        let count = *count;

        let path = self.dir.join(CLICK_COUNTS_FILE);
        let content =
            serde_json::to_string(&counts).map_err(|source| StorageError::Encode { source })?;
        std::fs::write(&path, content).map_err(|source| StorageError::Write { path, source })?;
        Ok(count)
    }

    fn click_counts(&self) -> Result<BTreeMap<i64, u64>, StorageError> {
        let _guard = self.log_lock.lock().map_err(|_| StorageError::Poisoned)?;
        self.read_counts()
    }
}
