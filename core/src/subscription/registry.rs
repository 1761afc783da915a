//! Subscription registry - the authoritative set of loaded documents
//!
//! Pairs every `SubsItem` record with its parsed document and owns the
//! override set. Every change to a document is written to the item's file
//! and bumps the item's `mtime` before it becomes visible in memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use taprule_types::{AppRaw, GroupRaw, SubsItem, SubscriptionRaw};

use super::document::{parse_subscription, stringify};
use super::edit;
use super::error::{EditError, RegistryError};
use super::overrides::EnableOverrides;
use crate::clock::now_ms;
use crate::storage::{SubsItemStore, subscription_filename};

/// One loaded subscription
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub item: SubsItem,
    pub doc: SubscriptionRaw,
}

pub struct SubscriptionRegistry {
    dir: PathBuf,
    store: Arc<dyn SubsItemStore>,
    overrides_path: Option<PathBuf>,
    overrides: EnableOverrides,
    /// Sorted by item order, then id
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    /// Load every stored item and its document from `dir`.
    ///
    /// Items whose file is missing or fails to parse are logged and left out;
    /// their records stay in the store.
    pub fn open(
        dir: impl Into<PathBuf>,
        store: Arc<dyn SubsItemStore>,
        overrides_path: Option<PathBuf>,
    ) -> Result<Self, RegistryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| RegistryError::WriteFile {
            path: dir.clone(),
            source,
        })?;

        let overrides = match &overrides_path {
            Some(path) => EnableOverrides::load(path)?,
            None => EnableOverrides::new(),
        };

        let mut entries = Vec::new();
        for item in store.list()? {
            match read_document(&item.file_path) {
                Ok(doc) if doc.id == item.id => entries.push(Subscription { item, doc }),
                Ok(doc) => tracing::warn!(
                    item_id = item.id,
                    doc_id = doc.id,
                    "Subscription file holds a different id, skipping"
                ),
                Err(e) => tracing::warn!(item_id = item.id, error = %e, "Failed to load subscription"),
            }
        }

        tracing::info!(count = entries.len(), dir = %dir.display(), "Loaded subscriptions");
        Ok(Self {
            dir,
            store,
            overrides_path,
            overrides,
            entries,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.entries
    }

    pub fn get(&self, id: i64) -> Option<&Subscription> {
        self.entries.iter().find(|s| s.item.id == id)
    }

    pub fn overrides(&self) -> &EnableOverrides {
        &self.overrides
    }

    fn entry_mut(&mut self, id: i64) -> Result<&mut Subscription, RegistryError> {
        self.entries
            .iter_mut()
            .find(|s| s.item.id == id)
            .ok_or(RegistryError::UnknownSubscription { id })
    }

    fn next_order(&self) -> i32 {
        self.entries.iter().map(|s| s.item.order + 1).max().unwrap_or(0)
    }

    fn sort(&mut self) {
        self.entries
            .sort_by_key(|s| (s.item.order, s.item.id));
    }

    // ─── Documents ──────────────────────────────────────────────────────────

    /// Add a parsed document, or replace the one with the same id.
    pub fn import(
        &mut self,
        doc: SubscriptionRaw,
        update_url: Option<String>,
    ) -> Result<&Subscription, RegistryError> {
        let id = doc.id;
        let update_url = update_url.or_else(|| doc.update_url.clone());

        if self.get(id).is_some() {
            self.replace_document(id, doc, update_url)?;
        } else {
            let mut item = SubsItem::new(id, self.dir.join(subscription_filename(id)));
            item.update_url = update_url;
            item.order = self.next_order();
            item.mtime = now_ms();
            write_document(&item.file_path, &doc)?;
            self.store.upsert(&item)?;
            tracing::info!(id, name = %doc.label(), "Imported subscription");
            self.entries.push(Subscription { item, doc });
            self.sort();
        }

        self.get(id).ok_or(RegistryError::UnknownSubscription { id })
    }

    /// Create an empty local (user-editable) subscription.
    pub fn create_local(&mut self, name: &str) -> Result<i64, RegistryError> {
        let id = self
            .entries
            .iter()
            .map(|s| s.item.id)
            .filter(|id| *id < 0)
            .min()
            .unwrap_or(-1)
            - 1;
        let doc = SubscriptionRaw {
            id,
            version: 0,
            name: Some(name.to_string()),
            update_url: None,
            apps: Vec::new(),
        };
        self.import(doc, None)?;
        Ok(id)
    }

    /// Persist a new document for an existing subscription and make it
    /// authoritative. `update_url` replaces the item's URL when set.
    pub fn replace_document(
        &mut self,
        id: i64,
        doc: SubscriptionRaw,
        update_url: Option<String>,
    ) -> Result<(), RegistryError> {
        let store = Arc::clone(&self.store);
        let entry = self.entry_mut(id)?;

        write_document(&entry.item.file_path, &doc)?;
        if update_url.is_some() {
            entry.item.update_url = update_url;
        }
        entry.item.mtime = now_ms().max(entry.item.mtime + 1);
        store.upsert(&entry.item)?;
        entry.doc = doc;

        tracing::debug!(id, version = entry.doc.version, "Subscription document replaced");
        Ok(())
    }

    /// Re-read a document after its file changed on disk.
    ///
    /// Returns `Ok(false)` when no item uses `path` or the content is
    /// unchanged.
    pub fn reload_file(&mut self, path: &Path) -> Result<bool, RegistryError> {
        let Some(entry) = self.entries.iter_mut().find(|s| s.item.file_path == path) else {
            return Ok(false);
        };

        let doc = read_document(path)?;
        if doc == entry.doc {
            return Ok(false);
        }
        if doc.id != entry.item.id {
            tracing::warn!(
                path = %path.display(),
                expected = entry.item.id,
                found = doc.id,
                "Ignoring subscription file with a different id"
            );
            return Ok(false);
        }

        entry.doc = doc;
        entry.item.mtime = now_ms().max(entry.item.mtime + 1);
        self.store.upsert(&entry.item)?;
        tracing::info!(id = entry.item.id, "Reloaded subscription from disk");
        Ok(true)
    }

    /// Re-read every loaded document. Unreadable files are logged and keep
    /// their in-memory document. Returns how many changed.
    pub fn reload_all(&mut self) -> usize {
        let paths: Vec<PathBuf> = self.entries.iter().map(|s| s.item.file_path.clone()).collect();
        let mut changed = 0;
        for path in paths {
            match self.reload_file(&path) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to reload subscription"),
            }
        }
        changed
    }

    /// Forget a subscription: its item, file and overrides.
    pub fn remove(&mut self, id: i64) -> Result<(), RegistryError> {
        let position = self
            .entries
            .iter()
            .position(|s| s.item.id == id)
            .ok_or(RegistryError::UnknownSubscription { id })?;
        let entry = self.entries.remove(position);

        self.store.delete(id)?;
        if let Err(e) = std::fs::remove_file(&entry.item.file_path) {
            tracing::warn!(id, error = %e, "Failed to delete subscription file");
        }
        self.overrides.clear_subscription(id);
        self.save_overrides()
    }

    /// Toggle a whole subscription
    pub fn set_enabled(&mut self, id: i64, enable: bool) -> Result<(), RegistryError> {
        let store = Arc::clone(&self.store);
        let entry = self.entry_mut(id)?;
        entry.item.enable = enable;
        store.upsert(&entry.item)?;
        Ok(())
    }

    // ─── Local Edits ────────────────────────────────────────────────────────

    fn local_doc(&self, id: i64) -> Result<&SubscriptionRaw, RegistryError> {
        let entry = self.get(id).ok_or(RegistryError::UnknownSubscription { id })?;
        if !entry.item.is_local() {
            return Err(EditError::ReadOnly { subs_id: id }.into());
        }
        Ok(&entry.doc)
    }

    /// Local documents gain an empty app entry on the first group added to it
    fn local_doc_with_app(&self, id: i64, app_id: &str) -> Result<SubscriptionRaw, RegistryError> {
        let mut doc = self.local_doc(id)?.clone();
        if doc.app(app_id).is_none() {
            doc.apps.push(AppRaw {
                id: app_id.to_string(),
                name: None,
                groups: Vec::new(),
            });
        }
        Ok(doc)
    }

    pub fn add_groups(
        &mut self,
        id: i64,
        app_id: &str,
        groups: Vec<GroupRaw>,
    ) -> Result<(), RegistryError> {
        let doc = self.local_doc_with_app(id, app_id)?;
        let edited = edit::add_groups(&doc, app_id, groups)?;
        self.replace_document(id, edited, None)
    }

    pub fn add_from_source(&mut self, id: i64, app_id: &str, text: &str) -> Result<(), RegistryError> {
        let doc = self.local_doc_with_app(id, app_id)?;
        let edited = edit::add_from_source(&doc, app_id, text)?;
        self.replace_document(id, edited, None)
    }

    pub fn edit_group(
        &mut self,
        id: i64,
        app_id: &str,
        original_key: i32,
        group: GroupRaw,
    ) -> Result<(), RegistryError> {
        let edited = edit::edit_group(self.local_doc(id)?, app_id, original_key, group)?;
        self.replace_document(id, edited, None)
    }

    /// Delete a group along with its override
    pub fn delete_group(&mut self, id: i64, app_id: &str, key: i32) -> Result<(), RegistryError> {
        let edited = edit::delete_group(self.local_doc(id)?, app_id, key)?;
        self.replace_document(id, edited, None)?;
        self.overrides.clear_group(id, app_id, key);
        self.save_overrides()
    }

    // ─── Overrides ──────────────────────────────────────────────────────────

    pub fn set_group_enabled(
        &mut self,
        id: i64,
        app_id: &str,
        key: i32,
        enable: bool,
    ) -> Result<(), RegistryError> {
        self.require(id)?;
        self.overrides.set_group(id, app_id, key, enable);
        self.save_overrides()
    }

    pub fn set_app_enabled(&mut self, id: i64, app_id: &str, enable: bool) -> Result<(), RegistryError> {
        self.require(id)?;
        self.overrides.set_app(id, app_id, enable);
        self.save_overrides()
    }

    pub fn clear_group_override(&mut self, id: i64, app_id: &str, key: i32) -> Result<(), RegistryError> {
        self.overrides.clear_group(id, app_id, key);
        self.save_overrides()
    }

    fn require(&self, id: i64) -> Result<(), RegistryError> {
        self.get(id)
            .map(|_| ())
            .ok_or(RegistryError::UnknownSubscription { id })
    }

    fn save_overrides(&self) -> Result<(), RegistryError> {
        if let Some(path) = &self.overrides_path {
            self.overrides.save(path)?;
        }
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<SubscriptionRaw, RegistryError> {
    let text = std::fs::read_to_string(path).map_err(|source| RegistryError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_subscription(&text).map_err(|source| RegistryError::Document {
        path: path.to_path_buf(),
        source,
    })
}

fn write_document(path: &Path, doc: &SubscriptionRaw) -> Result<(), RegistryError> {
    let text = stringify(doc)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| RegistryError::WriteFile {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text).map_err(|source| RegistryError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}
