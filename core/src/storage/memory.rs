use std::collections::BTreeMap;
use std::sync::Mutex;

use taprule_types::{ClickLog, SubsItem};

use super::{ClickLogStore, StorageError, SubsItemStore, sort_items};

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<Vec<SubsItem>>,
    logs: Mutex<Vec<ClickLog>>,
    counts: Mutex<BTreeMap<i64, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClickLogStore for MemoryStore {
    fn insert(&self, log: &ClickLog) -> Result<(), StorageError> {
        self.logs
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .push(log.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<ClickLog>, StorageError> {
        let logs = self.logs.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(logs.iter().rev().take(limit).cloned().collect())
    }

    fn increase_click_count(&self, subs_id: i64) -> Result<u64, StorageError> {
        let mut counts = self.counts.lock().map_err(|_| StorageError::Poisoned)?;
        let count = counts.entry(subs_id).or_default();
        *count = count.saturating_add(1);
        Ok(*count)
    }

    fn click_counts(&self) -> Result<BTreeMap<i64, u64>, StorageError> {
        Ok(self.counts.lock().map_err(|_| StorageError::Poisoned)?.clone())
    }
}

impl SubsItemStore for MemoryStore {
    fn list(&self) -> Result<Vec<SubsItem>, StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?.clone();
        sort_items(&mut items);
        Ok(items)
    }

    fn get(&self, id: i64) -> Result<Option<SubsItem>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.iter().find(|item| item.id == id).cloned())
    }

    fn upsert(&self, item: &SubsItem) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<bool, StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(timestamp: i64) -> ClickLog {
        ClickLog {
            timestamp,
            app_id: Some("com.x".into()),
            activity_id: None,
            subs_id: 1,
            group_key: 0,
            rule_index: 0,
            rule_key: 0,
        }
    }

    #[test]
    fn items_are_listed_by_order_then_id() {
        let store = MemoryStore::new();
        let mut late = SubsItem::new(1, "1.json");
        late.order = 5;
        store.upsert(&late).unwrap();
        store.upsert(&SubsItem::new(9, "9.json")).unwrap();
        store.upsert(&SubsItem::new(-2, "-2.json")).unwrap();

        let ids: Vec<_> = store.list().unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![-2, 9, 1]);
    }

    #[test]
    fn upsert_replaces_and_delete_reports() {
        let store = MemoryStore::new();
        let mut item = SubsItem::new(3, "3.json");
        store.upsert(&item).unwrap();
        item.mtime = 42;
        store.upsert(&item).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.get(3).unwrap().unwrap().mtime, 42);
        assert!(store.delete(3).unwrap());
        assert!(!store.delete(3).unwrap());
        assert_eq!(store.get(3).unwrap(), None);
    }

    #[test]
    fn recent_logs_are_newest_first() {
        let store = MemoryStore::new();
        for ts in 1..=4 {
            store.insert(&log(ts)).unwrap();
        }
        let recent: Vec<_> = store.recent(2).unwrap().iter().map(|l| l.timestamp).collect();
        assert_eq!(recent, vec![4, 3]);
    }

    #[test]
    fn click_counts_are_kept_per_subscription() {
        let store = MemoryStore::new();
        assert!(store.click_counts().unwrap().is_empty());

        assert_eq!(store.increase_click_count(1).unwrap(), 1);
        assert_eq!(store.increase_click_count(1).unwrap(), 2);
        assert_eq!(store.increase_click_count(-4).unwrap(), 1);

        let counts = store.click_counts().unwrap();
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&-4), Some(&1));
        assert_eq!(counts.get(&7), None);
    }
}
