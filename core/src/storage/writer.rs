use std::sync::Arc;

use taprule_types::ClickLog;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ClickLogStore;

/// Drain click logs into the store until every sender is dropped.
///
/// The evaluation loop only pushes into the channel, so a slow or failing
/// store never delays a pass. Failed inserts are logged and dropped. Each
/// recorded log also bumps its subscription's click counter.
pub fn spawn_click_log_writer(
    store: Arc<dyn ClickLogStore>,
    mut rx: mpsc::UnboundedReceiver<ClickLog>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(log) = rx.recv().await {
            if let Err(e) = store.insert(&log) {
                tracing::warn!(
                    error = %e,
                    subs_id = log.subs_id,
                    group_key = log.group_key,
                    rule_key = log.rule_key,
                    "Failed to record click log"
                );
                continue;
            }
            match store.increase_click_count(log.subs_id) {
                Ok(count) => tracing::trace!(subs_id = log.subs_id, count, "Click counted"),
                Err(e) => {
                    tracing::warn!(error = %e, subs_id = log.subs_id, "Failed to count click")
                }
            }
        }
        tracing::debug!("Click log writer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn writes_until_channel_closes() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_click_log_writer(store.clone(), rx);

        for (rule_key, subs_id) in [(0, 1), (1, 1), (2, 5)] {
            tx.send(ClickLog {
                timestamp: 0,
                app_id: None,
                activity_id: None,
                subs_id,
                group_key: 0,
                rule_index: rule_key as usize,
                rule_key,
            })
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.recent(10).unwrap().len(), 3);
        let counts = store.click_counts().unwrap();
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&5), Some(&1));
    }
}
