use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, Receiver};

use crate::storage::ITEMS_FILE;

pub enum SubscriptionFileEvent {
    /// Document created or rewritten, possibly by an external editor
    Changed(PathBuf),
    Removed(PathBuf),
    Error(String),
}

/// Watches the subscription directory for document files changed on disk.
pub struct SubscriptionWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
}

impl SubscriptionWatcher {
    pub fn new(path: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel(100);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            Config::default(),
        )?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    pub async fn next_event(&mut self) -> Option<SubscriptionFileEvent> {
        while let Some(event_result) = self.rx.recv().await {
            match event_result {
                Ok(event) => {
                    if let Some(file_event) = process_event(event) {
                        return Some(file_event);
                    }
                }
                Err(e) => {
                    return Some(SubscriptionFileEvent::Error(format!(
                        "Subscription watcher error: {}",
                        e
                    )));
                }
            }
        }
        None
    }
}

fn process_event(event: Event) -> Option<SubscriptionFileEvent> {
    let path = event.paths.into_iter().find(|p| is_document(p))?;
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            tracing::debug!(path = %path.display(), "Subscription file changed");
            Some(SubscriptionFileEvent::Changed(path))
        }
        EventKind::Remove(_) => Some(SubscriptionFileEvent::Removed(path)),
        _ => None,
    }
}

fn is_document(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".json") && n != ITEMS_FILE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn document_files_only() {
        assert!(is_document(Path::new("/data/7.json")));
        assert!(is_document(Path::new("/data/-2.json")));
        assert!(!is_document(Path::new("/data/subs_items.json")));
        assert!(!is_document(Path::new("/data/click_log.jsonl")));
        assert!(!is_document(Path::new("/data/7.json.tmp")));
    }

    #[test]
    fn maps_event_kinds() {
        assert!(matches!(
            process_event(event(EventKind::Modify(ModifyKind::Any), "/d/7.json")),
            Some(SubscriptionFileEvent::Changed(_))
        ));
        assert!(matches!(
            process_event(event(EventKind::Create(CreateKind::File), "/d/7.json")),
            Some(SubscriptionFileEvent::Changed(_))
        ));
        assert!(matches!(
            process_event(event(EventKind::Remove(RemoveKind::File), "/d/7.json")),
            Some(SubscriptionFileEvent::Removed(_))
        ));
        assert!(process_event(event(EventKind::Modify(ModifyKind::Any), "/d/subs_items.json")).is_none());
    }
}
