//! Engine service - owns the periodic tasks and the state they share
//!
//! Architecture:
//! - SharedState: settings, the subscription registry and the two watch
//!   channels (foreground activity, active rule set)
//! - EngineHandle: cloneable access for callers; every mutation republishes
//!   the active rule set
//! - Engine: consumed by `start`, which spawns the background tasks
//!
//! ```text
//!   foreground tracker ──► watch<TopActivity> ──► rule set builder
//!                                                      │
//!   handle edits / refresh / file watcher ──► republish ┤
//!                                                      ▼
//!                                          watch<Arc<ActiveRuleSet>>
//!                                                      │
//!                               evaluation loop ◄──────┘ ──► click log writer
//! ```

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use taprule_types::{ActionKind, ClickLog, EngineSettings, GroupRaw, SubscriptionRaw};
use tokio::sync::{Mutex, Notify, RwLock, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::error::EngineError;
use super::evaluator::Evaluator;
use super::foreground::{ForegroundTracker, TopActivity};
use super::rule_set::ActiveRuleSet;
use crate::clock::now_ms;
use crate::context::BackgroundTasks;
use crate::platform::{ActionExecutor, ForegroundOracle, PlatformError, Screenshot, SnapshotSource};
use crate::selector::{self, query_selector};
use crate::storage::{ClickLogStore, StorageError, spawn_click_log_writer};
use crate::subscription::{
    RegistryError, Subscription, SubscriptionFileEvent, SubscriptionRegistry, SubscriptionWatcher,
    parse_subscription,
};
use crate::updater::{DocumentFetcher, RefreshSchedule, RefreshSummary, refresh_all};

/// Host-side collaborators the engine drives
#[derive(Clone)]
pub struct EnginePlatform {
    pub snapshot: Arc<dyn SnapshotSource>,
    pub executor: Arc<dyn ActionExecutor>,
    pub oracle: Option<Arc<dyn ForegroundOracle>>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub click_logs: Arc<dyn ClickLogStore>,
}

/// Window-state change reported by the host
#[derive(Debug, Clone)]
struct WindowEvent {
    package: String,
    class_name: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────────────────

struct SharedState {
    settings: RwLock<EngineSettings>,
    registry: RwLock<SubscriptionRegistry>,
    service_enabled: AtomicBool,
    schedule: Mutex<RefreshSchedule>,
    /// Asks the foreground tracker to poll now instead of on its next tick
    foreground_stale: Notify,
    foreground_tx: watch::Sender<TopActivity>,
    rules_tx: watch::Sender<Arc<ActiveRuleSet>>,
}

impl SharedState {
    /// Rebuild the active rule set for `app_id` and publish it
    async fn publish_rules(&self, app_id: Option<&str>) {
        let set = {
            let registry = self.registry.read().await;
            ActiveRuleSet::build(registry.subscriptions(), registry.overrides(), app_id)
        };
        self.rules_tx.send_replace(Arc::new(set));
    }

    /// Rebuild for the current foreground app after a registry change
    async fn republish(&self) {
        let app_id = self.foreground_tx.borrow().app_id.clone();
        self.publish_rules(app_id.as_deref()).await;
    }

    async fn refresh(&self, fetcher: &dyn DocumentFetcher) -> RefreshSummary {
        self.schedule.lock().await.mark(now_ms());
        let summary = refresh_all(&self.registry, fetcher).await;
        if !summary.updated.is_empty() {
            self.republish().await;
        }
        summary
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

pub struct Engine {
    shared: Arc<SharedState>,
    platform: EnginePlatform,
    window_rx: mpsc::UnboundedReceiver<WindowEvent>,
    cancel: CancellationToken,
    tasks: Arc<Mutex<BackgroundTasks>>,
    watch_files: bool,
}

impl Engine {
    /// Create an engine and the handle used to talk to it. Nothing runs
    /// until [`Engine::start`].
    pub fn new(
        settings: EngineSettings,
        registry: SubscriptionRegistry,
        platform: EnginePlatform,
    ) -> (Self, EngineHandle) {
        let (window_tx, window_rx) = mpsc::unbounded_channel();
        let (foreground_tx, _) = watch::channel(TopActivity::default());
        let (rules_tx, _) = watch::channel(Arc::new(ActiveRuleSet::empty()));

        let shared = Arc::new(SharedState {
            service_enabled: AtomicBool::new(settings.enable_service),
            settings: RwLock::new(settings),
            registry: RwLock::new(registry),
            schedule: Mutex::new(RefreshSchedule::default()),
            foreground_stale: Notify::new(),
            foreground_tx,
            rules_tx,
        });
        let cancel = CancellationToken::new();
        let tasks = Arc::new(Mutex::new(BackgroundTasks::default()));

        let handle = EngineHandle {
            shared: shared.clone(),
            platform: platform.clone(),
            window_tx,
            cancel: cancel.clone(),
            tasks: tasks.clone(),
        };
        let engine = Self {
            shared,
            platform,
            window_rx,
            cancel,
            tasks,
            watch_files: true,
        };
        (engine, handle)
    }

    /// Reload documents edited on disk (on by default)
    pub fn with_file_watcher(mut self, enabled: bool) -> Self {
        self.watch_files = enabled;
        self
    }

    /// Spawn every background task. They run until [`EngineHandle::stop`].
    pub async fn start(self) {
        let Self {
            shared,
            platform,
            window_rx,
            cancel,
            tasks,
            watch_files,
        } = self;

        // First refresh waits a full interval after startup
        shared.schedule.lock().await.mark(now_ms());

        let (click_tx, click_rx) = mpsc::unbounded_channel();
        let evaluator = Evaluator::new(platform.executor.clone(), click_tx);

        let watcher = if watch_files {
            let dir = shared.registry.read().await.dir().to_path_buf();
            match SubscriptionWatcher::new(&dir) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Subscription watcher unavailable");
                    None
                }
            }
        } else {
            None
        };

        let mut tasks = tasks.lock().await;
        tasks.click_log = Some(spawn_click_log_writer(platform.click_logs.clone(), click_rx));
        tasks.foreground = Some(tokio::spawn(run_foreground_tracker(
            shared.clone(),
            platform.snapshot.clone(),
            platform.oracle.clone(),
            window_rx,
            cancel.clone(),
        )));
        tasks.rule_set = Some(tokio::spawn(run_rule_set_builder(shared.clone(), cancel.clone())));
        tasks.evaluation = Some(tokio::spawn(run_evaluation_loop(
            shared.clone(),
            platform.snapshot.clone(),
            evaluator,
            cancel.clone(),
        )));
        tasks.refresh = Some(tokio::spawn(run_refresh_loop(
            shared.clone(),
            platform.snapshot.clone(),
            platform.fetcher.clone(),
            cancel.clone(),
        )));
        if let Some(watcher) = watcher {
            tasks.watcher = Some(tokio::spawn(run_subscription_watcher(
                shared.clone(),
                watcher,
                cancel.clone(),
            )));
        }

        tracing::info!("Engine started");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable handle for reading engine state and issuing operations
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<SharedState>,
    platform: EnginePlatform,
    window_tx: mpsc::UnboundedSender<WindowEvent>,
    cancel: CancellationToken,
    tasks: Arc<Mutex<BackgroundTasks>>,
}

impl EngineHandle {
    // ─── State ──────────────────────────────────────────────────────────────

    pub fn foreground(&self) -> TopActivity {
        self.shared.foreground_tx.borrow().clone()
    }

    pub fn subscribe_foreground(&self) -> watch::Receiver<TopActivity> {
        self.shared.foreground_tx.subscribe()
    }

    pub fn rule_set(&self) -> Arc<ActiveRuleSet> {
        self.shared.rules_tx.borrow().clone()
    }

    pub fn subscribe_rule_set(&self) -> watch::Receiver<Arc<ActiveRuleSet>> {
        self.shared.rules_tx.subscribe()
    }

    /// Rules that would be active for `app_id`, without publishing them
    pub async fn rules_for(&self, app_id: &str) -> ActiveRuleSet {
        let registry = self.shared.registry.read().await;
        ActiveRuleSet::build(registry.subscriptions(), registry.overrides(), Some(app_id))
    }

    pub async fn settings(&self) -> EngineSettings {
        self.shared.settings.read().await.clone()
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.shared.registry.read().await.subscriptions().to_vec()
    }

    pub fn recent_click_logs(&self, limit: usize) -> Result<Vec<ClickLog>, StorageError> {
        self.platform.click_logs.recent(limit)
    }

    /// Fired-rule counters per subscription id
    pub fn click_counts(&self) -> Result<BTreeMap<i64, u64>, StorageError> {
        self.platform.click_logs.click_counts()
    }

    /// Report a host window-state change to the foreground tracker
    pub fn window_state_changed(&self, package: &str, class_name: Option<&str>) {
        let event = WindowEvent {
            package: package.to_string(),
            class_name: class_name.map(str::to_string),
        };
        if self.window_tx.send(event).is_err() {
            tracing::debug!("Foreground tracker not running, window event dropped");
        }
    }

    // ─── Service ────────────────────────────────────────────────────────────

    pub fn is_service_enabled(&self) -> bool {
        self.shared.service_enabled.load(Ordering::SeqCst)
    }

    /// Master switch. Disabled passes run no rules; tasks keep running.
    pub async fn set_service_enabled(&self, enable: bool) {
        self.shared.service_enabled.store(enable, Ordering::SeqCst);
        self.shared.settings.write().await.enable_service = enable;
        tracing::info!(enable, "Service toggled");
    }

    /// Cancel every task and wait for them to finish
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tasks.lock().await.join_all().await;
        tracing::info!("Engine stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.tasks.lock().await.is_running()
    }

    // ─── Subscriptions ──────────────────────────────────────────────────────

    async fn with_registry<T>(
        &self,
        f: impl FnOnce(&mut SubscriptionRegistry) -> Result<T, RegistryError>,
    ) -> Result<T, EngineError> {
        let result = f(&mut *self.shared.registry.write().await)?;
        self.shared.republish().await;
        Ok(result)
    }

    pub async fn import(
        &self,
        doc: SubscriptionRaw,
        update_url: Option<String>,
    ) -> Result<(), EngineError> {
        self.with_registry(|r| r.import(doc, update_url).map(|_| ()))
            .await
    }

    pub async fn import_text(
        &self,
        text: &str,
        update_url: Option<String>,
    ) -> Result<i64, EngineError> {
        let doc = parse_subscription(text)?;
        let id = doc.id;
        self.import(doc, update_url).await?;
        Ok(id)
    }

    pub async fn create_local(&self, name: &str) -> Result<i64, EngineError> {
        self.with_registry(|r| r.create_local(name)).await
    }

    pub async fn remove_subscription(&self, id: i64) -> Result<(), EngineError> {
        self.with_registry(|r| r.remove(id)).await
    }

    pub async fn set_subscription_enabled(&self, id: i64, enable: bool) -> Result<(), EngineError> {
        self.with_registry(|r| r.set_enabled(id, enable)).await
    }

    pub async fn add_groups(
        &self,
        id: i64,
        app_id: &str,
        groups: Vec<GroupRaw>,
    ) -> Result<(), EngineError> {
        self.with_registry(|r| r.add_groups(id, app_id, groups)).await
    }

    pub async fn add_from_source(&self, id: i64, app_id: &str, text: &str) -> Result<(), EngineError> {
        self.with_registry(|r| r.add_from_source(id, app_id, text)).await
    }

    pub async fn edit_group(
        &self,
        id: i64,
        app_id: &str,
        original_key: i32,
        group: GroupRaw,
    ) -> Result<(), EngineError> {
        self.with_registry(|r| r.edit_group(id, app_id, original_key, group))
            .await
    }

    pub async fn delete_group(&self, id: i64, app_id: &str, key: i32) -> Result<(), EngineError> {
        self.with_registry(|r| r.delete_group(id, app_id, key)).await
    }

    pub async fn set_group_enabled(
        &self,
        id: i64,
        app_id: &str,
        key: i32,
        enable: bool,
    ) -> Result<(), EngineError> {
        self.with_registry(|r| r.set_group_enabled(id, app_id, key, enable))
            .await
    }

    pub async fn set_app_enabled(&self, id: i64, app_id: &str, enable: bool) -> Result<(), EngineError> {
        self.with_registry(|r| r.set_app_enabled(id, app_id, enable))
            .await
    }

    pub async fn clear_group_override(&self, id: i64, app_id: &str, key: i32) -> Result<(), EngineError> {
        self.with_registry(|r| r.clear_group_override(id, app_id, key))
            .await
    }

    /// Re-read every document from disk
    pub async fn reload(&self) -> usize {
        let changed = self.shared.registry.write().await.reload_all();
        if changed > 0 {
            self.shared.republish().await;
        }
        changed
    }

    /// Start of the last refresh cycle, or of the engine when none ran yet
    pub async fn last_refresh_ms(&self) -> Option<i64> {
        self.shared.schedule.lock().await.last_refresh_ms()
    }

    /// Run a refresh cycle now, regardless of the schedule
    pub async fn refresh_now(&self) -> RefreshSummary {
        self.shared.refresh(self.platform.fetcher.as_ref()).await
    }

    // ─── One-shot Actions ───────────────────────────────────────────────────

    /// Locate `selector` in a fresh snapshot and act on it once. Returns the
    /// child-index path of the node acted on, or `None` when nothing matched.
    /// Does not touch rule state or click logs.
    pub fn exec_click_action(
        &self,
        selector: &str,
        action: ActionKind,
    ) -> Result<Option<Vec<usize>>, EngineError> {
        let selector = selector::parse(selector)?;
        let tree = self.platform.snapshot.snapshot().ok_or(EngineError::NoSnapshot)?;
        let Some(node) = query_selector(&tree, tree.root(), &selector) else {
            return Ok(None);
        };
        self.platform.executor.perform(&tree, node, action)?;
        Ok(Some(tree.path(node)))
    }

    /// Capture the current screen through the snapshot host
    pub async fn capture_screenshot(&self) -> Result<Screenshot, PlatformError> {
        let shot = self.platform.snapshot.capture_screenshot().await;
        if let Err(e) = &shot {
            tracing::debug!(error = %e, "Screenshot unavailable");
        }
        shot
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

fn ticker(period_ms: u64) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(Duration::from_millis(period_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_foreground_tracker(
    shared: Arc<SharedState>,
    snapshot: Arc<dyn SnapshotSource>,
    oracle: Option<Arc<dyn ForegroundOracle>>,
    mut window_rx: mpsc::UnboundedReceiver<WindowEvent>,
    cancel: CancellationToken,
) {
    let mut tracker = ForegroundTracker::new(oracle);
    let mut ticker = ticker(shared.settings.read().await.foreground_poll_ms);

    loop {
        let changed = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => tracker.poll(snapshot.snapshot().as_ref()),
            _ = shared.foreground_stale.notified() => tracker.poll(snapshot.snapshot().as_ref()),
            Some(event) = window_rx.recv() => {
                tracker.on_window_state_changed(&event.package, event.class_name.as_deref())
            }
        };
        if let Some(top) = changed {
            shared.foreground_tx.send_replace(top);
        }
    }
    tracing::debug!("Foreground tracker stopped");
}

/// Rebuilds the active rule set whenever the foreground app changes
async fn run_rule_set_builder(shared: Arc<SharedState>, cancel: CancellationToken) {
    let mut foreground_rx = shared.foreground_tx.subscribe();
    let mut built_for: Option<Option<String>> = None;

    loop {
        let app_id = foreground_rx.borrow_and_update().app_id.clone();
        if built_for.as_ref() != Some(&app_id) {
            shared.publish_rules(app_id.as_deref()).await;
            built_for = Some(app_id);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = foreground_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Rule set builder stopped");
}

async fn run_evaluation_loop(
    shared: Arc<SharedState>,
    snapshot: Arc<dyn SnapshotSource>,
    mut evaluator: Evaluator,
    cancel: CancellationToken,
) {
    let (scan_ms, backoff_ms) = {
        let settings = shared.settings.read().await;
        (settings.scan_interval_ms, settings.locked_backoff_ms)
    };
    let mut ticker = ticker(scan_ms);
    let rules_rx = shared.rules_tx.subscribe();
    let foreground_rx = shared.foreground_tx.subscribe();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !shared.service_enabled.load(Ordering::SeqCst) {
            continue;
        }
        if snapshot.is_locked() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
            }
            ticker.reset();
            continue;
        }

        let rules = rules_rx.borrow().clone();
        evaluator.adopt(&rules);
        if rules.is_empty() {
            continue;
        }
        let Some(tree) = snapshot.snapshot() else {
            continue;
        };
        // The window moved to another app before the rule set caught up
        let window_app = tree.attrs(tree.root()).package.as_deref();
        if window_app != rules.app_id() {
            tracing::debug!(
                window_app,
                rules_app = rules.app_id(),
                "Rule set is for another app, skipping pass"
            );
            shared.foreground_stale.notify_one();
            continue;
        }
        let foreground = foreground_rx.borrow().clone();

        let pass = std::panic::catch_unwind(AssertUnwindSafe(|| {
            evaluator.run_pass(&rules, &tree, &foreground, now_ms(), || {
                Arc::ptr_eq(&rules, &rules_rx.borrow())
            })
        }));
        match pass {
            Ok(report) if report.fired > 0 || report.failed > 0 => {
                tracing::debug!(
                    fired = report.fired,
                    failed = report.failed,
                    armed = report.armed,
                    "Pass finished"
                );
            }
            Ok(_) => {}
            Err(_) => tracing::error!(app_id = ?rules.app_id(), "Evaluation pass panicked"),
        }
    }
    tracing::debug!("Evaluation loop stopped");
}

async fn run_refresh_loop(
    shared: Arc<SharedState>,
    snapshot: Arc<dyn SnapshotSource>,
    fetcher: Arc<dyn DocumentFetcher>,
    cancel: CancellationToken,
) {
    let mut ticker = ticker(shared.settings.read().await.update_check_interval_ms);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if snapshot.is_locked() {
            continue;
        }
        let settings = shared.settings.read().await.clone();
        if !shared.schedule.lock().await.is_due(&settings, now_ms()) {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.refresh(fetcher.as_ref()) => {}
        }
    }
    tracing::debug!("Refresh loop stopped");
}

async fn run_subscription_watcher(
    shared: Arc<SharedState>,
    mut watcher: SubscriptionWatcher,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = watcher.next_event() => event,
        };

        match event {
            Some(SubscriptionFileEvent::Changed(path)) => {
                let reloaded = shared.registry.write().await.reload_file(&path);
                match reloaded {
                    Ok(true) => shared.republish().await,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to reload subscription"),
                }
            }
            Some(SubscriptionFileEvent::Removed(path)) => {
                tracing::info!(path = %path.display(), "Subscription file removed, keeping loaded document");
            }
            Some(SubscriptionFileEvent::Error(message)) => tracing::warn!("{}", message),
            None => break,
        }
    }
    tracing::debug!("Subscription watcher stopped");
}
