use std::path::{Path, PathBuf};
use std::sync::Arc;

use taprule_core::engine::{Engine, EngineHandle, EnginePlatform};
use taprule_core::platform::{DryRunExecutor, StaticSnapshot};
use taprule_core::storage::{self, FileStore};
use taprule_core::subscription::SubscriptionRegistry;
use taprule_core::{EngineSettings, HttpFetcher, SettingsExt};
use tokio::sync::{Mutex, RwLock};

/// Holds all shared state for the CLI application.
///
/// The CLI has no accessibility host: window snapshots are loaded from JSON
/// files into `snapshot`, and actions are recorded by a dry-run executor.
#[derive(Clone)]
pub struct CliContext {
    pub data_dir: PathBuf,
    pub settings: Arc<RwLock<EngineSettings>>,
    pub engine: EngineHandle,
    pub snapshot: Arc<StaticSnapshot>,
    pub executor: Arc<DryRunExecutor>,
    /// Present until the engine is started
    pending: Arc<Mutex<Option<Engine>>>,
}

impl CliContext {
    /// Open the stores under `data_dir` (platform data directory by default)
    pub fn open(data_dir: Option<PathBuf>) -> Result<Self, String> {
        let settings = EngineSettings::load();
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => storage::data_dir().map_err(|e| e.to_string())?,
        };
        let subscriptions_dir = settings
            .subscriptions_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("subscriptions"));

        let store = Arc::new(FileStore::open(&data_dir).map_err(|e| e.to_string())?);
        let registry = SubscriptionRegistry::open(
            subscriptions_dir,
            store.clone(),
            Some(data_dir.join("overrides.toml")),
        )
        .map_err(|e| e.to_string())?;

        let snapshot = Arc::new(StaticSnapshot::empty());
        let executor = Arc::new(DryRunExecutor::new());
        let platform = EnginePlatform {
            snapshot: snapshot.clone(),
            executor: executor.clone(),
            oracle: None,
            fetcher: Arc::new(HttpFetcher::new().map_err(|e| e.to_string())?),
            click_logs: store,
        };
        let (engine, handle) = Engine::new(settings.clone(), registry, platform);

        Ok(Self {
            data_dir,
            settings: Arc::new(RwLock::new(settings)),
            engine: handle,
            snapshot,
            executor,
            pending: Arc::new(Mutex::new(Some(engine))),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Start the engine's background tasks. Returns false when it was
    /// already started.
    pub async fn start_engine(&self) -> bool {
        match self.pending.lock().await.take() {
            Some(engine) => {
                engine.start().await;
                true
            }
            None => false,
        }
    }
}
