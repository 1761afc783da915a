mod background_tasks;
mod config;
mod error;

pub use background_tasks::BackgroundTasks;
pub use config::{EngineSettings, MIN_UPDATE_SUBS_INTERVAL_MS, SettingsExt};
pub use error::ConfigError;
