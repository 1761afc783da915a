//! Error types for settings persistence

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load engine settings")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save engine settings")]
    Save(#[source] confy::ConfyError),

    #[error("cannot locate the settings file")]
    Locate(#[source] confy::ConfyError),
}
