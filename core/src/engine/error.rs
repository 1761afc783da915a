//! Error types for engine operations

use thiserror::Error;

use crate::platform::ActionExecutionError;
use crate::selector::SelectorSyntaxError;
use crate::subscription::{DocumentError, RegistryError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid subscription document")]
    Document(#[from] DocumentError),

    #[error("invalid selector")]
    Selector(#[from] SelectorSyntaxError),

    #[error("no window snapshot available")]
    NoSnapshot,

    #[error(transparent)]
    Action(#[from] ActionExecutionError),
}
