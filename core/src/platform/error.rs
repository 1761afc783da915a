//! Error types reported by platform bridges

use thiserror::Error;

/// The action could not be performed. The rule is not counted as fired.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionExecutionError {
    #[error("target node has empty bounds")]
    EmptyBounds,

    #[error("target node is no longer on screen")]
    StaleNode,

    #[error("action rejected by host: {reason}")]
    Rejected { reason: String },
}

/// The foreground oracle cannot answer right now. Treated as "unknown".
#[derive(Debug, Clone, PartialEq, Error)]
#[error("foreground oracle unavailable: {reason}")]
pub struct OracleUnavailableError {
    pub reason: String,
}

/// A host capability failed or does not exist on this platform
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlatformError {
    #[error("not supported on this platform")]
    Unsupported,

    #[error("screen capture failed: {reason}")]
    CaptureFailed { reason: String },
}
