//! Platform seams
//!
//! The engine never talks to an accessibility host directly. A host bridge
//! implements these traits; the crate ships in-process implementations for
//! replaying saved snapshots and for dry runs.

mod error;
mod replay;

pub use error::{ActionExecutionError, OracleUnavailableError, PlatformError};
pub use replay::{DryRunExecutor, PerformedAction, StaticForeground, StaticSnapshot};

use std::future::Future;
use std::pin::Pin;

use taprule_types::ActionKind;

use crate::node::{NodeId, NodeTree};

pub type ScreenshotFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Screenshot, PlatformError>> + Send + 'a>>;

/// Encoded image of the whole screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Provides the current foreground window as a node tree.
pub trait SnapshotSource: Send + Sync {
    /// Fresh snapshot of the active window, `None` when nothing is available.
    /// Implementations must not cache across calls.
    fn snapshot(&self) -> Option<NodeTree>;

    /// Whether the screen is locked; passes are skipped while it is
    fn is_locked(&self) -> bool {
        false
    }

    /// Capture the screen. Hosts without a capture API keep the default.
    fn capture_screenshot(&self) -> ScreenshotFuture<'_> {
        Box::pin(async { Err(PlatformError::Unsupported) })
    }
}

/// Performs synthetic input on a located node.
pub trait ActionExecutor: Send + Sync {
    fn perform(
        &self,
        tree: &NodeTree,
        node: NodeId,
        action: ActionKind,
    ) -> Result<(), ActionExecutionError>;
}

/// Privileged source of the foreground activity id. Optional.
pub trait ForegroundOracle: Send + Sync {
    fn activity_id(&self) -> Result<Option<String>, OracleUnavailableError>;
}

/// Screen point a tap-style action aims at, `None` for empty bounds.
pub fn tap_point(tree: &NodeTree, node: NodeId) -> Option<(i64, i64)> {
    let bounds = tree.attrs(node).bounds;
    if bounds.width() <= 0 || bounds.height() <= 0 {
        return None;
    }
    Some(bounds.center())
}
