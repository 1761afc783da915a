//! In-process platform implementations
//!
//! `StaticSnapshot` replays a saved tree, `DryRunExecutor` records actions
//! instead of performing them. Used by the CLI and by tests.

use std::sync::{Arc, Mutex, RwLock};

use taprule_types::ActionKind;

use super::{
    ActionExecutionError, ActionExecutor, ForegroundOracle, OracleUnavailableError, PlatformError,
    Screenshot, ScreenshotFuture, SnapshotSource, tap_point,
};
use crate::node::{NodeId, NodeTree};

/// Serves a swappable fixed tree, and optionally a fixed screenshot.
#[derive(Debug, Default)]
pub struct StaticSnapshot {
    tree: RwLock<Option<Arc<NodeTree>>>,
    locked: RwLock<bool>,
    screenshot: RwLock<Option<Screenshot>>,
}

impl StaticSnapshot {
    pub fn new(tree: NodeTree) -> Self {
        Self {
            tree: RwLock::new(Some(Arc::new(tree))),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set_tree(&self, tree: Option<NodeTree>) {
        if let Ok(mut slot) = self.tree.write() {
            *slot = tree.map(Arc::new);
        }
    }

    pub fn set_locked(&self, locked: bool) {
        if let Ok(mut slot) = self.locked.write() {
            *slot = locked;
        }
    }

    /// Image served by `capture_screenshot`; `None` makes capture unsupported
    pub fn set_screenshot(&self, screenshot: Option<Screenshot>) {
        if let Ok(mut slot) = self.screenshot.write() {
            *slot = screenshot;
        }
    }
}

impl SnapshotSource for StaticSnapshot {
    fn snapshot(&self) -> Option<NodeTree> {
        let slot = self.tree.read().ok()?;
        slot.as_deref().cloned()
    }

    fn is_locked(&self) -> bool {
        self.locked.read().map(|l| *l).unwrap_or(false)
    }

    fn capture_screenshot(&self) -> ScreenshotFuture<'_> {
        let captured = match self.screenshot.read() {
            Ok(slot) => slot.clone().ok_or(PlatformError::Unsupported),
            Err(_) => Err(PlatformError::CaptureFailed {
                reason: "screenshot slot poisoned".to_string(),
            }),
        };
        Box::pin(async move { captured })
    }
}

/// One recorded action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformedAction {
    /// Child-index path of the target node
    pub path: Vec<usize>,
    pub action: ActionKind,
    pub point: Option<(i64, i64)>,
    /// Package of the window the action landed in
    pub package: Option<String>,
}

/// Records actions instead of dispatching them.
///
/// Tap-style actions on nodes with empty bounds fail the way a real host
/// fails, so delay and retry logic behaves as it would on a device.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    performed: Mutex<Vec<PerformedAction>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn performed(&self) -> Vec<PerformedAction> {
        self.performed.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ActionExecutor for DryRunExecutor {
    fn perform(
        &self,
        tree: &NodeTree,
        node: NodeId,
        action: ActionKind,
    ) -> Result<(), ActionExecutionError> {
        if node.index() >= tree.len() {
            return Err(ActionExecutionError::StaleNode);
        }

        let point = tap_point(tree, node);
        match action {
            ActionKind::TapCenter | ActionKind::TapNode if point.is_none() => {
                return Err(ActionExecutionError::EmptyBounds);
            }
            _ => {}
        }

        tracing::info!(
            path = ?tree.path(node),
            action = action.as_str(),
            point = ?point,
            "Dry-run action"
        );
        self.performed
            .lock()
            .map_err(|_| ActionExecutionError::Rejected {
                reason: "recorder poisoned".to_string(),
            })?
            .push(PerformedAction {
                path: tree.path(node),
                action,
                point,
                package: tree.attrs(tree.root()).package.clone(),
            });
        Ok(())
    }
}

/// Oracle with a fixed answer, or always unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticForeground {
    pub activity_id: Option<String>,
    pub available: bool,
}

impl ForegroundOracle for StaticForeground {
    fn activity_id(&self) -> Result<Option<String>, OracleUnavailableError> {
        if !self.available {
            return Err(OracleUnavailableError {
                reason: "no privileged channel".to_string(),
            });
        }
        Ok(self.activity_id.clone())
    }
}
