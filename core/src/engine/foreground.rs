//! Foreground app/activity tracking
//!
//! Two inputs keep `TopActivity` current: periodic polls of the snapshot
//! source (the root node's package names the app) and window-state events
//! pushed by the host. The activity id comes from the window class when it
//! is recognizably an activity, otherwise from the optional oracle, otherwise
//! the last known activity of the same app.

use std::sync::Arc;

use crate::node::NodeTree;
use crate::platform::ForegroundOracle;

/// Class-name prefixes of system windows that never name an activity
const FRAMEWORK_PREFIXES: &[&str] = &["android.", "androidx.", "com.android."];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopActivity {
    pub app_id: Option<String>,
    pub activity_id: Option<String>,
}

impl TopActivity {
    pub fn new(app_id: impl Into<String>, activity_id: Option<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            activity_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    /// Class inside the app's own package
    Activity,
    /// Dialogs, toasts and other framework windows
    Framework,
    Other,
}

pub fn classify_window(package: &str, class_name: &str) -> WindowClass {
    if class_name.starts_with(package) {
        WindowClass::Activity
    } else if FRAMEWORK_PREFIXES.iter().any(|p| class_name.starts_with(p)) {
        WindowClass::Framework
    } else {
        WindowClass::Other
    }
}

pub struct ForegroundTracker {
    current: TopActivity,
    oracle: Option<Arc<dyn ForegroundOracle>>,
    /// Class of the last window event that was neither an activity nor a
    /// framework window
    last_event_source: Option<String>,
}

impl ForegroundTracker {
    pub fn new(oracle: Option<Arc<dyn ForegroundOracle>>) -> Self {
        Self {
            current: TopActivity::default(),
            oracle,
            last_event_source: None,
        }
    }

    pub fn current(&self) -> &TopActivity {
        &self.current
    }

    pub fn last_event_source(&self) -> Option<&str> {
        self.last_event_source.as_deref()
    }

    /// Update from a fresh snapshot. Returns the new value when it changed.
    pub fn poll(&mut self, tree: Option<&NodeTree>) -> Option<TopActivity> {
        let tree = tree?;
        let app_id = tree.attrs(tree.root()).package.clone()?;
        let activity_id = self
            .oracle_activity()
            .or_else(|| self.previous_activity(&app_id));

        self.update(TopActivity {
            app_id: Some(app_id),
            activity_id,
        })
    }

    /// Update from a host window-state event
    pub fn on_window_state_changed(
        &mut self,
        package: &str,
        class_name: Option<&str>,
    ) -> Option<TopActivity> {
        let activity_id = match class_name.map(|c| (c, classify_window(package, c))) {
            Some((class, WindowClass::Activity)) => Some(class.to_string()),
            Some((_, WindowClass::Framework)) | None => self.previous_activity(package),
            Some((class, WindowClass::Other)) => {
                self.last_event_source = Some(class.to_string());
                self.oracle_activity()
                    .or_else(|| self.previous_activity(package))
            }
        };

        self.update(TopActivity {
            app_id: Some(package.to_string()),
            activity_id,
        })
    }

    fn oracle_activity(&self) -> Option<String> {
        let oracle = self.oracle.as_ref()?;
        match oracle.activity_id() {
            Ok(activity) => activity,
            Err(e) => {
                tracing::trace!(error = %e, "Foreground oracle unavailable");
                None
            }
        }
    }

    /// Last known activity, kept only while the app stays the same
    fn previous_activity(&self, app_id: &str) -> Option<String> {
        if self.current.app_id.as_deref() == Some(app_id) {
            self.current.activity_id.clone()
        } else {
            None
        }
    }

    fn update(&mut self, next: TopActivity) -> Option<TopActivity> {
        if next == self.current {
            return None;
        }
        tracing::debug!(
            app_id = ?next.app_id,
            activity_id = ?next.activity_id,
            "Foreground changed"
        );
        self.current = next.clone();
        Some(next)
    }
}
