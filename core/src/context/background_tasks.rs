use tokio::task::JoinHandle;

/// Handles of the engine's periodic tasks
#[derive(Default)]
pub struct BackgroundTasks {
    pub foreground: Option<JoinHandle<()>>,
    pub rule_set: Option<JoinHandle<()>>,
    pub evaluation: Option<JoinHandle<()>>,
    pub refresh: Option<JoinHandle<()>>,
    pub watcher: Option<JoinHandle<()>>,
    pub click_log: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn is_running(&self) -> bool {
        self.handles().any(Option::is_some)
    }

    /// Wait for every task to finish after cancellation. The click log writer
    /// goes last so logs from the final pass are flushed.
    pub async fn join_all(&mut self) {
        for (name, slot) in [
            ("foreground", &mut self.foreground),
            ("rule_set", &mut self.rule_set),
            ("evaluation", &mut self.evaluation),
            ("refresh", &mut self.refresh),
            ("watcher", &mut self.watcher),
            ("click_log", &mut self.click_log),
        ] {
            if let Some(handle) = slot.take()
                && let Err(e) = handle.await
            {
                tracing::error!(task = name, error = %e, "Background task ended abnormally");
            }
        }
    }

    fn handles(&self) -> impl Iterator<Item = &Option<JoinHandle<()>>> {
        [
            &self.foreground,
            &self.rule_set,
            &self.evaluation,
            &self.refresh,
            &self.watcher,
            &self.click_log,
        ]
        .into_iter()
    }
}
