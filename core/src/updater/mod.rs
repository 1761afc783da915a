//! Subscription refresh
//!
//! Remote subscriptions carry an update URL. A refresh cycle fetches each of
//! them in turn and replaces the stored document when the fetched one has the
//! same id and a strictly greater version. Enable overrides live outside the
//! documents and are never touched here.

mod error;
mod fetch;


pub use error::{FetchError, UpdateError};
pub use fetch::{DocumentFetcher, FetchFuture, HttpFetcher};

use taprule_types::{EngineSettings, SubscriptionRaw};
use tokio::sync::RwLock;

use crate::subscription::{RegistryError, SubscriptionRegistry, parse_subscription};

/// A subscription that can be refreshed from the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTarget {
    pub id: i64,
    pub url: String,
    /// Version stored when the cycle started
    pub version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub updated: Vec<i64>,
    pub unchanged: usize,
    pub failed: usize,
}

/// Every loaded subscription with an update URL, in evaluation order
pub fn refresh_targets(registry: &SubscriptionRegistry) -> Vec<RefreshTarget> {
    registry
        .subscriptions()
        .iter()
        .filter_map(|s| {
            s.item.update_url.as_ref().map(|url| RefreshTarget {
                id: s.item.id,
                url: url.clone(),
                version: s.doc.version,
            })
        })
        .collect()
}

/// Parse fetched text and decide whether it may replace `current_version`.
pub fn accept_update(
    id: i64,
    current_version: i64,
    text: &str,
) -> Result<SubscriptionRaw, UpdateError> {
    let doc = parse_subscription(text).map_err(|source| UpdateError::Document { id, source })?;
    if doc.id != id {
        return Err(UpdateError::IdMismatch {
            expected: id,
            found: doc.id,
        });
    }
    if doc.version <= current_version {
        return Err(UpdateError::NotNewer {
            id,
            current: current_version,
            fetched: doc.version,
        });
    }
    Ok(doc)
}

/// Fetch one subscription and make the new document authoritative.
pub async fn refresh_one(
    registry: &RwLock<SubscriptionRegistry>,
    fetcher: &dyn DocumentFetcher,
    target: &RefreshTarget,
) -> Result<i64, UpdateError> {
    let text = fetcher.fetch(&target.url).await?;
    accept_update(target.id, target.version, &text)?;

    let mut registry = registry.write().await;
    // The document may have changed while the fetch was in flight
    let current = registry
        .get(target.id)
        .map(|s| s.doc.version)
        .ok_or(RegistryError::UnknownSubscription { id: target.id })?;
    let doc = accept_update(target.id, current, &text)?;
    let version = doc.version;
    let update_url = doc.update_url.clone();
    registry.replace_document(target.id, doc, update_url)?;

    tracing::info!(id = target.id, from = current, to = version, "Subscription updated");
    Ok(version)
}

/// Refresh every target sequentially. Failures are logged per subscription
/// and never stop the cycle.
pub async fn refresh_all(
    registry: &RwLock<SubscriptionRegistry>,
    fetcher: &dyn DocumentFetcher,
) -> RefreshSummary {
    let targets = refresh_targets(&*registry.read().await);
    let mut summary = RefreshSummary::default();

    for target in &targets {
        match refresh_one(registry, fetcher, target).await {
            Ok(_) => summary.updated.push(target.id),
            Err(UpdateError::NotNewer { id, current, fetched }) => {
                tracing::debug!(id, current, fetched, "Subscription up to date");
                summary.unchanged += 1;
            }
            Err(e) => {
                tracing::warn!(id = target.id, url = %target.url, error = %e, "Subscription refresh failed");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        checked = targets.len(),
        updated = summary.updated.len(),
        failed = summary.failed,
        "Refresh cycle finished"
    );
    summary
}

/// Gate for the periodic refresh task
#[derive(Debug, Clone, Default)]
pub struct RefreshSchedule {
    last_refresh_ms: Option<i64>,
}

impl RefreshSchedule {
    pub fn last_refresh_ms(&self) -> Option<i64> {
        self.last_refresh_ms
    }

    /// False while refresh is paused or the minimum interval has not elapsed
    pub fn is_due(&self, settings: &EngineSettings, now: i64) -> bool {
        let Some(interval) = settings.effective_update_interval_ms() else {
            return false;
        };
        self.last_refresh_ms
            .is_none_or(|last| now.saturating_sub(last) >= interval)
    }

    pub fn mark(&mut self, now: i64) {
        self.last_refresh_ms = Some(now);
    }
}
