//! Queue replay against the remote service.
//!
//! A reconciliation pass snapshots the pending-change queue, sends every
//! entry in ascending id order, clears the queue according to the
//! [`ClearPolicy`] and finally refreshes server-owned reference data.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::models::{PendingChange, QueueEntry};
use crate::network::NetworkMonitor;
use crate::remote::{RemoteRequest, RemoteService};
use crate::services::Store;
use crate::util::now_millis;
use crate::{Error, Result};

/// What happens to entries whose replay failed once a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClearPolicy {
    /// Clear every entry the pass attempted, failed ones included.
    #[default]
    ClearAll,
    /// Clear only acknowledged entries; failed ones wait for the next pass.
    RetainFailed,
}

impl fmt::Display for ClearPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClearAll => f.write_str("clear-all"),
            Self::RetainFailed => f.write_str("retain-failed"),
        }
    }
}

impl FromStr for ClearPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear-all" | "clear_all" => Ok(Self::ClearAll),
            "retain-failed" | "retain_failed" => Ok(Self::RetainFailed),
            other => Err(Error::InvalidInput(format!(
                "clear policy must be clear-all or retain-failed, got '{other}'"
            ))),
        }
    }
}

/// Summary of one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Entries in the snapshot
    pub attempted: usize,
    /// Entries the server acknowledged
    pub succeeded: usize,
    /// Queue ids whose replay failed
    pub failed: Vec<i64>,
    /// Rows removed from the queue
    pub cleared: u64,
    /// Whether weather and market prices were both refreshed
    pub reference_refreshed: bool,
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The device is offline; nothing was touched.
    Offline,
    /// Another pass on the same reconciler is in flight.
    AlreadyRunning,
    Completed(SyncReport),
    /// The pass aborted, e.g. the queue could not be read.
    Failed(Error),
}

impl ReconcileOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Releases the in-flight flag when the pass ends, however it ends.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drains the pending-change queue against a remote service.
///
/// At most one pass runs at a time per reconciler; separate reconcilers do
/// not share the flag.
pub struct Reconciler<R> {
    store: Store,
    network: NetworkMonitor,
    remote: R,
    policy: ClearPolicy,
    in_flight: AtomicBool,
    last_pass_failed: AtomicBool,
}

impl<R: RemoteService> Reconciler<R> {
    pub const fn new(store: Store, network: NetworkMonitor, remote: R, policy: ClearPolicy) -> Self {
        Self {
            store,
            network,
            remote,
            policy,
            in_flight: AtomicBool::new(false),
            last_pass_failed: AtomicBool::new(false),
        }
    }

    pub const fn policy(&self) -> ClearPolicy {
        self.policy
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether the most recent pass aborted.
    pub fn last_pass_failed(&self) -> bool {
        self.last_pass_failed.load(Ordering::Acquire)
    }

    /// Run a pass; true when it completed.
    ///
    /// Per-entry send failures do not make a pass fail.
    pub async fn reconcile(&self) -> bool {
        self.reconcile_detailed().await.is_success()
    }

    /// Run a pass and report what happened.
    pub async fn reconcile_detailed(&self) -> ReconcileOutcome {
        if !self.network.is_online() {
            tracing::debug!("Skipping sync: offline");
            return ReconcileOutcome::Offline;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Skipping sync: a pass is already running");
            return ReconcileOutcome::AlreadyRunning;
        };

        match self.run_pass().await {
            Ok(report) => {
                self.last_pass_failed.store(false, Ordering::Release);
                tracing::info!(
                    attempted = report.attempted,
                    succeeded = report.succeeded,
                    failed = report.failed.len(),
                    cleared = report.cleared,
                    "Sync pass finished"
                );
                ReconcileOutcome::Completed(report)
            }
            Err(error) => {
                self.last_pass_failed.store(true, Ordering::Release);
                tracing::error!("Sync pass failed: {error}");
                ReconcileOutcome::Failed(error)
            }
        }
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        let entries = self.store.queue_snapshot().await?;
        let mut report = SyncReport {
            attempted: entries.len(),
            ..SyncReport::default()
        };

        let mut acknowledged = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.replay(entry).await {
                Ok(()) => {
                    acknowledged.push(entry.id);
                    report.succeeded += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        entry = entry.id,
                        action = entry.change.action(),
                        "Failed to sync queued change: {error}"
                    );
                    report.failed.push(entry.id);
                }
            }
        }

        report.cleared = match (self.policy, entries.last()) {
            (_, None) => 0,
            (ClearPolicy::ClearAll, Some(last)) => {
                if !report.failed.is_empty() {
                    tracing::warn!(
                        "Clearing {} failed change(s) from the queue without retry: {:?}",
                        report.failed.len(),
                        report.failed
                    );
                }
                self.store.clear_queue_through(last.id).await?
            }
            (ClearPolicy::RetainFailed, Some(_)) => {
                self.store.remove_queue_entries(&acknowledged).await?
            }
        };

        report.reference_refreshed = self.refresh_reference_data().await;
        Ok(report)
    }

    async fn replay(&self, entry: &QueueEntry) -> Result<()> {
        let request = RemoteRequest::for_change(&entry.change)?;
        self.remote.send(&request).await?;
        tracing::debug!(entry = entry.id, "Sent {request}");

        if let Err(error) = self.acknowledge(&entry.change).await {
            tracing::warn!(entry = entry.id, "Could not mark record as synced: {error}");
        }
        Ok(())
    }

    async fn acknowledge(&self, change: &PendingChange) -> Result<bool> {
        match change {
            PendingChange::CreateCrop(crop) | PendingChange::UpdateCrop(crop) => {
                self.store.mark_synced(crop).await
            }
            PendingChange::CreateLivestock(livestock)
            | PendingChange::UpdateLivestock(livestock) => self.store.mark_synced(livestock).await,
            PendingChange::CreateActivity(activity) | PendingChange::UpdateActivity(activity) => {
                self.store.mark_synced(activity).await
            }
            PendingChange::CreateTransaction(tx) | PendingChange::UpdateTransaction(tx) => {
                self.store.mark_synced(tx).await
            }
        }
    }

    /// Overwrite local weather and market prices with the server's copy.
    ///
    /// Failures are logged; returns whether both refreshed.
    pub async fn refresh_reference_data(&self) -> bool {
        let weather = self.refresh_weather().await;
        if let Err(error) = &weather {
            tracing::warn!("Failed to refresh weather: {error}");
        }
        let prices = self.refresh_market_prices().await;
        if let Err(error) = &prices {
            tracing::warn!("Failed to refresh market prices: {error}");
        }
        weather.is_ok() && prices.is_ok()
    }

    async fn refresh_weather(&self) -> Result<()> {
        let report = self.remote.fetch_weather().await?;
        self.store.put(&report.into_snapshot(now_millis())).await
    }

    async fn refresh_market_prices(&self) -> Result<()> {
        let prices = self.remote.fetch_market_prices().await?;
        let timestamp = now_millis();
        for mut price in prices {
            price.timestamp = timestamp;
            self.store.put(&price).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Crop, MarketPrice, RecordKey, WeatherSnapshot, CURRENT_WEATHER_ID,
    };
    use crate::network::NetworkStatus;
    use crate::remote::{Method, MockRemote, RemoteCall};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    async fn setup(policy: ClearPolicy) -> (Reconciler<MockRemote>, Store, NetworkMonitor, MockRemote) {
        let store = Store::open_in_memory().await.unwrap();
        let network = NetworkMonitor::new(NetworkStatus::online());
        let remote = MockRemote::new();
        let reconciler = Reconciler::new(store.clone(), network.clone(), remote.clone(), policy);
        (reconciler, store, network, remote)
    }

    fn maize(status: &str) -> Crop {
        let mut crop = Crop::new("Maize", 5.0, "2024-03-15", status, 85).with_id(42);
        crop.sync.touch();
        crop
    }

    async fn enqueue_three(store: &Store) -> Vec<i64> {
        let mut ids = Vec::new();
        for change in [
            PendingChange::CreateCrop(maize("Planted")),
            PendingChange::UpdateCrop(maize("Growing")),
            PendingChange::UpdateCrop(maize("Harvested")),
        ] {
            ids.push(store.enqueue(&change).await.unwrap().id);
        }
        ids
    }

    #[test]
    fn clear_policy_parses_and_defaults_to_clear_all() {
        assert_eq!(ClearPolicy::default(), ClearPolicy::ClearAll);
        assert_eq!(
            "retain-failed".parse::<ClearPolicy>().unwrap(),
            ClearPolicy::RetainFailed
        );
        assert_eq!(ClearPolicy::RetainFailed.to_string(), "retain-failed");
        assert!("keep-some".parse::<ClearPolicy>().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_pass_has_no_side_effects() {
        let (reconciler, store, network, remote) = setup(ClearPolicy::ClearAll).await;
        network.set_online(false);
        store
            .enqueue(&PendingChange::CreateCrop(maize("Growing")))
            .await
            .unwrap();

        assert!(!reconciler.reconcile().await);
        assert!(remote.calls().is_empty());
        assert_eq!(store.queue_len().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entries_are_replayed_in_enqueue_order() {
        let (reconciler, store, _network, remote) = setup(ClearPolicy::ClearAll).await;
        enqueue_three(&store).await;

        assert!(reconciler.reconcile().await);

        let sent = remote.sent_requests();
        let statuses: Vec<&str> = sent
            .iter()
            .map(|request| request.body["status"].as_str().unwrap())
            .collect();
        assert_eq!(statuses, vec!["Planted", "Growing", "Harvested"]);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, "/crops");
        assert_eq!(sent[1].method, Method::Put);
        assert_eq!(sent[1].path, "/crops/42");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_entry_is_still_cleared_under_clear_all() {
        let (reconciler, store, _network, remote) = setup(ClearPolicy::ClearAll).await;
        let ids = enqueue_three(&store).await;
        remote.fail_send_number(2);

        let ReconcileOutcome::Completed(report) = reconciler.reconcile_detailed().await else {
            panic!("pass should complete");
        };

        assert_eq!(remote.sent_requests().len(), 3);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, vec![ids[1]]);
        assert_eq!(report.cleared, 3);
        assert_eq!(store.queue_len().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_entry_is_kept_under_retain_failed() {
        let (reconciler, store, _network, remote) = setup(ClearPolicy::RetainFailed).await;
        let ids = enqueue_three(&store).await;
        remote.fail_send_number(2);

        assert!(reconciler.reconcile().await);

        let remaining: Vec<i64> = store
            .queue_snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(remaining, vec![ids[1]]);

        assert!(reconciler.reconcile().await);
        assert_eq!(store.queue_len().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pass_refreshes_reference_data() {
        let (reconciler, store, _network, _remote) = setup(ClearPolicy::ClearAll).await;

        assert!(reconciler.reconcile().await);

        let weather: WeatherSnapshot = store
            .get(&RecordKey::from(CURRENT_WEATHER_ID))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(weather.temperature, 24.0);
        assert_eq!(weather.humidity, 68.0);
        assert!(weather.timestamp > 0);

        let prices: Vec<MarketPrice> = store.get_all().await.unwrap();
        assert_eq!(prices.len(), 4);
        assert!(prices.iter().all(|price| price.timestamp > 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_queue_only_fetches_reference_data() {
        let (reconciler, _store, _network, remote) = setup(ClearPolicy::ClearAll).await;

        assert!(reconciler.reconcile().await);
        assert!(reconciler.reconcile().await);

        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::FetchWeather,
                RemoteCall::FetchMarketPrices,
                RemoteCall::FetchWeather,
                RemoteCall::FetchMarketPrices,
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reference_fetch_failure_does_not_fail_pass() {
        let (reconciler, store, _network, remote) = setup(ClearPolicy::ClearAll).await;
        store
            .enqueue(&PendingChange::CreateCrop(maize("Growing")))
            .await
            .unwrap();
        remote.set_unreachable(true);

        let ReconcileOutcome::Completed(report) = reconciler.reconcile_detailed().await else {
            panic!("pass should complete");
        };
        assert!(!report.reference_refreshed);
        assert_eq!(report.failed.len(), 1);
        assert!(!reconciler.last_pass_failed());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn acknowledged_record_is_marked_synced() {
        let (reconciler, store, _network, _remote) = setup(ClearPolicy::ClearAll).await;
        let crop = maize("Growing");
        store.put(&crop).await.unwrap();
        store
            .enqueue(&PendingChange::CreateCrop(crop))
            .await
            .unwrap();

        assert!(reconciler.reconcile().await);

        let stored: Crop = store.get(&RecordKey::Int(42)).await.unwrap().unwrap();
        assert!(stored.sync.synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_calls_run_a_single_pass() {
        let (reconciler, store, _network, remote) = setup(ClearPolicy::ClearAll).await;
        let reconciler = Arc::new(reconciler);
        store
            .enqueue(&PendingChange::CreateCrop(maize("Growing")))
            .await
            .unwrap();
        remote.set_send_delay(Some(Duration::from_millis(200)));

        let first = tokio::spawn({
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.reconcile_detailed().await }
        });
        while remote.sent_requests().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(reconciler.is_running());

        let second = reconciler.reconcile_detailed().await;
        assert!(matches!(second, ReconcileOutcome::AlreadyRunning));

        assert!(first.await.unwrap().is_success());
        assert_eq!(remote.sent_requests().len(), 1);
        assert!(!reconciler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entries_enqueued_during_a_pass_survive_it() {
        let (reconciler, store, _network, remote) = setup(ClearPolicy::ClearAll).await;
        let reconciler = Arc::new(reconciler);
        store
            .enqueue(&PendingChange::CreateCrop(maize("Growing")))
            .await
            .unwrap();
        remote.set_send_delay(Some(Duration::from_millis(200)));

        let pass = tokio::spawn({
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.reconcile().await }
        });
        while remote.sent_requests().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let late = store
            .enqueue(&PendingChange::UpdateCrop(maize("Harvested")))
            .await
            .unwrap();

        assert!(pass.await.unwrap());
        let remaining = store.queue_snapshot().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, late.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn separate_reconcilers_do_not_share_the_flag() {
        let (first, store, network, remote) = setup(ClearPolicy::ClearAll).await;
        let second = Reconciler::new(store, network, remote.clone(), ClearPolicy::ClearAll);
        let _guard = InFlightGuard::acquire(&first.in_flight).unwrap();

        assert!(matches!(
            first.reconcile_detailed().await,
            ReconcileOutcome::AlreadyRunning
        ));
        assert!(second.reconcile().await);
    }
}
