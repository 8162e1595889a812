//! Application façade: the only entry point front ends use.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;

use super::Store;
use crate::models::{
    MarketPrice, QueueEntry, Record, RecordKey, Tracked, WeatherSnapshot, CURRENT_WEATHER_ID,
};
use crate::network::{is_slow, NetworkMonitor, NetworkStatus, Subscription};
use crate::remote::RemoteService;
use crate::state::SyncState;
use crate::sync::{ClearPolicy, ReconcileOutcome, Reconciler};
use crate::{Error, Result};

/// Result of [`FarmService::create_or_update`].
///
/// The record is always returned, even when it could not be persisted.
#[derive(Debug)]
pub struct Saved<T> {
    /// The stamped record as the caller should now display it
    pub record: T,
    /// Queue entry mirroring the change, `None` when storage failed
    pub queued: Option<QueueEntry>,
    /// Non-fatal storage failure, already logged
    pub storage_error: Option<Error>,
    /// Whether an immediate reconciliation pass completed
    pub reconciled: bool,
}

/// Reads and writes farm records and keeps them flowing to the server.
pub struct FarmService<R: RemoteService> {
    store: Store,
    network: NetworkMonitor,
    reconciler: Arc<Reconciler<R>>,
    auto_sync: Mutex<Option<Subscription>>,
}

impl<R: RemoteService> FarmService<R> {
    pub fn new(store: Store, network: NetworkMonitor, remote: R, policy: ClearPolicy) -> Self {
        let reconciler = Reconciler::new(store.clone(), network.clone(), remote, policy);
        Self {
            store,
            network,
            reconciler: Arc::new(reconciler),
            auto_sync: Mutex::new(None),
        }
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub const fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn reconciler(&self) -> &Reconciler<R> {
        &self.reconciler
    }

    /// Save a record locally and queue it for the server.
    ///
    /// Stamps `lastModified`, clears `synced`, writes the record, enqueues a
    /// create (new key) or update (known key) and, when online, runs a
    /// reconciliation pass right away. The write and the queue entry land
    /// together or not at all. Storage failures come back in
    /// [`Saved::storage_error`]; anything else (validation, encoding) is `Err`.
    pub async fn create_or_update<T: Tracked>(&self, mut record: T) -> Result<Saved<T>> {
        record.validate()?;
        record.sync_meta_mut().touch();

        let queued = match self.store.save_and_enqueue(&record).await {
            Ok(entry) => entry,
            Err(error) if error.is_storage_unavailable() => {
                let collection = T::COLLECTION;
                let key = record.key();
                tracing::error!(%collection, %key, "Failed to save record locally: {error}");
                return Ok(Saved {
                    record,
                    queued: None,
                    storage_error: Some(error),
                    reconciled: false,
                });
            }
            Err(error) => return Err(error),
        };

        let reconciled = if self.network.is_online() {
            self.reconciler.reconcile().await
        } else {
            tracing::debug!("Offline: {} stays queued", queued.change.action());
            false
        };

        Ok(Saved {
            record,
            queued: Some(queued),
            storage_error: None,
            reconciled,
        })
    }

    pub async fn get<T: Record>(&self, key: impl Into<RecordKey>) -> Result<Option<T>> {
        self.store.get(&key.into()).await
    }

    pub async fn list<T: Record>(&self) -> Result<Vec<T>> {
        self.store.get_all().await
    }

    /// Remove a record from the local store only; deletes are not replayed.
    pub async fn delete<T: Record>(&self, key: impl Into<RecordKey>) -> Result<bool> {
        self.store.delete::<T>(&key.into()).await
    }

    /// Last weather snapshot pulled from the server.
    pub async fn weather(&self) -> Result<Option<WeatherSnapshot>> {
        self.store.get(&RecordKey::from(CURRENT_WEATHER_ID)).await
    }

    pub async fn market_prices(&self) -> Result<Vec<MarketPrice>> {
        self.store.get_all().await
    }

    /// Queued changes in replay order.
    pub async fn pending_changes(&self) -> Result<Vec<QueueEntry>> {
        self.store.queue_snapshot().await
    }

    /// Manual "sync now". Returns false without doing anything while offline.
    pub async fn sync(&self) -> bool {
        if !self.network.is_online() {
            tracing::debug!("Sync requested while offline");
            return false;
        }
        self.reconciler.reconcile().await
    }

    /// Like [`Self::sync`] but with the pass report.
    pub async fn sync_detailed(&self) -> ReconcileOutcome {
        if !self.network.is_online() {
            return ReconcileOutcome::Offline;
        }
        self.reconciler.reconcile_detailed().await
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.network.current_status()
    }

    pub fn is_slow_connection(&self) -> bool {
        is_slow(&self.network.current_status())
    }

    pub async fn sync_state(&self) -> SyncState {
        if !self.network.is_online() {
            return SyncState::Offline;
        }
        if self.reconciler.is_running() {
            return SyncState::Syncing;
        }
        if self.reconciler.last_pass_failed() {
            return SyncState::Error;
        }
        match self.store.queue_len().await {
            Ok(0) => SyncState::Synced,
            Ok(_) => SyncState::Pending,
            Err(error) => {
                tracing::warn!("Could not read the sync queue: {error}");
                SyncState::Error
            }
        }
    }

    /// Reconcile whenever the device comes back online.
    ///
    /// Passes run on the current tokio runtime. Also starts a pass right away
    /// when already online. Calling again replaces the previous subscription.
    pub fn start_auto_sync(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|error| {
            Error::InvalidInput(format!("auto sync needs a tokio runtime: {error}"))
        })?;

        let on_online = {
            let reconciler = Arc::clone(&self.reconciler);
            let handle = handle.clone();
            move || {
                tracing::info!("Back online, syncing queued changes");
                let reconciler = Arc::clone(&reconciler);
                handle.spawn(async move {
                    reconciler.reconcile().await;
                });
            }
        };
        let subscription = self.network.subscribe(on_online, || {
            tracing::info!("Offline, changes will be queued");
        });
        *self
            .auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        if self.network.is_online() {
            let reconciler = Arc::clone(&self.reconciler);
            handle.spawn(async move {
                reconciler.reconcile().await;
            });
        }
        Ok(())
    }

    pub fn stop_auto_sync(&self) {
        let subscription = self
            .auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    pub fn is_auto_sync_active(&self) -> bool {
        self.auto_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Subscription::is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Activity, Crop, Livestock, Transaction, TransactionKind, Trend, WeatherReport,
    };
    use crate::remote::{Method, MockRemote, RemoteCall};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    async fn service(online: bool) -> (FarmService<MockRemote>, MockRemote) {
        let store = Store::open_in_memory().await.unwrap();
        let status = if online {
            NetworkStatus::online()
        } else {
            NetworkStatus::offline()
        };
        let remote = MockRemote::new();
        let service = FarmService::new(
            store,
            NetworkMonitor::new(status),
            remote.clone(),
            ClearPolicy::ClearAll,
        );
        (service, remote)
    }

    fn maize() -> Crop {
        Crop::new("Maize", 5.0, "2024-03-15", "Growing", 85).with_id(42)
    }

    async fn wait_for(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_write_is_stored_and_queued() {
        let (service, remote) = service(false).await;

        let saved = service.create_or_update(maize()).await.unwrap();
        assert!(saved.storage_error.is_none());
        assert!(!saved.reconciled);
        assert!(!saved.record.sync.synced);
        assert!(saved.record.sync.last_modified > 0);

        let queued = saved.queued.unwrap();
        assert_eq!(queued.change.action(), "create-crop");
        assert_eq!(service.get::<Crop>(42).await.unwrap(), Some(saved.record));
        assert_eq!(service.pending_changes().await.unwrap().len(), 1);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_failure_returns_record_and_leaves_nothing_half_saved() {
        let (service, remote) = service(false).await;
        service.store().run_sql("DROP TABLE pending_sync").await.unwrap();

        let saved = service.create_or_update(maize()).await.unwrap();
        assert!(saved.storage_error.unwrap().is_storage_unavailable());
        assert!(saved.queued.is_none());
        assert!(!saved.reconciled);
        assert_eq!(saved.record.name, "Maize");
        assert!(saved.record.sync.last_modified > 0);
        assert_eq!(service.get::<Crop>(42).await.unwrap(), None);

        service
            .store()
            .run_sql(
                "CREATE TABLE pending_sync (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    action TEXT NOT NULL,
                    change TEXT NOT NULL,
                    enqueued_at INTEGER NOT NULL
                )",
            )
            .await
            .unwrap();
        let retried = service.create_or_update(saved.record).await.unwrap();
        assert_eq!(retried.queued.unwrap().change.action(), "create-crop");

        service.network().set_online(true);
        assert!(service.sync().await);
        assert_eq!(remote.sent_requests().len(), 1);
        let stored: Crop = service.get(42).await.unwrap().unwrap();
        assert!(stored.sync.synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_write_of_same_record_queues_update() {
        let (service, _remote) = service(false).await;

        let first = service.create_or_update(maize()).await.unwrap();
        let mut edited = first.record.clone();
        edited.status = "Flowering".into();
        let second = service.create_or_update(edited).await.unwrap();

        assert!(second.record.sync.last_modified > first.record.sync.last_modified);
        let actions: Vec<&str> = service
            .pending_changes()
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.change.action())
            .collect();
        assert_eq!(actions, vec!["create-crop", "update-crop"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_record_is_rejected_before_saving() {
        let (service, _remote) = service(false).await;

        let error = service
            .create_or_update(Livestock::new("", 0, "", "Good"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(service.pending_changes().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_write_flushes_immediately() {
        let (service, remote) = service(true).await;

        let saved = service
            .create_or_update(
                Transaction::new(TransactionKind::Credit, 12_000.0, "Tomato sales", "2024-06-25")
                    .with_method("M-Pesa"),
            )
            .await
            .unwrap();

        assert!(saved.reconciled);
        assert!(service.pending_changes().await.unwrap().is_empty());
        let sent = remote.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path, "/transactions");

        let stored: Transaction = service.get(saved.record.id).await.unwrap().unwrap();
        assert!(stored.sync.synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_writes_drain_after_reconnect() {
        let (service, remote) = service(false).await;

        let saved = service.create_or_update(maize()).await.unwrap();
        service
            .create_or_update(Activity::new("2024-06-28", "Weeding").with_cost(2_000.0))
            .await
            .unwrap();
        assert_eq!(service.pending_changes().await.unwrap().len(), 2);

        service.network().set_online(true);
        assert!(service.sync().await);

        assert!(service.pending_changes().await.unwrap().is_empty());
        assert_eq!(service.sync_state().await, SyncState::Synced);

        let sent = remote.sent_requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, "/crops");
        assert_eq!(sent[0].body, serde_json::to_value(&saved.record).unwrap());

        let weather = service.weather().await.unwrap().unwrap();
        assert_eq!(weather.forecast, "Partly cloudy with occasional showers");
        let prices = service.market_prices().await.unwrap();
        assert_eq!(prices.len(), 4);
        assert!(prices.iter().any(|price| price.crop == "Maize" && price.price == 45.0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_replaces_reference_data_with_server_values() {
        let (service, remote) = service(true).await;
        remote.set_weather(WeatherReport {
            temperature: 31.0,
            humidity: 40.0,
            rainfall: "None expected".into(),
            forecast: "Hot and dry".into(),
        });
        remote.set_market_prices(vec![MarketPrice {
            crop: "Beans".into(),
            price: 120.0,
            unit: "KES/kg".into(),
            trend: Trend::Down,
            change: "-3%".into(),
            timestamp: 0,
        }]);

        assert!(service.sync().await);

        let weather = service.weather().await.unwrap().unwrap();
        assert_eq!(weather.forecast, "Hot and dry");
        assert_eq!(weather.temperature, 31.0);
        let prices = service.market_prices().await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].crop, "Beans");
        assert_eq!(prices[0].trend, Trend::Down);
        assert!(prices[0].timestamp > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_while_offline_is_a_no_op() {
        let (service, remote) = service(false).await;
        service.create_or_update(maize()).await.unwrap();

        assert!(!service.sync().await);
        assert!(matches!(
            service.sync_detailed().await,
            ReconcileOutcome::Offline
        ));

        assert!(remote.calls().is_empty());
        let queue = service.pending_changes().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].change.action(), "create-crop");
        assert_eq!(service.sync_state().await, SyncState::Offline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_state_reports_pending_changes() {
        let (service, _remote) = service(false).await;
        service.create_or_update(maize()).await.unwrap();

        service.network().report(NetworkStatus::online());
        assert_eq!(service.sync_state().await, SyncState::Pending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn auto_sync_drains_queue_on_reconnect() {
        let (service, remote) = service(false).await;
        service.create_or_update(maize()).await.unwrap();

        service.start_auto_sync().unwrap();
        assert!(service.is_auto_sync_active());
        assert_eq!(service.network().subscriber_count(), 1);

        service.network().set_online(true);
        wait_for(|| remote.calls().contains(&RemoteCall::FetchMarketPrices)).await;
        wait_for(|| !service.reconciler().is_running()).await;

        assert_eq!(remote.sent_requests().len(), 1);
        assert!(service.pending_changes().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_auto_sync_releases_subscription() {
        let (service, remote) = service(false).await;
        service.start_auto_sync().unwrap();
        service.start_auto_sync().unwrap();
        assert_eq!(service.network().subscriber_count(), 1);

        service.stop_auto_sync();
        service.stop_auto_sync();
        assert!(!service.is_auto_sync_active());
        assert_eq!(service.network().subscriber_count(), 0);

        service.network().set_online(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(remote.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_service_releases_subscription() {
        let (service, _remote) = service(false).await;
        let network = service.network().clone();
        service.start_auto_sync().unwrap();
        assert_eq!(network.subscriber_count(), 1);

        drop(service);
        assert_eq!(network.subscriber_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_connection_follows_network_status() {
        let (service, _remote) = service(true).await;
        assert!(service.is_slow_connection());

        service.network().report(NetworkStatus {
            online: true,
            effective_type: crate::network::EffectiveType::FourG,
            downlink_mbps: 10.0,
            save_data: false,
        });
        assert!(!service.is_slow_connection());
        assert!(service.network_status().online);
    }
}
