//! Connectivity and link-quality tracking.
//!
//! The monitor holds the last reported [`NetworkStatus`] and notifies
//! subscribers when the device goes online or offline. Signals come from
//! [`NetworkMonitor::report`], fed either by the caller or by a
//! [`ConnectivityProbe`] loop.

mod probe;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use probe::{spawn_probe, ConnectivityProbe};

/// Downlink below this (Mbps) counts as slow.
const SLOW_DOWNLINK_MBPS: f64 = 1.5;

/// Link generation as reported by the Network Information API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectiveType {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl EffectiveType {
    /// Estimate the link type from a round-trip time.
    pub fn from_rtt(rtt: Duration) -> Self {
        match rtt.as_millis() {
            2000.. => Self::Slow2g,
            1400..=1999 => Self::TwoG,
            270..=1399 => Self::ThreeG,
            _ => Self::FourG,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Slow2g => "slow-2g",
            Self::TwoG => "2g",
            Self::ThreeG => "3g",
            Self::FourG => "4g",
        }
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time connectivity snapshot. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub online: bool,
    pub effective_type: EffectiveType,
    /// Estimated downlink, `0.0` when unknown
    pub downlink_mbps: f64,
    pub save_data: bool,
}

impl NetworkStatus {
    pub const fn offline() -> Self {
        Self {
            online: false,
            effective_type: EffectiveType::Unknown,
            downlink_mbps: 0.0,
            save_data: false,
        }
    }

    /// Online with unknown link quality
    pub const fn online() -> Self {
        Self {
            online: true,
            effective_type: EffectiveType::Unknown,
            downlink_mbps: 0.0,
            save_data: false,
        }
    }
}

/// Whether a link should be treated as slow.
///
/// Only link fields are consulted. An unknown downlink (`0.0`) reads as slow.
pub fn is_slow(status: &NetworkStatus) -> bool {
    matches!(
        status.effective_type,
        EffectiveType::Slow2g | EffectiveType::TwoG | EffectiveType::ThreeG
    ) || status.downlink_mbps < SLOW_DOWNLINK_MBPS
        || status.save_data
}

type Listener = Arc<dyn Fn() + Send + Sync>;

struct Listeners {
    on_online: Listener,
    on_offline: Listener,
}

struct MonitorState {
    status: NetworkStatus,
    next_id: u64,
    listeners: HashMap<u64, Listeners>,
}

/// Shared view of the device's connectivity.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct NetworkMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::offline())
    }
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                status: initial,
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Synchronous snapshot of the last reported status.
    pub fn current_status(&self) -> NetworkStatus {
        self.lock().status
    }

    pub fn is_online(&self) -> bool {
        self.lock().status.online
    }

    /// Register transition listeners.
    ///
    /// `on_online` fires when the device goes from offline to online,
    /// `on_offline` on the reverse. Listeners run on the reporting thread.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F, G>(&self, on_online: F, on_offline: G) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.insert(
            id,
            Listeners {
                on_online: Arc::new(on_online),
                on_offline: Arc::new(on_offline),
            },
        );

        Subscription {
            id,
            state: Arc::downgrade(&self.state),
            active: AtomicBool::new(true),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Publish a new platform snapshot.
    ///
    /// Listeners fire only when `online` changes. A link change while
    /// online that classifies as slow is logged.
    pub fn report(&self, status: NetworkStatus) {
        let (previous, fired) = {
            let mut state = self.lock();
            let previous = std::mem::replace(&mut state.status, status);

            let fired: Vec<Listener> = if previous.online == status.online {
                Vec::new()
            } else {
                state
                    .listeners
                    .values()
                    .map(|listeners| {
                        if status.online {
                            Arc::clone(&listeners.on_online)
                        } else {
                            Arc::clone(&listeners.on_offline)
                        }
                    })
                    .collect()
            };

            if previous.online
                && status.online
                && previous != status
                && !state.listeners.is_empty()
                && is_slow(&status)
            {
                tracing::warn!(
                    effective_type = %status.effective_type,
                    downlink_mbps = status.downlink_mbps,
                    save_data = status.save_data,
                    "Slow connection detected"
                );
            }

            (previous, fired)
        };

        if previous.online != status.online {
            tracing::info!(
                "Network went {}",
                if status.online { "online" } else { "offline" }
            );
        }

        for listener in fired {
            listener();
        }
    }

    /// Report a plain online/offline change, keeping the link fields.
    pub fn set_online(&self, online: bool) {
        let mut status = self.current_status();
        status.online = online;
        self.report(status);
    }
}

/// Handle returned by [`NetworkMonitor::subscribe`].
///
/// Unsubscribes on drop; calling [`Subscription::unsubscribe`] more than
/// once is harmless.
pub struct Subscription {
    id: u64,
    state: Weak<Mutex<MonitorState>>,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(state) = self.state.upgrade() {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
