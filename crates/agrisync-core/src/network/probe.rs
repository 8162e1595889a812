//! TCP reachability probe feeding the network monitor.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use url::Url;

use super::{EffectiveType, NetworkMonitor, NetworkStatus};
use crate::error::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Checks connectivity by opening a TCP connection to one address.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    address: String,
    timeout: Duration,
    save_data: bool,
}

impl ConnectivityProbe {
    /// Probe `host:port` directly.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
            save_data: false,
        }
    }

    /// Probe the host and port a remote base URL points at.
    pub fn for_base_url(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|error| Error::InvalidInput(format!("invalid URL '{base_url}': {error}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidInput(format!("URL '{base_url}' has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidInput(format!("URL '{base_url}' has no port")))?;
        Ok(Self::new(format!("{host}:{port}")))
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Carry the user's data-saver preference into reported statuses.
    #[must_use]
    pub const fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run one probe and describe the result as a status snapshot.
    pub async fn check(&self) -> NetworkStatus {
        let started = Instant::now();
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => NetworkStatus {
                online: true,
                effective_type: EffectiveType::from_rtt(started.elapsed()),
                downlink_mbps: 0.0,
                save_data: self.save_data,
            },
            Ok(Err(error)) => {
                tracing::debug!("Probe to {} failed: {}", self.address, error);
                NetworkStatus {
                    save_data: self.save_data,
                    ..NetworkStatus::offline()
                }
            }
            Err(_) => {
                tracing::debug!("Probe to {} timed out after {:?}", self.address, self.timeout);
                NetworkStatus {
                    save_data: self.save_data,
                    ..NetworkStatus::offline()
                }
            }
        }
    }
}

/// Poll `probe` every `interval` and report each result to `monitor`.
///
/// Must be called from within a tokio runtime; abort the handle to stop.
pub fn spawn_probe(
    monitor: NetworkMonitor,
    probe: ConnectivityProbe,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            monitor.report(probe.check().await);
        }
    })
}
