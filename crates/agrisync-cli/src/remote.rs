use agrisync_core::models::{MarketPrice, WeatherReport};
use agrisync_core::remote::{
    HttpRemote, MockRemote, RemoteError, RemoteRequest, RemoteResult, RemoteService,
};

/// Remote selected for this invocation.
pub enum CliRemote {
    Http(HttpRemote),
    Mock(MockRemote),
    /// No server configured; every call fails as unreachable.
    Disabled,
}

impl CliRemote {
    pub const fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    fn disabled_error() -> RemoteError {
        RemoteError::Unreachable("no remote service configured".to_string())
    }
}

impl RemoteService for CliRemote {
    async fn send(&self, request: &RemoteRequest) -> RemoteResult<()> {
        match self {
            Self::Http(remote) => remote.send(request).await,
            Self::Mock(remote) => remote.send(request).await,
            Self::Disabled => Err(Self::disabled_error()),
        }
    }

    async fn fetch_weather(&self) -> RemoteResult<WeatherReport> {
        match self {
            Self::Http(remote) => remote.fetch_weather().await,
            Self::Mock(remote) => remote.fetch_weather().await,
            Self::Disabled => Err(Self::disabled_error()),
        }
    }

    async fn fetch_market_prices(&self) -> RemoteResult<Vec<MarketPrice>> {
        match self {
            Self::Http(remote) => remote.fetch_market_prices().await,
            Self::Mock(remote) => remote.fetch_market_prices().await,
            Self::Disabled => Err(Self::disabled_error()),
        }
    }
}
