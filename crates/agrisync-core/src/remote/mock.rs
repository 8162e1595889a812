//! In-process remote service used offline and in tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{RemoteError, RemoteRequest, RemoteResult, RemoteService};
use crate::models::{seed_market_prices, seed_weather, MarketPrice, WeatherReport};

/// A call observed by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Send(RemoteRequest),
    FetchWeather,
    FetchMarketPrices,
}

struct MockState {
    calls: Vec<RemoteCall>,
    sends: u64,
    failing_sends: HashSet<u64>,
    unreachable: bool,
    send_delay: Option<Duration>,
    weather: WeatherReport,
    market_prices: Vec<MarketPrice>,
}

/// Accepts every write and answers reference data from seeded values.
///
/// Clones share the recorded calls and failure settings.
#[derive(Clone)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                sends: 0,
                failing_sends: HashSet::new(),
                unreachable: false,
                send_delay: None,
                weather: seed_weather(),
                market_prices: seed_market_prices(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject the `n`-th send (1-based, counted across all passes).
    pub fn fail_send_number(&self, n: u64) {
        self.lock().failing_sends.insert(n);
    }

    /// Fail every call as if the server could not be reached.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Sleep before answering each send.
    pub fn set_send_delay(&self, delay: Option<Duration>) {
        self.lock().send_delay = delay;
    }

    pub fn set_weather(&self, weather: WeatherReport) {
        self.lock().weather = weather;
    }

    pub fn set_market_prices(&self, prices: Vec<MarketPrice>) {
        self.lock().market_prices = prices;
    }

    /// Every call in the order it arrived.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn sent_requests(&self) -> Vec<RemoteRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Send(request) => Some(request.clone()),
                RemoteCall::FetchWeather | RemoteCall::FetchMarketPrices => None,
            })
            .collect()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    fn unreachable_error() -> RemoteError {
        RemoteError::Unreachable("mock remote is offline".to_string())
    }
}

impl RemoteService for MockRemote {
    async fn send(&self, request: &RemoteRequest) -> RemoteResult<()> {
        let (attempt, unreachable, delay) = {
            let mut state = self.lock();
            state.calls.push(RemoteCall::Send(request.clone()));
            state.sends += 1;
            (state.sends, state.unreachable, state.send_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unreachable {
            return Err(Self::unreachable_error());
        }
        if self.lock().failing_sends.contains(&attempt) {
            return Err(RemoteError::Rejected {
                status: 500,
                message: format!("mock rejected send #{attempt} ({request})"),
            });
        }
        Ok(())
    }

    async fn fetch_weather(&self) -> RemoteResult<WeatherReport> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchWeather);
        if state.unreachable {
            return Err(Self::unreachable_error());
        }
        Ok(state.weather.clone())
    }

    async fn fetch_market_prices(&self) -> RemoteResult<Vec<MarketPrice>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FetchMarketPrices);
        if state.unreachable {
            return Err(Self::unreachable_error());
        }
        Ok(state.market_prices.clone())
    }
}
