//! Client side of the remote farm-records service.
//!
//! Records are created with `POST /<resource>` and updated with
//! `PUT /<resource>/<id>`; reference data comes from `GET /weather` and
//! `GET /market-prices`. Bodies are the record JSON, without an envelope.

mod http;
mod mock;

use std::fmt;
use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{ChangeKind, MarketPrice, PendingChange, WeatherReport};

pub use http::HttpRemote;
pub use mock::{MockRemote, RemoteCall};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote service unreachable: {0}")]
    Unreachable(String),
    #[error("Remote service rejected the request: {message}")]
    Rejected { status: u16, message: String },
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    /// Whether the failure says nothing about the request itself.
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => f.write_str("POST"),
            Self::Put => f.write_str("PUT"),
        }
    }
}

/// One write against the remote service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteRequest {
    pub method: Method,
    /// Path relative to the service root, e.g. `/crops/42`
    pub path: String,
    pub body: Value,
}

impl RemoteRequest {
    /// Map a queued change onto the matching create or update call.
    pub fn for_change(change: &PendingChange) -> crate::Result<Self> {
        let resource = change.collection().resource();
        let (method, path) = match change.kind() {
            ChangeKind::Create => (Method::Post, format!("/{resource}")),
            ChangeKind::Update => (Method::Put, format!("/{resource}/{}", change.record_key())),
        };
        Ok(Self {
            method,
            path,
            body: change.payload()?,
        })
    }
}

impl fmt::Display for RemoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// The server the reconciler replays queued changes against.
pub trait RemoteService: Send + Sync + 'static {
    /// Transmit one create or update.
    fn send(&self, request: &RemoteRequest) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Current weather.
    fn fetch_weather(&self) -> impl Future<Output = RemoteResult<WeatherReport>> + Send;

    /// Current market prices.
    fn fetch_market_prices(&self) -> impl Future<Output = RemoteResult<Vec<MarketPrice>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Livestock, Transaction, TransactionKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn create_posts_to_collection() {
        let cattle = Livestock::new("Cattle", 15, "2024-06-20", "Good").with_id(7);
        let request = RemoteRequest::for_change(&PendingChange::CreateLivestock(cattle)).unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/livestock");
        assert_eq!(request.body["type"], "Cattle");
        assert_eq!(request.to_string(), "POST /livestock");
    }

    #[test]
    fn update_puts_to_record() {
        let mut tx = Transaction::new(TransactionKind::Debit, 500.0, "Seeds", "2024-06-01");
        tx.id = 9;
        let request = RemoteRequest::for_change(&PendingChange::UpdateTransaction(tx)).unwrap();

        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "/transactions/9");
    }

    #[test]
    fn only_unreachable_is_unreachable() {
        assert!(RemoteError::Unreachable("refused".into()).is_unreachable());
        assert!(!RemoteError::Rejected {
            status: 500,
            message: "boom".into()
        }
        .is_unreachable());
    }
}
