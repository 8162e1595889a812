//! reqwest-backed remote service client.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Method, RemoteError, RemoteRequest, RemoteResult, RemoteService};
use crate::models::{MarketPrice, WeatherReport};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(classify)?;

        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(format!("{path}: {error}")))
    }
}

impl RemoteService for HttpRemote {
    async fn send(&self, request: &RemoteRequest) -> RemoteResult<()> {
        let url = self.url(&request.path);
        let builder = match request.method {
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
        };

        let response = builder
            .header("Accept", "application/json")
            .json(&request.body)
            .send()
            .await
            .map_err(classify)?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch_weather(&self) -> RemoteResult<WeatherReport> {
        self.get_json("/weather").await
    }

    async fn fetch_market_prices(&self) -> RemoteResult<Vec<MarketPrice>> {
        self.get_json("/market-prices").await
    }
}

fn classify(error: reqwest::Error) -> RemoteError {
    if error.is_connect() || error.is_timeout() {
        RemoteError::Unreachable(error.to_string())
    } else {
        RemoteError::Http(error)
    }
}

async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message: parse_api_error(status, &body),
    })
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> RemoteResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("API URL must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "API URL must include http:// or https://".to_string(),
        ))
    }
}
