use std::sync::Arc;

use agrisync_core::models::{seed_market_prices, seed_weather, MarketPrice, WeatherReport};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::records::{writable_collection, RecordBook};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub records: RecordBook,
    weather: Arc<WeatherReport>,
    market_prices: Arc<Vec<MarketPrice>>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            records: RecordBook::default(),
            weather: Arc::new(seed_weather()),
            market_prices: Arc::new(seed_market_prices()),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/weather", get(weather))
        .route("/market-prices", get(market_prices))
        .route("/{resource}", post(create_record).get(list_records))
        .route("/{resource}/{id}", put(update_record))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    records: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        records: state.records.total().await,
    })
}

async fn weather(State(state): State<AppState>) -> Json<WeatherReport> {
    Json(state.weather.as_ref().clone())
}

async fn market_prices(State(state): State<AppState>) -> Json<Vec<MarketPrice>> {
    Json(state.market_prices.as_ref().clone())
}

async fn list_records(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let collection = writable_collection(&resource)?;
    Ok(Json(state.records.list(collection).await))
}

async fn create_record(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let collection = writable_collection(&resource)?;
    let stored = state.records.create(collection, body).await?;
    tracing::info!(endpoint = "create", %collection, "Stored record");
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn update_record(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let collection = writable_collection(&resource)?;
    let stored = state.records.update(collection, &id, body).await?;
    tracing::info!(endpoint = "update", %collection, id = %id, "Updated record");
    Ok(Json(stored))
}
