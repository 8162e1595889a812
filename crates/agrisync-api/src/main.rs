use std::sync::Arc;

use agrisync_api::config::AppConfig;
use agrisync_api::routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("agrisync_api=info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting agrisync-api with config: {:?}", config);

    let state = AppState::from_config(config);
    let bind_addr = state.config.bind_addr;
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("agrisync-api listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
