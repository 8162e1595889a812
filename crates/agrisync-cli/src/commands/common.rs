use agrisync_core::models::{
    Activity, Crop, Livestock, MarketPrice, QueueEntry, Transaction, WeatherSnapshot,
};
use agrisync_core::network::{ConnectivityProbe, NetworkMonitor, NetworkStatus};
use agrisync_core::remote::{HttpRemote, MockRemote};
use agrisync_core::{FarmService, Store};

use crate::error::CliError;
use crate::remote::CliRemote;
use crate::settings::ResolvedSettings;

/// Flags that shape how the service talks to the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkOptions {
    pub offline: bool,
    pub mock: bool,
}

pub fn select_remote(
    resolved: &ResolvedSettings,
    options: NetworkOptions,
) -> Result<CliRemote, CliError> {
    if options.mock {
        return Ok(CliRemote::Mock(MockRemote::new()));
    }
    match resolved.api_base_url() {
        Some(url) => Ok(CliRemote::Http(HttpRemote::new(
            url,
            resolved.settings.request_timeout(),
        )?)),
        None => Ok(CliRemote::Disabled),
    }
}

/// Reachability probe for the configured server, `None` unless it is HTTP.
pub fn connectivity_probe(
    remote: &CliRemote,
    resolved: &ResolvedSettings,
) -> Result<Option<ConnectivityProbe>, CliError> {
    let CliRemote::Http(http) = remote else {
        return Ok(None);
    };
    let probe = ConnectivityProbe::for_base_url(http.base_url())?
        .with_timeout(resolved.settings.request_timeout())
        .with_save_data(resolved.settings.save_data);
    Ok(Some(probe))
}

/// Probe once to seed the monitor; `agrisync watch` keeps polling after.
pub async fn detect_network(
    remote: &CliRemote,
    resolved: &ResolvedSettings,
    options: NetworkOptions,
) -> Result<NetworkMonitor, CliError> {
    let status = if options.offline {
        NetworkStatus::offline()
    } else if let Some(probe) = connectivity_probe(remote, resolved)? {
        probe.check().await
    } else if matches!(remote, CliRemote::Mock(_)) {
        NetworkStatus {
            save_data: resolved.settings.save_data,
            ..NetworkStatus::online()
        }
    } else {
        NetworkStatus::offline()
    };
    Ok(NetworkMonitor::new(status))
}

pub async fn open_service(
    resolved: &ResolvedSettings,
    options: NetworkOptions,
) -> Result<FarmService<CliRemote>, CliError> {
    let store = Store::open(&resolved.db_path).await?;
    let remote = select_remote(resolved, options)?;
    let network = detect_network(&remote, resolved, options).await?;
    tracing::debug!(
        "Opened {} (online: {})",
        resolved.db_path.display(),
        network.is_online()
    );
    Ok(FarmService::new(
        store,
        network,
        remote,
        resolved.settings.clear_policy,
    ))
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

fn sync_marker(synced: bool) -> &'static str {
    if synced {
        " "
    } else {
        "*"
    }
}

fn format_amount(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |amount| format!("{amount:.2}"))
}

pub fn format_crop_lines(crops: &[Crop]) -> Vec<String> {
    crops
        .iter()
        .map(|crop| {
            format!(
                "{}{}  {}  {:.1} acres  planted {}  {}  health {}%",
                sync_marker(crop.sync.synced),
                crop.id,
                crop.name,
                crop.area,
                crop.plant_date,
                crop.status,
                crop.health
            )
        })
        .collect()
}

pub fn format_livestock_lines(livestock: &[Livestock]) -> Vec<String> {
    livestock
        .iter()
        .map(|group| {
            let checkup = if group.last_checkup.is_empty() {
                "never"
            } else {
                group.last_checkup.as_str()
            };
            format!(
                "{}{}  {} x{}  checked {}  {}",
                sync_marker(group.sync.synced),
                group.id,
                group.kind,
                group.count,
                checkup,
                group.health
            )
        })
        .collect()
}

pub fn format_activity_lines(activities: &[Activity]) -> Vec<String> {
    activities
        .iter()
        .map(|entry| {
            format!(
                "{}{}  {}  {}  cost {}  income {}",
                sync_marker(entry.sync.synced),
                entry.id,
                entry.date,
                entry.activity,
                format_amount(entry.cost),
                format_amount(entry.income)
            )
        })
        .collect()
}

pub fn format_transaction_lines(transactions: &[Transaction]) -> Vec<String> {
    transactions
        .iter()
        .map(|entry| {
            format!(
                "{}{}  {}  {} {:.2}  {}{}",
                sync_marker(entry.sync.synced),
                entry.id,
                entry.date,
                entry.kind,
                entry.amount,
                entry.description,
                entry
                    .method
                    .as_deref()
                    .map(|method| format!(" ({method})"))
                    .unwrap_or_default()
            )
        })
        .collect()
}

pub fn format_market_price_lines(prices: &[MarketPrice]) -> Vec<String> {
    prices
        .iter()
        .map(|price| {
            format!(
                "{:<10} {:>8.2} {:<14} {}",
                price.crop, price.price, price.unit, price.change
            )
        })
        .collect()
}

pub fn format_weather_line(weather: &WeatherSnapshot) -> String {
    format!(
        "{:.0}°C  humidity {:.0}%  rain: {}  {}",
        weather.temperature, weather.humidity, weather.rainfall, weather.forecast
    )
}

pub fn format_queue_lines(entries: &[QueueEntry], now_ms: i64) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "#{}  {}  {}  {}",
                entry.id,
                entry.change.action(),
                entry.change.record_key(),
                format_relative_time(entry.enqueued_at, now_ms)
            )
        })
        .collect()
}
