use agrisync_core::network::NetworkStatus;
use agrisync_core::{FarmService, SyncState};
use serde::Serialize;

use crate::error::CliError;
use crate::remote::CliRemote;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusItem {
    pub network: NetworkStatus,
    pub slow: bool,
    pub state: SyncState,
    pub pending: u64,
}

pub async fn collect_status(service: &FarmService<CliRemote>) -> Result<StatusItem, CliError> {
    Ok(StatusItem {
        network: service.network_status(),
        slow: service.is_slow_connection(),
        state: service.sync_state().await,
        pending: service.store().queue_len().await?,
    })
}

pub async fn run_status(service: &FarmService<CliRemote>, as_json: bool) -> Result<(), CliError> {
    let status = collect_status(service).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for line in format_status_lines(&status) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(status: &StatusItem) -> Vec<String> {
    let connection = if status.network.online {
        format!("online ({})", status.network.effective_type)
    } else {
        "offline".to_string()
    };
    let mut lines = vec![
        format!("Network: {connection}"),
        format!("Sync:    {}", status.state),
        format!("Pending: {}", status.pending),
    ];
    if status.network.online && status.slow {
        lines.push("Slow connection detected".to_string());
    }
    lines
}
