use agrisync_core::util::now_millis;
use agrisync_core::FarmService;

use crate::commands::common::format_queue_lines;
use crate::error::CliError;
use crate::remote::CliRemote;

pub async fn run_queue(
    service: &FarmService<CliRemote>,
    as_json: bool,
    clear: bool,
) -> Result<(), CliError> {
    if clear {
        let removed = service.store().clear_queue().await?;
        tracing::warn!("Discarded {removed} queued change(s) without sending them");
        println!("Discarded {removed} queued change(s); local records are unchanged.");
        return Ok(());
    }

    let entries = service.pending_changes().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Nothing waiting to sync.");
        return Ok(());
    }

    for line in format_queue_lines(&entries, now_millis()) {
        println!("{line}");
    }
    Ok(())
}
