use agrisync_core::{FarmService, ReconcileOutcome, SyncReport};

use crate::error::CliError;
use crate::remote::CliRemote;

pub async fn run_sync(service: &FarmService<CliRemote>) -> Result<(), CliError> {
    if service.reconciler().remote().is_disabled() {
        return Err(CliError::RemoteNotConfigured);
    }

    match service.sync_detailed().await {
        ReconcileOutcome::Offline => {
            let pending = service.store().queue_len().await?;
            println!("Offline: {pending} change(s) stay queued until the server is reachable.");
        }
        ReconcileOutcome::AlreadyRunning => println!("A sync is already running."),
        ReconcileOutcome::Completed(report) => {
            for line in format_report(&report) {
                println!("{line}");
            }
        }
        ReconcileOutcome::Failed(error) => return Err(error.into()),
    }
    Ok(())
}

pub fn format_report(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Sync completed: {}/{} change(s) sent, {} cleared from the queue",
        report.succeeded, report.attempted, report.cleared
    )];
    if !report.failed.is_empty() {
        let ids = report
            .failed
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Failed: {ids}"));
    }
    if !report.reference_refreshed {
        lines.push("Weather and market prices could not be refreshed".to_string());
    }
    lines
}
