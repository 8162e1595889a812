use std::future::Future;

use agrisync_core::network::spawn_probe;
use agrisync_core::FarmService;

use crate::commands::common::{connectivity_probe, NetworkOptions};
use crate::error::CliError;
use crate::remote::CliRemote;
use crate::settings::ResolvedSettings;

/// Keep the queue flowing until Ctrl-C.
pub async fn run_watch(
    service: &FarmService<CliRemote>,
    resolved: &ResolvedSettings,
    options: NetworkOptions,
) -> Result<(), CliError> {
    watch_until(service, resolved, options, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Poll the server and sync on every reconnect until `shutdown` resolves.
pub async fn watch_until(
    service: &FarmService<CliRemote>,
    resolved: &ResolvedSettings,
    options: NetworkOptions,
    shutdown: impl Future<Output = ()>,
) -> Result<(), CliError> {
    let remote = service.reconciler().remote();
    if remote.is_disabled() {
        return Err(CliError::RemoteNotConfigured);
    }
    if options.offline {
        return Err(CliError::Config(
            "watch needs the network; drop --offline".to_string(),
        ));
    }

    let poller = connectivity_probe(remote, resolved)?.map(|probe| {
        tracing::info!(
            "Checking {} every {:?}",
            probe.address(),
            resolved.settings.probe_interval()
        );
        spawn_probe(
            service.network().clone(),
            probe,
            resolved.settings.probe_interval(),
        )
    });

    service.start_auto_sync()?;
    println!("Watching for connectivity changes. Press Ctrl-C to stop.");
    shutdown.await;

    service.stop_auto_sync();
    if let Some(poller) = poller {
        poller.abort();
    }
    let pending = service.store().queue_len().await?;
    println!("Stopped watching; {pending} change(s) still queued.");
    Ok(())
}
