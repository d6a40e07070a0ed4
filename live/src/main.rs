//! FleetDesk Live binary.
//!
//! Opens one realtime session against the dashboard backend and logs
//! connection status and order highlights until interrupted.

use std::sync::Arc;

use anyhow::Context;
use fleetdesk_live::{LiveConfig, OrdersMonitor};
use fleetdesk_live::monitor::ORDERS_KEY;
use fleetdesk_sdk::{ConnectionStatus, DashboardClient, QueryKey, SyncContext};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fleetdesk_live=debug,fleetdesk_sdk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LiveConfig::from_env().context("invalid configuration")?;

    tracing::info!("Starting FleetDesk Live");
    tracing::info!("API URL: {}", config.api_url);
    tracing::info!("Realtime URL: {}", config.ws_url);
    tracing::info!("Flash style: {:?}", config.flash_style);

    let client =
        DashboardClient::new(config.client_config()).context("failed to build API client")?;
    let context = SyncContext::new(Arc::new(client));

    if let Err(e) = context.cache().refetch(&QueryKey::new(ORDERS_KEY)).await {
        tracing::warn!(error = %e, "initial orders load failed");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = OrdersMonitor::new(
        context.cache(),
        config.flash_style,
        config.flash_duration(),
    );
    let monitor_task = tokio::spawn(monitor.run(shutdown_rx));

    let session = context
        .start_session(config.ws_config())
        .context("failed to start realtime session")?;
    let status_task = tokio::spawn(log_status(session.watch()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down FleetDesk Live");

    session.close().await;
    let _ = shutdown_tx.send(true);
    let _ = monitor_task.await;
    status_task.abort();

    let snapshot = context.metrics().snapshot();
    tracing::info!(metrics = %serde_json::to_string(&snapshot)?, "final metrics");

    Ok(())
}

async fn log_status(mut status: watch::Receiver<ConnectionStatus>) {
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        tracing::info!(
            state = %current.state,
            attempts = current.attempts,
            connected = current.is_connected(),
            "realtime status"
        );
    }
}
