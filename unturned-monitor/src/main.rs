use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use unturned_monitor::config::AppConfig;
use unturned_monitor::database::{
    self,
    repositories::{SqlxRecipientRepository, SqlxStatusStore},
};
use unturned_monitor::domain::{RecipientChannel, RecipientKey};
use unturned_monitor::monitor::ServerMonitor;
use unturned_monitor::notification::{MessageRenderer, NotificationDispatcher, OneBotTransport};
use unturned_monitor::probe::A2sProbe;
use unturned_monitor::registry::RecipientRegistry;
use unturned_monitor::{logging, panic_hook, utils};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;
    panic_hook::install(&config.log_dir);

    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.clone());

    // Initialize database
    utils::fs::ensure_sqlite_parent_dir(&config.database_url)?;
    let pool = database::init_pool(&config.database_url).await?;
    let write_pool = database::init_write_pool(&config.database_url).await?;
    database::run_migrations(&write_pool).await?;

    let store = Arc::new(SqlxStatusStore::new(pool.clone(), write_pool.clone()));
    let recipients = Arc::new(SqlxRecipientRepository::new(pool.clone(), write_pool.clone()));

    let registry = Arc::new(RecipientRegistry::new(recipients));
    registry.load().await?;
    for id in &config.superusers {
        registry.ensure_registered(RecipientKey::direct(id)).await?;
    }
    for id in &config.groups {
        registry.ensure_registered(RecipientKey::group(id)).await?;
    }

    let transport = Arc::new(OneBotTransport::new(config.onebot.clone())?);
    let renderer = MessageRenderer::new(&config.server.name, config.server.game_address());
    let dispatcher = Arc::new(NotificationDispatcher::new(transport, renderer));

    let monitor = Arc::new(ServerMonitor::new(
        config.monitor_config()?,
        Arc::new(A2sProbe::new()),
        store,
        registry.clone(),
        dispatcher.clone(),
    ));

    info!(
        server = %config.server.name,
        address = %monitor.config().address,
        recipients = registry.list().len(),
        "unturned-monitor initialized"
    );

    if config.monitor.notify_on_startup {
        let superusers = registry.enabled(Some(RecipientChannel::Direct));
        if !superusers.is_empty() {
            let notice = dispatcher
                .renderer()
                .startup_notice(config.monitor.interval, config.monitor.enabled);
            dispatcher.send_text(&notice, &superusers).await;
        }
    }

    if config.monitor.enabled {
        monitor.start().await?;
    } else {
        warn!("MONITOR_ENABLED is false, the monitor loop will not run");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Err(e) = monitor.stop().await {
        warn!(error = %e, "Failed to stop monitor cleanly");
    }
    shutdown.cancel();

    let superusers = registry.enabled(Some(RecipientChannel::Direct));
    if config.monitor.notify_on_startup && !superusers.is_empty() {
        let notice = dispatcher.renderer().shutdown_notice();
        dispatcher.send_text(&notice, &superusers).await;
    }

    pool.close().await;
    write_pool.close().await;
    info!("unturned-monitor stopped");

    Ok(())
}
