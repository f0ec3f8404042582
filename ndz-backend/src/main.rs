use ndz_backend::config;
use ndz_backend::engine::CycleRunner;
use ndz_backend::feed::HttpFeedSource;
use ndz_backend::owner::HttpOwnerSource;
use ndz_backend::publisher::Publisher;
use ndz_backend::scheduled::{ScheduledTaskConfig, ScheduledTaskManager};
use ndz_backend::service::{self, AppState};

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = config::config_path();
    let config = config::read_config(&config_path)?;

    // Initialize logging
    let _logging_guard =
        ndz_backend::logging::init_logging(&config.log_dir, "ndz-backend", &config.log_level)?;

    tracing::info!("NDZ backend starting...");
    if Path::new(&config_path).exists() {
        tracing::info!("Loaded configuration from {}", config_path);
    } else {
        tracing::warn!("No config file at {}, using defaults", config_path);
    }

    let zone = config.zone.no_fly_zone();
    tracing::info!(
        "No-fly zone: center ({}, {}), radius {} km, retention {} s",
        zone.center.x,
        zone.center.y,
        zone.radius_km,
        config.zone.retention_secs
    );

    let feed = HttpFeedSource::new(&config.feed.drones_url, config.feed.request_timeout())?;
    let owners = HttpOwnerSource::new(&config.feed.pilots_url, config.feed.owner_timeout())?;
    tracing::info!("Polling {} every {:?}", feed.url(), config.feed.poll_interval());

    let publisher = Publisher::new();
    let runner = CycleRunner::new(
        Arc::new(feed),
        Arc::new(owners),
        zone,
        config.zone.expiry_policy(),
        publisher.clone(),
    );
    let state = AppState::new(publisher, runner.stats_handle());

    let mut task_manager = ScheduledTaskManager::new(ScheduledTaskConfig::from(&config.feed));
    task_manager.start_polling(runner);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received.");
    };

    let served = service::serve(state, &config.server, shutdown).await;
    task_manager.shutdown().await;
    served
}
