use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use keke_pool::api;
use keke_pool::config::Config;
use keke_pool::engine::coordinator::PoolSettings;
use keke_pool::engine::directory::VehicleDirectory;
use keke_pool::engine::sweep::run_sweeper;
use keke_pool::error::AppError;
use keke_pool::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }

    let now = Utc::now();
    let vehicles = match &config.fleet_file {
        Some(path) => VehicleDirectory::load(path, now)?,
        None => VehicleDirectory::with_default_fleet(now),
    };
    tracing::info!(vehicles = vehicles.len(), "fleet loaded");

    let settings = PoolSettings {
        reservation_ttl: Duration::minutes(config.reservation_ttl_minutes),
        abandoned_pool_ttl: Duration::minutes(config.pool_ttl_minutes),
        completed_retention: Duration::hours(config.completed_retention_hours),
    };
    let shared_state = Arc::new(AppState::new(vehicles, settings, config.event_buffer_size));

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_sweeper(
        shared_state.clone(),
        tokio::time::Duration::from_secs(config.sweep_interval_secs.max(1)),
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
