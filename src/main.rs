use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use transit_planner::api::{self, AppState};
use transit_planner::config::Config;
use transit_planner::dataset::Dataset;
use transit_planner::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logger::init_logger(&config.environment);

    let dataset = Arc::new(Dataset::taiwan().context("failed to load the built-in transit dataset")?);
    info!(
        cities = dataset.cities().len(),
        stations = dataset.stations().len(),
        "dataset loaded"
    );

    let state = AppState::new(dataset, &config);
    let app = api::router(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, environment = %config.environment, "server is running");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
