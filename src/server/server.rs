use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::routes::StationState;
use crate::stations::StationCommandDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub station_state: StationState,
}

impl AppState {
    pub fn new(metrics: &Metrics, dispatcher: StationCommandDispatcher) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            station_state: StationState::new(dispatcher),
        }
    }
}

pub fn app(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(state.station_state.router())
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Serve the station API (and metrics, when enabled) until the process is
/// told to stop.
pub async fn start(settings_config: &SettingsConfig, dispatcher: StationCommandDispatcher) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, dispatcher);
    let app = app(settings_config, state);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    metrics.up.set(1);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    metrics.up.set(0);
    served.context("http server failed")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
