use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use shared::{domain::CommandId, protocol::DeviceStatus};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod device;

use api::ApiContext;
use config::load_settings;
use device::Amplifier;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let device = Amplifier::new(
        settings.sources.clone(),
        settings.initial_source.clone(),
        settings.max_volume,
    );
    let state = AppState {
        api: ApiContext::new(device, settings.latency),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(
        %addr,
        sources = ?settings.sources,
        latency_ms = settings.latency.as_millis() as u64,
        "device simulator listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/:command", get(http_query).post(http_invoke))
        .route("/api/:command/:arg", post(http_invoke_with_arg))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_query(
    State(state): State<Arc<AppState>>,
    Path(command): Path<String>,
) -> Json<DeviceStatus> {
    Json(api::query(&state.api, &CommandId::from(command)).await)
}

async fn http_invoke(
    State(state): State<Arc<AppState>>,
    Path(command): Path<String>,
) -> Json<DeviceStatus> {
    Json(api::invoke(&state.api, &CommandId::from(command), None).await)
}

async fn http_invoke_with_arg(
    State(state): State<Arc<AppState>>,
    Path((command, arg)): Path<(String, String)>,
) -> Json<DeviceStatus> {
    Json(api::invoke(&state.api, &CommandId::from(command), Some(&arg)).await)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
