use super::routes::{command_handler, get_puck_range, set_puck_range, status_handler, stream_tracking};
use super::state::AppState;
use super::ui::index_page;
use axum::routing::{get, post};
use std::net::SocketAddr;

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", get(index_page))
        .route("/stream/tracking", get(stream_tracking))
        .route("/status", get(status_handler))
        .route("/config/puck", get(get_puck_range).post(set_puck_range))
        .route("/command", post(command_handler))
        .with_state(state)
}

/// Serves the dashboard until the listener fails.
pub async fn run_dashboard_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
