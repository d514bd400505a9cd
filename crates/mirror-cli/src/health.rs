//! Liveness endpoint
//!
//! `GET /health` answers `204 No Content` for as long as the process is
//! running. It is only started once initialization has succeeded.

use std::net::SocketAddr;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;

use crate::error::{CliError, Result};

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Serve the health router on all interfaces until the task is dropped.
pub async fn serve(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind { port, source })?;

    tracing::info!(%addr, "Health endpoint listening");
    axum::serve(listener, router()).await?;
    Ok(())
}
