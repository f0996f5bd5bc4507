//! Read-only HTTP views of the hub.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use serde_json::Value as Json;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use dnh_core::Coordinator;

use crate::error::Error;

/// `GET /system`, `GET /equipment` and `GET /status`.
pub fn router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/system", get(system))
        .route("/equipment", get(equipment))
        .route("/status", get(status))
        .with_state(coordinator)
}

/// Serve [`router`] until `cancel` fires.
pub async fn serve_http(
    listener: TcpListener,
    coordinator: Coordinator,
    cancel: CancellationToken,
) -> Result<(), Error> {
    axum::serve(listener, router(coordinator))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn system(State(coordinator): State<Coordinator>) -> Response {
    pretty_json(&coordinator.generate_system_snapshot())
}

async fn equipment(State(coordinator): State<Coordinator>) -> Response {
    pretty_json(&coordinator.generate_equipment_snapshot())
}

async fn status(State(coordinator): State<Coordinator>) -> Response {
    pretty_json(&coordinator.generate_status())
}

/// Four-space indented JSON body.
fn pretty_json(body: &Json) -> Response {
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    match body.serialize(&mut ser) {
        Ok(()) => ([(header::CONTENT_TYPE, "application/json")], out).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
