//! Lifecycle control routes (`spec.md` §6): `/api/shutdown`, `/api/restart`,
//! `/api/shutdown-host`, `/api/restart-host`, `/api/upgrade`. The actual OS
//! integration (service manager control, host reboot) is an external
//! collaborator (`spec.md` §1); this crate's job ends at handing a
//! [`LifecycleCommand`] to whoever owns the supervisor loop.

use std::path::PathBuf;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tracing::warn;

use crate::AppState;

/// A lifecycle action requested over HTTP, handed off to the supervisor
/// (`opensight-controller`) for execution.
#[derive(Debug)]
pub enum LifecycleCommand {
    Shutdown,
    Restart,
    ShutdownHost,
    RestartHost,
    Upgrade(PathBuf),
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/shutdown", post(shutdown))
        .route("/api/restart", post(restart))
        .route("/api/shutdown-host", post(shutdown_host))
        .route("/api/restart-host", post(restart_host))
        .route("/api/upgrade", post(upgrade))
}

async fn dispatch(state: &AppState, command: LifecycleCommand) -> StatusCode {
    if state.lifecycle.send(command).is_err() {
        warn!("lifecycle command dropped: supervisor channel closed");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::ACCEPTED
}

async fn shutdown(State(state): State<AppState>) -> StatusCode {
    dispatch(&state, LifecycleCommand::Shutdown).await
}

async fn restart(State(state): State<AppState>) -> StatusCode {
    dispatch(&state, LifecycleCommand::Restart).await
}

async fn shutdown_host(State(state): State<AppState>) -> StatusCode {
    dispatch(&state, LifecycleCommand::ShutdownHost).await
}

async fn restart_host(State(state): State<AppState>) -> StatusCode {
    dispatch(&state, LifecycleCommand::RestartHost).await
}

async fn upgrade(State(state): State<AppState>, mut multipart: Multipart) -> StatusCode {
    let Ok(Some(field)) = multipart.next_field().await else {
        return StatusCode::BAD_REQUEST;
    };
    let Ok(bytes) = field.bytes().await else {
        return StatusCode::BAD_REQUEST;
    };
    let path = match state.importer.store().stage_upgrade(&bytes) {
        Ok(path) => path,
        Err(err) => {
            warn!(error = %err, "failed to stage upgrade tarball");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    dispatch(&state, LifecycleCommand::Upgrade(path)).await
}
