//! `POST /api/calibration` (`spec.md` §6): accepts a multipart YAML file and
//! persists it opaquely — the core never parses calibration contents, only
//! module Functions that consume it do.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tracing::warn;

use crate::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/api/calibration", post(post_calibration))
}

async fn post_calibration(State(state): State<AppState>, mut multipart: Multipart) -> StatusCode {
    let Ok(Some(field)) = multipart.next_field().await else {
        return StatusCode::BAD_REQUEST;
    };
    let name = field
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| "calibration.yaml".to_string());
    let Ok(bytes) = field.bytes().await else {
        return StatusCode::BAD_REQUEST;
    };

    match state.importer.store().save_calibration(&name, &bytes) {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "failed to persist calibration file");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
