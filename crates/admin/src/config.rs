//! `GET /api/config`, `POST /api/profile`, `POST /api/network` (`spec.md`
//! §6). `GET /api/config`'s exact shape is fixed by `SPEC_FULL.md` §6:
//! `{ preferences, version, daemon, network_modes }`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use opensight_config::{Network, Preferences};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/config", get(get_config))
        .route("/api/profile", post(post_profile))
        .route("/api/network", post(post_network))
}

#[derive(Debug, Serialize)]
struct ConfigResponse {
    preferences: Preferences,
    version: &'static str,
    daemon: bool,
    network_modes: [&'static str; 3],
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        preferences: state.preferences.lock().unwrap().clone(),
        version: state.version,
        daemon: state.daemon,
        network_modes: ["mDNS", "Static", "Localhost"],
    })
}

#[derive(Debug, Deserialize)]
struct ProfileQuery {
    profile: u8,
}

/// Out-of-range profiles silently no-op (`SPEC_FULL.md` §6: the original
/// returns `None`/204 rather than erroring).
async fn post_profile(State(state): State<AppState>, Query(query): Query<ProfileQuery>) -> StatusCode {
    if query.profile >= opensight_config::persist::PROFILE_SLOTS {
        return StatusCode::NO_CONTENT;
    }

    {
        let mut prefs = state.preferences.lock().unwrap();
        prefs.profile = query.profile;
        if let Err(err) = state.importer.store().save_preferences(&prefs) {
            warn!(error = %err, "failed to persist preferences after profile switch");
        }
    }

    let tree = state
        .importer
        .store()
        .load_nodetree(query.profile)
        .unwrap_or_default();
    match state.importer.import(tree, query.profile, false) {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, profile = query.profile, "re-import on profile switch failed");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn post_network(State(state): State<AppState>, Json(network): Json<Network>) -> StatusCode {
    if let Err(err) = network.validate() {
        warn!(error = %err, "rejected invalid network settings");
        return StatusCode::BAD_REQUEST;
    }

    let mut prefs = state.preferences.lock().unwrap();
    prefs.network = network;
    match state.importer.store().save_preferences(&prefs) {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "failed to persist network settings");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
