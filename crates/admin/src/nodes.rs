//! `GET/POST /api/nodes` (`spec.md` §6): read the persisted nodetree for the
//! active profile slot, or apply a proposed one through the Importer.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use opensight_config::NodeTreeN;
use serde::Deserialize;

use crate::error::ImportErrorResponse;
use crate::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/api/nodes", get(get_nodes).post(post_nodes))
}

async fn get_nodes(State(state): State<AppState>) -> Json<NodeTreeN> {
    let profile = state.preferences.lock().unwrap().profile;
    Json(state.importer.store().load_nodetree(profile).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct PostNodesQuery {
    #[serde(default)]
    force_save: bool,
}

async fn post_nodes(
    State(state): State<AppState>,
    Query(query): Query<PostNodesQuery>,
    Json(tree): Json<NodeTreeN>,
) -> Result<Json<NodeTreeN>, ImportErrorResponse> {
    let profile = state.preferences.lock().unwrap().profile;
    state.importer.import(tree.clone(), profile, query.force_save)?;
    Ok(Json(tree))
}
