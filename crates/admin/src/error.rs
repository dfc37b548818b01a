//! Converts the Importer's transactional failures into the `400` body
//! `spec.md` §6/§7 specify: `{error, node, type, message, traceback?}`.
//! `ImportError` lives in `opensight-importer`; `axum::IntoResponse` lives in
//! `axum` — neither is local to this crate, so the conversion is expressed
//! on a thin newtype here rather than as a foreign impl.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use opensight_importer::ImportError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ImportErrorBody {
    error: String,
    node: Option<String>,
    #[serde(rename = "type")]
    function_type: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    traceback: Option<String>,
}

/// Wraps an [`ImportError`] so it can implement [`IntoResponse`] here.
pub struct ImportErrorResponse(pub ImportError);

impl IntoResponse for ImportErrorResponse {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let context = self.0.context().cloned().unwrap_or_default();
        let body = ImportErrorBody {
            error: "import_failed".to_string(),
            node: context.node_id,
            function_type: context.function_type,
            message,
            traceback: None,
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl From<ImportError> for ImportErrorResponse {
    fn from(err: ImportError) -> Self {
        Self(err)
    }
}
