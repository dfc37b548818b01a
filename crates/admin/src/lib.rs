//! The admin HTTP/JSON API (`spec.md` §6): the external transport for the
//! nodetree import/export, catalog, preferences, and lifecycle routes. Out
//! of scope per `spec.md` §1 except as a reference implementation
//! (`SPEC_FULL.md` §1) — thin by design, built the way the teacher's own
//! `crates/admin` composes an axum app (`Router::merge`, `AppState`,
//! graceful shutdown via a cancellation signal).

pub mod calibration;
pub mod config;
pub mod error;
pub mod funcs;
pub mod lifecycle;
pub mod nodes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::Router;
use opensight_config::Preferences;
use opensight_importer::Importer;
use opensight_manager::Manager;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tracing::info;

pub use lifecycle::LifecycleCommand;

/// Failure modes of starting or running the admin HTTP server.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid bind address {bind_address:?}: {details}")]
    InvalidBindAddress { bind_address: String, details: String },

    #[error("failed to bind admin HTTP server on {addr}: {details}")]
    BindFailed { addr: String, details: String },

    #[error("admin HTTP server error on {addr}: {details}")]
    ServerError { addr: String, details: String },
}

/// Shared state every route handler reads through.
#[derive(Clone)]
pub struct AppState {
    manager: Arc<Manager>,
    importer: Arc<Importer>,
    preferences: Arc<Mutex<Preferences>>,
    lifecycle: UnboundedSender<LifecycleCommand>,
    version: &'static str,
    daemon: bool,
}

/// Runs the admin HTTP server until `cancel` fires.
///
/// `frontend_dir`, when set, is served as a fallback static file root (the
/// client UI, `spec.md` §1's "out of scope" collaborator — mounted here only
/// because this crate already owns the axum `Router`).
pub async fn run(
    bind_address: &str,
    manager: Arc<Manager>,
    importer: Arc<Importer>,
    frontend_dir: Option<PathBuf>,
    daemon: bool,
    lifecycle: UnboundedSender<LifecycleCommand>,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let preferences = importer.store().load_preferences().unwrap_or_default();
    let state = AppState {
        manager,
        importer,
        preferences: Arc::new(Mutex::new(preferences)),
        lifecycle,
        version: env!("CARGO_PKG_VERSION"),
        daemon,
    };

    let mut app = Router::new()
        .merge(funcs::routes())
        .merge(nodes::routes())
        .merge(config::routes())
        .merge(calibration::routes())
        .merge(lifecycle::routes())
        .layer(ServiceBuilder::new())
        .with_state(state);

    if let Some(dir) = frontend_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    let addr = bind_address.parse::<SocketAddr>().map_err(|e| Error::InvalidBindAddress {
        bind_address: bind_address.to_string(),
        details: e.to_string(),
    })?;

    let listener = TcpListener::bind(&addr).await.map_err(|e| Error::BindFailed {
        addr: addr.to_string(),
        details: e.to_string(),
    })?;

    info!(endpoint = %addr, "admin HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| Error::ServerError {
            addr: addr.to_string(),
            details: e.to_string(),
        })
}
