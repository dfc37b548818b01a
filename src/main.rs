//! The `opensight` binary: wires the Manager, Pipeline, Importer, admin
//! API, and Lifespan supervisor together and runs until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use opensight_config::PersistStore;
use opensight_controller::{RestartDecision, Supervisor, SupervisorConfig};
use opensight_engine::{FifoLock, FunctionCatalog, Pipeline};
use opensight_importer::Importer;
use opensight_manager::{Manager, ModuleSource};

/// OpenSight: a node-graph execution runtime for a pluggable
/// vision-processing pipeline.
#[derive(Parser, Debug)]
#[command(name = "opensight", version, about)]
struct Cli {
    /// Directory for persisted nodetrees, preferences, and calibration files.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Directory modules would be loaded from. Accepted for compatibility;
    /// modules are linked in at build time (see `opensight-manager`), not
    /// discovered from disk.
    #[arg(long)]
    module_dir: Option<PathBuf>,

    /// Admin API bind address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_address: String,

    /// Static asset directory for the client UI frontend, served as a
    /// fallback route by the admin API.
    #[arg(long)]
    frontend_dir: Option<PathBuf>,

    /// Marks this process as running without a controlling terminal,
    /// reported read-only via `GET /api/config`.
    #[arg(long)]
    daemon: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    if let Some(module_dir) = &cli.module_dir {
        tracing::warn!(
            path = %module_dir.display(),
            "--module-dir is accepted for compatibility but ignored: modules are linked in at build time"
        );
    }

    let mut decision = RestartDecision::Restart;
    while decision == RestartDecision::Restart {
        decision = run_once(&cli).await?;
    }
    Ok(())
}

/// Builds a fresh Manager/Pipeline/Importer and runs one supervisor
/// lifetime. A `Restart` decision reconstructs all three from scratch
/// rather than re-executing the process.
async fn run_once(cli: &Cli) -> Result<RestartDecision, Box<dyn std::error::Error>> {
    let store = PersistStore::new(cli.data_dir.clone());
    store.ensure_dirs()?;

    let manager = Arc::new(Manager::register_all(vec![
        Box::new(opensight_core_nodes::CoreModule) as Box<dyn ModuleSource>
    ]));
    let catalog: Arc<dyn FunctionCatalog> = manager.clone();
    let pipeline = Arc::new(FifoLock::new(Pipeline::new(catalog)));
    let importer = Arc::new(Importer::new(manager.clone(), pipeline, store.clone()));

    let preferences = importer.store().load_preferences().unwrap_or_default();
    let tree = importer
        .store()
        .load_nodetree(preferences.profile)
        .unwrap_or_default();
    if let Err(err) = importer.import(tree, preferences.profile, false) {
        tracing::warn!(error = %err, "startup nodetree failed to import, pipeline starts empty");
    }

    let config = SupervisorConfig {
        bind_address: cli.bind_address.clone(),
        frontend_dir: cli.frontend_dir.clone(),
        daemon: cli.daemon,
        ..SupervisorConfig::default()
    };

    Ok(Supervisor::new(manager, importer, config).run().await?)
}
