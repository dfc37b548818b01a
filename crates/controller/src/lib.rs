//! The Lifespan supervisor (`spec.md` §2, §5): starts the Evaluator and the
//! admin API, owns the shared FIFO-locked Pipeline, and coordinates
//! shutdown — signal handling, the lifecycle routes' requests, and a
//! force-terminate watchdog for modules that hang on teardown.

pub mod error;
mod evaluator;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use opensight_admin::LifecycleCommand;
use opensight_importer::Importer;
use opensight_manager::Manager;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use error::Error;

/// `spec.md` §5's force-terminate timer default.
pub const DEFAULT_FORCE_TERMINATE: Duration = Duration::from_secs(10);

/// Static configuration for one supervisor run.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub bind_address: String,
    pub frontend_dir: Option<PathBuf>,
    pub daemon: bool,
    pub force_terminate: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            frontend_dir: None,
            daemon: false,
            force_terminate: DEFAULT_FORCE_TERMINATE,
        }
    }
}

/// What the caller (`opensight`'s `main`) should do once [`Supervisor::run`]
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Exit,
    Restart,
}

/// Owns one run of the Evaluator + admin API pair and drives them to a
/// clean shutdown.
pub struct Supervisor {
    manager: Arc<Manager>,
    importer: Arc<Importer>,
    config: SupervisorConfig,
}

impl Supervisor {
    #[must_use]
    pub fn new(manager: Arc<Manager>, importer: Arc<Importer>, config: SupervisorConfig) -> Self {
        Self {
            manager,
            importer,
            config,
        }
    }

    /// Runs until a shutdown signal, a lifecycle API call, or an OS signal
    /// is observed, then tears everything down and reports whether the
    /// caller should restart the supervisor or exit the process.
    pub async fn run(self) -> Result<RestartDecision, Error> {
        let admin_cancel = CancellationToken::new();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();

        let eval_handle = evaluator::spawn(self.importer.pipeline().clone())?;

        let admin_task = {
            let bind_address = self.config.bind_address.clone();
            let manager = self.manager.clone();
            let importer = self.importer.clone();
            let frontend_dir = self.config.frontend_dir.clone();
            let daemon = self.config.daemon;
            let cancel = admin_cancel.clone();
            tokio::spawn(async move {
                opensight_admin::run(&bind_address, manager, importer, frontend_dir, daemon, lifecycle_tx, cancel).await
            })
        };

        let decision = wait_for_shutdown(lifecycle_rx).await;

        arm_force_terminate_watchdog(self.config.force_terminate);
        admin_cancel.cancel();

        match admin_task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "admin server exited with an error"),
            Err(err) => warn!(error = %err, "admin server task panicked"),
        }

        eval_handle.shutdown_and_join()?;
        self.manager.fire_shutdown();
        info!("supervisor shutdown complete");

        Ok(decision)
    }
}

/// Blocks until an OS shutdown signal arrives or a lifecycle command is
/// received over the admin API, then returns the resulting decision. Host
/// power commands are executed best-effort here — the OS integration itself
/// is an external collaborator (`spec.md` §1); only requesting it is this
/// crate's job.
async fn wait_for_shutdown(mut lifecycle_rx: mpsc::UnboundedReceiver<LifecycleCommand>) -> RestartDecision {
    tokio::select! {
        () = wait_for_os_signal() => {
            info!("received OS shutdown signal");
            RestartDecision::Exit
        }
        command = lifecycle_rx.recv() => {
            match command {
                Some(LifecycleCommand::Shutdown) | None => RestartDecision::Exit,
                Some(LifecycleCommand::Restart) => RestartDecision::Restart,
                Some(LifecycleCommand::ShutdownHost) => {
                    run_host_power_command(&["-h", "now"]);
                    RestartDecision::Exit
                }
                Some(LifecycleCommand::RestartHost) => {
                    run_host_power_command(&["-r", "now"]);
                    RestartDecision::Exit
                }
                Some(LifecycleCommand::Upgrade(path)) => {
                    info!(path = %path.display(), "upgrade staged, shutting down to let the supervisor apply it");
                    RestartDecision::Exit
                }
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn run_host_power_command(args: &[&str]) {
    match std::process::Command::new("shutdown").args(args).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(?status, "host power command exited non-zero"),
        Err(err) => warn!(error = %err, "failed to invoke host power command"),
    }
}

/// `spec.md` §5: "a supervisor force-terminate timer (default 10s) fires a
/// hard process kill if graceful shutdown stalls". Not present in
/// `original_source/` (whose Python implementation leans on the process
/// supervisor for this); built fresh per `SPEC_FULL.md` §5.
fn arm_force_terminate_watchdog(timeout: Duration) {
    std::thread::spawn(move || {
        std::thread::sleep(timeout);
        error!(?timeout, "graceful shutdown exceeded the force-terminate timeout, killing the process");
        std::process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensight_config::PersistStore;
    use opensight_engine::{FifoLock, FunctionCatalog, Pipeline};

    fn harness() -> (Arc<Manager>, Arc<Importer>, tempfile::TempDir) {
        let manager = Arc::new(Manager::register_all(vec![]));
        let catalog: Arc<dyn FunctionCatalog> = manager.clone();
        let pipeline = Arc::new(FifoLock::new(Pipeline::new(catalog)));
        let dir = tempfile::tempdir().unwrap();
        let store = PersistStore::new(dir.path());
        store.ensure_dirs().unwrap();
        let importer = Arc::new(Importer::new(manager.clone(), pipeline, store));
        (manager, importer, dir)
    }

    #[tokio::test]
    async fn shutdown_command_yields_exit_decision() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(LifecycleCommand::Shutdown).unwrap();
        assert_eq!(wait_for_shutdown(rx).await, RestartDecision::Exit);
    }

    #[tokio::test]
    async fn restart_command_yields_restart_decision() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(LifecycleCommand::Restart).unwrap();
        assert_eq!(wait_for_shutdown(rx).await, RestartDecision::Restart);
    }

    #[tokio::test]
    async fn supervisor_constructs_from_manager_and_importer() {
        let (manager, importer, _dir) = harness();
        let _supervisor = Supervisor::new(manager, importer, SupervisorConfig::default());
    }
}
