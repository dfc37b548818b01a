//! Runs the Pipeline mainloop on a dedicated OS thread (`spec.md` §5: "two
//! independent native threads: the Evaluator and the API executor"),
//! grounded in the teacher's `thread_task::spawn_thread_local_task`
//! shutdown-handle idiom but simplified to a plain blocking loop since the
//! Evaluator has no async work of its own — it only ever blocks acquiring
//! the FIFO lock.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;

use opensight_engine::{FifoLock, Pipeline};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::Error;

const THREAD_NAME: &str = "opensight-evaluator";

/// Best-effort extraction of a panic payload's message, for logging.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Handle to the running Evaluator thread.
pub struct EvaluatorHandle {
    cancel: CancellationToken,
    handle: Option<thread::JoinHandle<()>>,
}

impl EvaluatorHandle {
    /// Requests shutdown and waits for the thread to observe it and exit.
    pub fn shutdown_and_join(mut self) -> Result<(), Error> {
        self.cancel.cancel();
        match self.handle.take().expect("evaluator handle missing").join() {
            Ok(()) => Ok(()),
            Err(panic) => Err(Error::ThreadJoinPanic {
                thread_name: THREAD_NAME.to_string(),
                panic_message: format!("{panic:?}"),
            }),
        }
    }
}

/// Spawns the Evaluator: repeatedly acquires the FIFO lock, runs one pass of
/// topological evaluation, releases it, and re-enqueues — exactly `spec.md`
/// §5's "the evaluator re-enqueues itself like any other client". A pass
/// that panics (a misbehaving module's `Function::run`) is caught so it
/// can't unwind through the lock and poison it for every later acquirer;
/// `spec.md` §4.3/§7 require the loop to log and continue, never wedging
/// the runtime on one bad pass.
pub fn spawn(pipeline: Arc<FifoLock<Pipeline>>) -> Result<EvaluatorHandle, Error> {
    let cancel = CancellationToken::new();
    let thread_cancel = cancel.clone();

    let handle = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            while !thread_cancel.is_cancelled() {
                let mut guard = pipeline.lock();
                if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| guard.evaluate())) {
                    error!(panic = %panic_message(&panic), "evaluator pass panicked, continuing with the next pass");
                }
            }
        })
        .map_err(|source| Error::ThreadSpawnError {
            thread_name: THREAD_NAME.to_string(),
            source,
        })?;

    Ok(EvaluatorHandle {
        cancel,
        handle: Some(handle),
    })
}
