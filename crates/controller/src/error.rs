//! Errors for the controller crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("admin server error: {0}")]
    Admin(#[from] opensight_admin::Error),

    #[error("failed to spawn thread {thread_name:?}: {source}")]
    ThreadSpawnError {
        thread_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("thread {thread_name:?} panicked: {panic_message}")]
    ThreadJoinPanic {
        thread_name: String,
        panic_message: String,
    },
}
