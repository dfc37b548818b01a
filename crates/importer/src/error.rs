//! The Importer's error surface. Every variant is reached by the
//! pre-lock validation pass (`spec.md` §4.4 steps 1-5) except
//! [`ImportError::PartialApply`], which can only occur once step 6 has
//! begun mutating the live pipeline under the FIFO lock.

pub use opensight_config::Context;
use thiserror::Error;

/// Failure modes of [`crate::Importer::import`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Graph(#[from] opensight_config::Error),

    /// A transaction failed after the live pipeline had already begun being
    /// mutated (`SPEC_FULL.md` §4.4): the pipeline is left `broken` rather
    /// than rolled back, since a clean rollback mid-apply isn't possible.
    #[error("{context}: apply failed mid-transaction, pipeline is now broken: {message}")]
    PartialApply {
        context: Context,
        message: String,
    },
}

impl ImportError {
    #[must_use]
    pub fn context(&self) -> Option<&Context> {
        match self {
            ImportError::Graph(err) => err.context(),
            ImportError::PartialApply { context, .. } => Some(context),
        }
    }
}
