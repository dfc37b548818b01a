//! Error taxonomy shared by the config, importer, and manager crates.
//!
//! Follows the same shape as a typical `thiserror` + context-struct design:
//! most variants carry a [`Context`] identifying the node/function the error
//! originated from, so a caller (the HTTP layer, a log line) can report
//! `{node, type, message}` without re-deriving it.

use std::fmt;

use thiserror::Error;

/// Identifies where in a nodetree an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub node_id: Option<String>,
    pub function_type: Option<String>,
}

impl Context {
    #[must_use]
    pub fn new(node_id: impl Into<String>, function_type: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            function_type: Some(function_type.into()),
        }
    }

    #[must_use]
    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            function_type: None,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.node_id, &self.function_type) {
            (Some(n), Some(t)) => write!(f, "node {n} ({t})"),
            (Some(n), None) => write!(f, "node {n}"),
            _ => write!(f, "<no context>"),
        }
    }
}

/// Top-level error type for settings/nodetree validation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{context}: missing key in settings: {key}")]
    MissingSettingsKey { context: Context, key: String },

    #[error("{context}: invalid settings: {message}")]
    InvalidSettings { context: Context, message: String },

    #[error("{context}: value out of range: {message}")]
    OutOfRange { context: Context, message: String },

    #[error("{context}: unknown function type {function_type}")]
    UnknownFunctionType {
        context: Context,
        function_type: String,
    },

    #[error("cycle detected among nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    #[error("duplicate node id: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("{context}: dangling link reference to {target}")]
    DanglingLink { context: Context, target: String },

    #[error("{context}: link references unknown output {output} on {target}")]
    UnknownOutput {
        context: Context,
        target: String,
        output: String,
    },

    #[error("io error reading {path}: {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("deserialization error in {path}: {source}")]
    DeserializationError {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    #[must_use]
    pub fn context(&self) -> Option<&Context> {
        match self {
            Error::MissingSettingsKey { context, .. }
            | Error::InvalidSettings { context, .. }
            | Error::OutOfRange { context, .. }
            | Error::UnknownFunctionType { context, .. }
            | Error::DanglingLink { context, .. }
            | Error::UnknownOutput { context, .. } => Some(context),
            _ => None,
        }
    }
}
