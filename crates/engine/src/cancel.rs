//! The cancellation side-channel a running Function uses to ask the
//! Pipeline to skip its downstream consumers this pass (`spec.md` §4.3,
//! §4.5). Threaded through [`crate::function::Function::run`] rather than
//! via a free-floating Hook↔Pipeline back-reference: a Function already
//! runs with exclusive, reentrant-free access to the pass's bookkeeping, so
//! handing it a scoped request sink avoids re-entering the Pipeline's own
//! lock from inside a call it is already making.

use opensight_config::FieldName;

use crate::node::NodeId;

/// One deferred cancellation request collected during a node's `run` and
/// applied immediately afterward by the Pipeline.
#[derive(Debug, Clone)]
pub enum CancelRequest {
    /// Skip the full transitive closure of consumers of the current node.
    Current,
    /// Skip the full transitive closure of consumers of the current node's
    /// named output (starting from its direct consumers).
    Output(FieldName),
}

/// Handed to a Function's `run` for the duration of that call.
pub struct CancelScope<'a> {
    current: &'a NodeId,
    requests: &'a mut Vec<CancelRequest>,
}

impl<'a> CancelScope<'a> {
    pub(crate) fn new(current: &'a NodeId, requests: &'a mut Vec<CancelRequest>) -> Self {
        Self { current, requests }
    }

    /// The node currently executing (the one that owns this scope).
    #[must_use]
    pub fn current(&self) -> &NodeId {
        self.current
    }

    /// Request that every node transitively downstream of this one be
    /// skipped for the rest of this pass.
    pub fn cancel_current(&mut self) {
        self.requests.push(CancelRequest::Current);
    }

    /// Request that the direct consumers of this node's named output, and
    /// everything transitively downstream of them, be skipped for the rest
    /// of this pass.
    pub fn cancel_output(&mut self, name: impl Into<FieldName>) {
        self.requests.push(CancelRequest::Output(name.into()));
    }
}
