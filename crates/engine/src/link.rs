//! The Link model (`spec.md` §3): a uniform "produce a value" contract over
//! either a constant or another node's named output.

use opensight_config::{DynValue, FieldName};

use crate::node::NodeId;

/// Either a constant value source, or a reference to another node's named
/// output. Mirrors the source's `StaticLink`/`NodeLink`.
#[derive(Debug, Clone)]
pub enum Link {
    /// Returns a constant.
    Static(DynValue),
    /// Returns `target.run().<output>`.
    Node { target: NodeId, output: FieldName },
}

impl Link {
    #[must_use]
    pub fn target(&self) -> Option<&NodeId> {
        match self {
            Link::Static(_) => None,
            Link::Node { target, .. } => Some(target),
        }
    }
}
