//! Value, settings, and nodetree schema model shared across the OpenSight
//! workspace.
//!
//! Three layers live here, leaves first:
//! - [`value`] — the closed set of field types a Function's Settings/
//!   Inputs/Outputs records can use, including the `Range`/`Slide` widgets.
//! - [`nodetree`] — the HTTP/JSON wire schema for the nodetree import/export
//!   format and the function catalog (`/api/funcs`, `/api/nodes`).
//! - [`persist`] — on-disk JSON persistence for profile slots and
//!   preferences.

pub mod error;
pub mod nodetree;
pub mod persist;
pub mod value;

pub use error::{Context, Error};
pub use nodetree::{
    FunctionF, InputOutputF, LinkN, ModuleF, Network, NetworkMode, NodeN, NodeTreeN, Preferences,
    SchemaF,
};
pub use persist::PersistStore;
pub use value::{DynValue, FieldName, FieldSchema, Range, RangeWidget, Record, Schema, ValueType,
    VectorTag};

/// A Function's qualified type name, `package/ClassName`, assigned at
/// registration (`spec.md` §4.2).
pub type FuncType = String;

/// Flags the registry enforces/consults about a Function type (`spec.md`
/// §3, §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionFlags {
    /// True ⇒ the node is an evaluation root; its subgraph must not be
    /// pruned.
    pub has_sideeffect: bool,
    /// True ⇒ changing settings forces a fresh instance.
    pub require_restart: bool,
    /// True ⇒ always reinstantiate on reconfigure.
    pub always_restart: bool,
    /// Registry filter: excluded from registration entirely.
    pub disabled: bool,
    /// Registry filter: included even when not "defined in this module".
    pub force_enabled: bool,
}
