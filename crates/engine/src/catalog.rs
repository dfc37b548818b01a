//! The abstract lookup the Pipeline needs from a module registry, kept as a
//! trait so this crate never depends on the manager crate (the Pipeline
//! "does not know about concrete Hooks, only the Hook bus" — `spec.md` §9 —
//! and likewise it knows nothing about how Functions are registered, only
//! that it can look one up by qualified type).

use std::sync::Arc;

use opensight_config::FuncType;

use crate::function::FunctionDescriptor;

/// Looks up a registered Function's descriptor by its qualified
/// `package/ClassName` type.
pub trait FunctionCatalog: Send + Sync {
    fn lookup(&self, func_type: &FuncType) -> Option<Arc<FunctionDescriptor>>;
}
