//! The evaluation core: Functions, Nodes, Links, and the Pipeline that walks
//! them in topological order, plus the ambient primitives the rest of the
//! workspace builds on (the FIFO lock, the Hook bus, FPS/benchmark
//! instrumentation).
//!
//! This crate depends only on [`opensight_config`]; it defines
//! [`catalog::FunctionCatalog`] rather than depending on the manager crate
//! that implements it, keeping the dependency graph one-directional
//! (config → engine → manager → importer/admin/controller).

pub mod cancel;
pub mod catalog;
pub mod fps;
pub mod function;
pub mod hook;
pub mod link;
pub mod lock;
pub mod node;
pub mod perf;
pub mod pipeline;

pub use cancel::{CancelRequest, CancelScope};
pub use catalog::FunctionCatalog;
pub use fps::FpsCounter;
pub use function::{qualify, Function, FunctionDescriptor, FunctionError, Outcome};
pub use hook::{Hook, HookBus};
pub use link::Link;
pub use lock::{FifoLock, FifoLockGuard};
pub use node::{Node, NodeId};
pub use perf::{BenchmarkState, CalculatedItemPerformance, CalculatedPerformance};
pub use pipeline::Pipeline;
