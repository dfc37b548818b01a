//! The Function contract (`spec.md` §4.1): the abstract interface every
//! pluggable node obeys, realized as an explicit **registration
//! descriptor** rather than reflected over a class, per the design note in
//! `spec.md` §9 ("schemas are values, tagged variants, rather than
//! language-level types").

use std::fmt;

use opensight_config::{FuncType, FunctionFlags, Record, Schema};
use thiserror::Error;

use crate::cancel::CancelScope;

/// Failure modes for the Function lifecycle operations in `spec.md` §4.1.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("construct failed: {0}")]
    Construct(String),
    #[error("on_start failed: {0}")]
    OnStart(String),
    #[error("run failed: {0}")]
    Run(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("function instance used after dispose")]
    UseAfterDispose,
}

/// The value a Function's `run` produces: either a populated Outputs record
/// or the "empty" sentinel the source uses to mean "no output this frame".
#[derive(Debug, Clone)]
pub enum Outcome {
    Produced(Record),
    Empty,
}

/// A live Function instance. Module code implements this; the core only
/// calls through it.
pub trait Function: Send {
    /// Called once after construction succeeds. Failure disposes the
    /// instance and propagates (`spec.md` §4.1).
    fn on_start(&mut self) -> Result<(), FunctionError> {
        Ok(())
    }

    /// Called at most once per frame per Node. `cancel` lets the
    /// implementation request that downstream consumers be skipped this
    /// pass (the mechanism behind the Hook bus's `cancel_current`/
    /// `cancel_output`, `spec.md` §4.3/§4.5) — for a node whose Function
    /// owns no side-effect cancellation logic, `cancel` is simply unused.
    fn run(&mut self, inputs: &Record, cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError>;

    /// Idempotent teardown. After this runs, a subsequent `run` is a
    /// programming error the caller must not make; the default is a no-op
    /// for instances with no owned resources.
    fn dispose(&mut self) {}
}

/// Registration-time metadata for one Function type: the explicit
/// descriptor that replaces the source's class reflection.
pub struct FunctionDescriptor {
    /// The bare class name, e.g. `"Five"`. The qualified `package/ClassName`
    /// type is assembled by the registry at registration time.
    pub class_name: &'static str,
    pub settings_schema: Schema,
    pub inputs_schema: Schema,
    pub outputs_schema: Schema,
    pub flags: FunctionFlags,
    /// Constructs a live instance from a validated Settings record. May
    /// fail; failure must leave no partially initialized state visible.
    pub construct: fn(&Record) -> Result<Box<dyn Function>, FunctionError>,
    /// Static validator: fails with a domain error when a setting is out of
    /// range or mutually inconsistent, otherwise returns the (possibly
    /// coerced) settings record.
    pub validate_settings: fn(Record) -> Result<Record, FunctionError>,
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("class_name", &self.class_name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl FunctionDescriptor {
    /// The registry enforces at registration time (`spec.md` §4.1) that
    /// `require_restart` only ever names fields of Inputs; this helper lets
    /// the manager crate check that without duplicating field-name lookup.
    #[must_use]
    pub fn declares_input(&self, field: &str) -> bool {
        self.inputs_schema.field(field).is_some()
    }
}

/// Qualifies a bare class name with its owning module's package, producing
/// the `package/ClassName` form `spec.md` §4.1/§4.2 specify.
#[must_use]
pub fn qualify(package: &str, class_name: &str) -> FuncType {
    format!("{package}/{class_name}")
}
