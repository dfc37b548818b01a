//! A live instance of a Function bound to settings and an input-link map
//! (`spec.md` §3).

use std::collections::BTreeMap;

use opensight_config::{FieldName, FuncType, Record};

use crate::cancel::CancelScope;
use crate::function::{Function, FunctionDescriptor, FunctionError, Outcome};
use crate::link::Link;

/// Opaque stable node identifier.
pub type NodeId = String;

/// A Node: owns per-frame result memoization for one Function instance.
pub struct Node {
    pub id: NodeId,
    pub func_type: FuncType,
    pub settings: Option<Record>,
    pub input_links: BTreeMap<FieldName, Link>,
    pub result: Option<Record>,
    pub has_run: bool,
    pub skip: bool,
    func: Option<Box<dyn Function>>,
}

impl Node {
    #[must_use]
    pub fn new(id: NodeId, func_type: FuncType) -> Self {
        Self {
            id,
            func_type,
            settings: None,
            input_links: BTreeMap::new(),
            result: None,
            has_run: false,
            skip: false,
            func: None,
        }
    }

    /// `func` is non-null ⇔ `settings` has been validated and the instance
    /// is initialized (`spec.md` §3 invariant on Node fields).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.func.is_some()
    }

    /// Resets the per-frame state done at the start of every pass
    /// (`spec.md` §4.3 step 3).
    pub fn reset_frame(&mut self) {
        self.result = None;
        self.has_run = false;
    }

    /// Lazily instantiates the live Function if it hasn't been already,
    /// calling `construct` then `on_start`. On failure the instance is left
    /// absent (no partially initialized state is kept).
    pub fn ensure_init(&mut self, descriptor: &FunctionDescriptor) -> Result<(), FunctionError> {
        if self.func.is_some() {
            return Ok(());
        }
        let settings = self.settings.clone().unwrap_or_default();
        let mut instance = (descriptor.construct)(&settings)?;
        if let Err(err) = instance.on_start() {
            // construct succeeded but on_start failed: dispose immediately,
            // the instance never becomes visible as `func`.
            instance.dispose();
            return Err(err);
        }
        self.func = Some(instance);
        Ok(())
    }

    /// Invokes the live Function's `run`. Caller (`Pipeline::evaluate`) is
    /// responsible for having called `ensure_init` first.
    pub fn run(
        &mut self,
        inputs: &Record,
        cancel: &mut CancelScope<'_>,
    ) -> Result<Outcome, FunctionError> {
        match self.func.as_mut() {
            Some(f) => f.run(inputs, cancel),
            None => Err(FunctionError::UseAfterDispose),
        }
    }

    /// Idempotent teardown; after this, `is_alive` is false.
    pub fn dispose(&mut self) {
        if let Some(mut f) = self.func.take() {
            f.dispose();
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.dispose();
    }
}
