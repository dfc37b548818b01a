//! The module registry (`spec.md` §4.2): turns a list of linked-in modules
//! into the two index maps the rest of the runtime needs — a qualified
//! `FuncType -> FunctionDescriptor` catalog and a `package -> ModuleInfo`
//! directory — plus the [`HookBus`](opensight_engine::HookBus) every
//! registered module's Hook is wired into.
//!
//! "Loading a module from disk" in the original has no idiomatic equivalent
//! in a statically compiled binary (`SPEC_FULL.md` §4.2): here a module is a
//! Rust value implementing [`ModuleSource`], and the caller (the `opensight`
//! binary) hands the Manager an explicit list of them at startup, one per
//! linked module crate.

use std::collections::BTreeMap;
use std::sync::Arc;

use opensight_config::FuncType;
use opensight_engine::{function::qualify, FunctionCatalog, FunctionDescriptor, Hook, HookBus};
use thiserror::Error;
use tracing::{info, warn};

/// What went wrong registering one module. Never aborts the whole pass —
/// the Manager catches this per source and moves on (`spec.md` §4.2).
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {package:?} declares more than one Hook")]
    MultipleHooks { package: String },

    #[error("module {package:?} declares {class_name:?} twice")]
    DuplicateInModule { package: String, class_name: String },

    #[error("function type {func_type:?} is already registered by another module")]
    DuplicateFunctionType { func_type: FuncType },
}

/// Accumulates one module's Function registrations and optional Hook before
/// the Manager commits them atomically.
#[derive(Default)]
pub struct ModuleRegistrar {
    package: String,
    version: String,
    funcs: BTreeMap<String, Arc<FunctionDescriptor>>,
    hook: Option<Arc<dyn Hook>>,
}

impl ModuleRegistrar {
    fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            funcs: BTreeMap::new(),
            hook: None,
        }
    }

    /// Registers one Function type under its bare class name. A descriptor
    /// flagged `disabled` (and not `force_enabled`) is filtered out here
    /// rather than committed (`spec.md` §4.2: Function types are "filtered
    /// by `!disabled`").
    pub fn register_function(&mut self, descriptor: FunctionDescriptor) -> Result<(), ModuleError> {
        let class_name = descriptor.class_name.to_string();
        if self.funcs.contains_key(&class_name) {
            return Err(ModuleError::DuplicateInModule {
                package: self.package.clone(),
                class_name,
            });
        }
        if descriptor.flags.disabled && !descriptor.flags.force_enabled {
            info!(module = %self.package, class_name = %class_name, "function type disabled, not registering");
            return Ok(());
        }
        self.funcs.insert(class_name, Arc::new(descriptor));
        Ok(())
    }

    /// Registers this module's Hook. A module may declare at most one
    /// (`spec.md` §4.2 invariant).
    pub fn register_hook(&mut self, hook: Arc<dyn Hook>) -> Result<(), ModuleError> {
        if self.hook.is_some() {
            return Err(ModuleError::MultipleHooks {
                package: self.package.clone(),
            });
        }
        self.hook = Some(hook);
        Ok(())
    }
}

/// A linked-in module: a package name, version, and a callback that
/// registers its Functions (and optionally a Hook) into a
/// [`ModuleRegistrar`].
pub trait ModuleSource: Send + Sync {
    fn package(&self) -> &str;
    fn version(&self) -> &str;
    fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), ModuleError>;
}

/// Directory entry for one successfully registered module.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub package: String,
    pub version: String,
    pub function_count: usize,
}

/// The registry: every Function type reachable by qualified name, every
/// registered module's metadata, and the Hook bus.
pub struct Manager {
    funcs: BTreeMap<FuncType, Arc<FunctionDescriptor>>,
    modules: BTreeMap<String, ModuleInfo>,
    hooks: HookBus,
}

impl Manager {
    /// Registers every source in order. A source whose `register` callback
    /// errors, or whose functions collide with an already-committed module,
    /// is skipped entirely — logged and discarded, never aborting the rest
    /// of the pass (`spec.md` §4.2).
    #[must_use]
    pub fn register_all(sources: Vec<Box<dyn ModuleSource>>) -> Self {
        let mut manager = Self {
            funcs: BTreeMap::new(),
            modules: BTreeMap::new(),
            hooks: HookBus::new(),
        };

        for source in sources {
            let package = source.package().to_string();
            let mut registrar = ModuleRegistrar::new(&package, source.version());

            if let Err(err) = source.register(&mut registrar) {
                warn!(module = %package, error = %err, "module registration failed, skipping");
                continue;
            }

            if let Some(conflict) = registrar
                .funcs
                .keys()
                .map(|class_name| qualify(&package, class_name))
                .find(|qualified| manager.funcs.contains_key(qualified))
            {
                warn!(
                    module = %package,
                    func_type = %conflict,
                    "module's function type collides with an already-registered module, skipping"
                );
                continue;
            }

            let function_count = registrar.funcs.len();
            for (class_name, descriptor) in registrar.funcs {
                manager.funcs.insert(qualify(&package, &class_name), descriptor);
            }
            if let Some(hook) = registrar.hook {
                manager.hooks.register(hook);
            }
            manager.modules.insert(
                package.clone(),
                ModuleInfo {
                    package: package.clone(),
                    version: registrar.version,
                    function_count,
                },
            );
            info!(module = %package, functions = function_count, "module registered");
        }

        manager
    }

    #[must_use]
    pub fn modules(&self) -> &BTreeMap<String, ModuleInfo> {
        &self.modules
    }

    #[must_use]
    pub fn funcs(&self) -> &BTreeMap<FuncType, Arc<FunctionDescriptor>> {
        &self.funcs
    }

    pub fn fire_pipeline_update(&self) {
        self.hooks.fire_pipeline_update();
    }

    /// Fires every registered Hook's `on_shutdown`; order is unspecified,
    /// matching the source's `Manager.shutdown`.
    pub fn fire_shutdown(&self) {
        self.hooks.fire_shutdown();
    }

    #[must_use]
    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }
}

impl FunctionCatalog for Manager {
    fn lookup(&self, func_type: &FuncType) -> Option<Arc<FunctionDescriptor>> {
        self.funcs.get(func_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensight_config::{FunctionFlags, Record, Schema};
    use opensight_engine::{CancelScope, Function, FunctionError, Outcome};

    struct Noop;
    impl Function for Noop {
        fn run(&mut self, _inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
            Ok(Outcome::Empty)
        }
    }

    fn descriptor(class_name: &'static str) -> FunctionDescriptor {
        FunctionDescriptor {
            class_name,
            settings_schema: Schema::default(),
            inputs_schema: Schema::default(),
            outputs_schema: Schema::default(),
            flags: FunctionFlags::default(),
            construct: |_| Ok(Box::new(Noop)),
            validate_settings: |r| Ok(r),
        }
    }

    struct GoodModule;
    impl ModuleSource for GoodModule {
        fn package(&self) -> &str {
            "demo"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), ModuleError> {
            registrar.register_function(descriptor("Five"))?;
            registrar.register_function(descriptor("Sum"))
        }
    }

    struct BrokenModule;
    impl ModuleSource for BrokenModule {
        fn package(&self) -> &str {
            "broken"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), ModuleError> {
            registrar.register_function(descriptor("Thing"))?;
            registrar.register_function(descriptor("Thing"))
        }
    }

    #[test]
    fn one_bad_module_does_not_block_the_rest() {
        let manager = Manager::register_all(vec![Box::new(BrokenModule), Box::new(GoodModule)]);
        assert!(!manager.modules().contains_key("broken"));
        assert!(manager.modules().contains_key("demo"));
        assert!(manager.lookup(&"demo/Five".to_string()).is_some());
    }

    struct DuplicateFuncTypeModule;
    impl ModuleSource for DuplicateFuncTypeModule {
        fn package(&self) -> &str {
            "demo"
        }
        fn version(&self) -> &str {
            "0.2.0"
        }
        fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), ModuleError> {
            registrar.register_function(descriptor("Five"))
        }
    }

    #[test]
    fn duplicate_qualified_function_type_is_rejected() {
        let manager = Manager::register_all(vec![Box::new(GoodModule), Box::new(DuplicateFuncTypeModule)]);
        // First registration of "demo" wins; the second "demo" source
        // collides and is skipped wholesale.
        assert_eq!(manager.modules().get("demo").unwrap().version, "0.1.0");
    }

    struct DisabledModule;
    impl ModuleSource for DisabledModule {
        fn package(&self) -> &str {
            "disabled"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), ModuleError> {
            let mut disabled = descriptor("Gone");
            disabled.flags.disabled = true;
            registrar.register_function(disabled)?;

            let mut forced = descriptor("StillHere");
            forced.flags.disabled = true;
            forced.flags.force_enabled = true;
            registrar.register_function(forced)
        }
    }

    #[test]
    fn disabled_functions_are_filtered_unless_force_enabled() {
        let manager = Manager::register_all(vec![Box::new(DisabledModule)]);
        assert!(manager.lookup(&"disabled/Gone".to_string()).is_none());
        assert!(manager.lookup(&"disabled/StillHere".to_string()).is_some());
        assert_eq!(manager.modules().get("disabled").unwrap().function_count, 1);
    }
}
