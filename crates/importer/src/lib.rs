//! The Importer (`spec.md` §4.4): the only component permitted to build a
//! new graph from untrusted input. Validation (steps 1-5, [`validate`])
//! runs outside the FIFO lock; applying the validated graph (steps 5-6,
//! [`apply`]) runs under it, so the evaluator is only ever blocked for the
//! duration of an actual swap, never for the cost of validating a
//! rejected one.

mod apply;
mod error;
mod validate;

use std::sync::Arc;

use opensight_config::{NodeTreeN, PersistStore};
use opensight_engine::{FifoLock, Pipeline};
use opensight_manager::Manager;
use tracing::{info, warn};

pub use error::ImportError;
pub use validate::{validate, ResolvedLink, ValidatedGraph, ValidatedNode};

/// Owns the plumbing an import needs: the module registry (for type
/// resolution and firing `pipeline_update`), the shared FIFO-locked
/// pipeline, and the on-disk persistence store.
pub struct Importer {
    manager: Arc<Manager>,
    pipeline: Arc<FifoLock<Pipeline>>,
    store: PersistStore,
}

impl Importer {
    #[must_use]
    pub fn new(manager: Arc<Manager>, pipeline: Arc<FifoLock<Pipeline>>, store: PersistStore) -> Self {
        Self {
            manager,
            pipeline,
            store,
        }
    }

    /// Runs the full transactional import (`spec.md` §4.4 steps 1-7).
    ///
    /// On success, the live pipeline now runs `tree` and it has been
    /// persisted to `profile`'s slot. On failure, the live pipeline is left
    /// untouched unless the failure occurred mid-apply (in which case it is
    /// marked broken, per `SPEC_FULL.md` §4.4); when `force_save` is set,
    /// the rejected tree is still written to a side file for out-of-band
    /// correction.
    pub fn import(&self, tree: NodeTreeN, profile: u8, force_save: bool) -> Result<(), ImportError> {
        let graph = match validate::validate(&tree, self.manager.as_ref()) {
            Ok(graph) => graph,
            Err(err) => {
                if force_save {
                    if let Err(store_err) = self.store.save_rejected_nodetree(profile, &tree) {
                        warn!(error = %store_err, "failed to persist rejected nodetree");
                    }
                }
                return Err(err.into());
            }
        };

        let mut guard = self.pipeline.lock();
        apply::apply(&mut guard, &graph, self.manager.as_ref())?;
        self.manager.fire_pipeline_update();
        self.store.save_nodetree(profile, &tree)?;
        drop(guard);

        info!(profile, nodes = graph.nodes.len(), "nodetree imported");
        Ok(())
    }

    #[must_use]
    pub fn pipeline(&self) -> &Arc<FifoLock<Pipeline>> {
        &self.pipeline
    }

    #[must_use]
    pub fn store(&self) -> &PersistStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensight_config::{FieldSchema, FunctionFlags, LinkN, NodeN, Record, Schema, ValueType};
    use opensight_engine::{CancelScope, Function, FunctionDescriptor, FunctionError, Outcome};
    use opensight_manager::{ModuleError, ModuleRegistrar, ModuleSource};
    use std::collections::BTreeMap;

    struct Five;
    impl Function for Five {
        fn run(&mut self, _inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
            let mut r = Record::new();
            r.insert("five".into(), opensight_config::DynValue::Int(5));
            Ok(Outcome::Produced(r))
        }
    }

    struct Print;
    impl Function for Print {
        fn run(&mut self, _inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
            Ok(Outcome::Empty)
        }
    }

    struct DemoModule;
    impl ModuleSource for DemoModule {
        fn package(&self) -> &str {
            "demo"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn register(&self, registrar: &mut ModuleRegistrar) -> Result<(), ModuleError> {
            registrar.register_function(FunctionDescriptor {
                class_name: "Five",
                settings_schema: Schema::default(),
                inputs_schema: Schema::default(),
                outputs_schema: Schema::new(vec![FieldSchema::new("five", ValueType::Int)]),
                flags: FunctionFlags::default(),
                construct: |_| Ok(Box::new(Five)),
                validate_settings: |r| Ok(r),
            })?;
            registrar.register_function(FunctionDescriptor {
                class_name: "Print",
                settings_schema: Schema::default(),
                inputs_schema: Schema::new(vec![FieldSchema::new("val", ValueType::Any)]),
                outputs_schema: Schema::default(),
                flags: FunctionFlags {
                    has_sideeffect: true,
                    ..Default::default()
                },
                construct: |_| Ok(Box::new(Print)),
                validate_settings: |r| Ok(r),
            })
        }
    }

    fn node(id: &str, func_type: &str, inputs: Vec<(&str, Option<(&str, &str)>)>) -> NodeN {
        NodeN {
            func_type: func_type.to_string(),
            id: id.to_string(),
            settings: BTreeMap::new(),
            inputs: inputs
                .into_iter()
                .map(|(name, link)| {
                    (
                        name.to_string(),
                        link.map(|(id, name)| LinkN {
                            id: id.to_string(),
                            name: name.to_string(),
                        }),
                    )
                })
                .collect(),
            pos: None,
            extras: None,
        }
    }

    fn harness() -> (Importer, tempfile::TempDir) {
        let manager = Arc::new(Manager::register_all(vec![Box::new(DemoModule)]));
        let catalog: Arc<dyn opensight_engine::FunctionCatalog> = manager.clone();
        let pipeline = Arc::new(FifoLock::new(Pipeline::new(catalog)));
        let dir = tempfile::tempdir().unwrap();
        let store = PersistStore::new(dir.path());
        store.ensure_dirs().unwrap();
        (Importer::new(manager, pipeline, store), dir)
    }

    #[test]
    fn successful_import_persists_and_runs() {
        let (importer, _dir) = harness();
        let good = NodeTreeN {
            nodes: vec![
                node("A", "demo/Five", vec![]),
                node("B", "demo/Print", vec![("val", Some(("A", "five")))]),
            ],
        };
        importer.import(good, 0, false).unwrap();
        assert!(!importer.pipeline().lock().is_broken());
        assert_eq!(importer.store().load_nodetree(0).unwrap().nodes.len(), 2);
    }

    #[test]
    fn failed_import_leaves_the_prior_tree_and_pipeline_untouched() {
        let (importer, _dir) = harness();
        let good = NodeTreeN {
            nodes: vec![
                node("A", "demo/Five", vec![]),
                node("B", "demo/Print", vec![("val", Some(("A", "five")))]),
            ],
        };
        importer.import(good, 0, false).unwrap();

        let broken = NodeTreeN {
            nodes: vec![node("C", "demo/DoesNotExist", vec![])],
        };
        let result = importer.import(broken, 0, true);
        assert!(result.is_err());

        // The live pipeline is untouched: it never saw the candidate graph.
        assert!(!importer.pipeline().lock().is_broken());
        assert!(importer.pipeline().lock().contains("A"));

        // The served tree is still the good one; the rejected candidate
        // only landed in the side file.
        let served = importer.store().load_nodetree(0).unwrap();
        assert_eq!(served.nodes.len(), 2);
    }
}
