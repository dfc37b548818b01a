//! Step 5-6 of the Importer's algorithm (`spec.md` §4.4): the restart
//! decision, then the lock-guarded swap of the live pipeline's graph
//! followed by a dry-run pass that must reach first-pass success. A panic
//! during `ensure_init` or the dry run is the only way a partial apply can
//! occur once the lock is held — caught here and converted into the
//! `broken=true` state `SPEC_FULL.md` §4.4 prescribes, since there is no
//! clean rollback mid-transaction.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;

use opensight_config::Context;
use opensight_engine::{FunctionCatalog, Pipeline};

use crate::error::ImportError;
use crate::validate::ValidatedGraph;

/// Replaces `pipeline`'s graph with `graph`, honoring the restart policy
/// for nodes that already exist under the same id, then runs one dry-run
/// pass. Leaves `pipeline` broken (and returns `Err`) if anything in this
/// step fails.
pub fn apply(pipeline: &mut Pipeline, graph: &ValidatedGraph, catalog: &dyn FunctionCatalog) -> Result<(), ImportError> {
    let keep: BTreeSet<_> = graph.nodes.iter().map(|n| n.id.clone()).collect();
    pipeline.prune_nodetree(&keep);

    for node in &graph.nodes {
        if pipeline.contains(&node.id) {
            let needs_restart = catalog.lookup(&node.func_type).is_some_and(|descriptor| {
                let old_settings = pipeline.node(&node.id).and_then(|n| n.settings.clone());
                descriptor.flags.always_restart
                    || (descriptor.flags.require_restart && old_settings.as_ref() != Some(&node.settings))
            });
            if needs_restart {
                if let Some(n) = pipeline.node_mut(&node.id) {
                    n.dispose();
                }
            }
        } else {
            pipeline.create_node(node.func_type.clone(), node.id.clone());
        }
        if let Some(n) = pipeline.node_mut(&node.id) {
            n.settings = Some(node.settings.clone());
        }
    }

    for node in &graph.nodes {
        let links = node
            .links
            .iter()
            .map(|(name, link)| (name.clone(), (link.target.clone(), link.output.clone())))
            .collect();
        if pipeline.create_links(&node.id, links).is_none() {
            // Validation already checked every target exists; reaching
            // here would mean the graph changed underneath us between
            // validation and apply.
            pipeline.set_broken(true);
            return Err(ImportError::PartialApply {
                context: Context::node(node.id.as_str()),
                message: "link target vanished mid-apply".to_string(),
            });
        }
    }

    for node in &graph.nodes {
        let Some(descriptor) = catalog.lookup(&node.func_type) else {
            pipeline.set_broken(true);
            return Err(ImportError::PartialApply {
                context: Context::new(node.id.as_str(), node.func_type.as_str()),
                message: "function type vanished mid-apply".to_string(),
            });
        };
        let init_result = pipeline.node_mut(&node.id).map(|n| n.ensure_init(&descriptor));
        if let Some(Err(err)) = init_result {
            pipeline.set_broken(true);
            return Err(ImportError::PartialApply {
                context: Context::new(node.id.as_str(), node.func_type.as_str()),
                message: format!("construction failed: {err}"),
            });
        }
    }

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| pipeline.evaluate()));
    if result.is_err() {
        pipeline.set_broken(true);
        return Err(ImportError::PartialApply {
            context: Context::default(),
            message: "dry-run pass panicked after the graph was already applied".to_string(),
        });
    }

    pipeline.set_broken(false);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{ResolvedLink, ValidatedNode};
    use opensight_config::{FieldSchema, FunctionFlags, Record, Schema, ValueType};
    use opensight_engine::{CancelScope, Function, FunctionDescriptor, FunctionError, Outcome};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    struct Five;
    impl Function for Five {
        fn run(&mut self, _inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
            let mut r = Record::new();
            r.insert("five".into(), opensight_config::DynValue::Int(5));
            Ok(Outcome::Produced(r))
        }
    }

    struct TestCatalog(HashMap<String, Arc<FunctionDescriptor>>);
    impl FunctionCatalog for TestCatalog {
        fn lookup(&self, func_type: &String) -> Option<Arc<FunctionDescriptor>> {
            self.0.get(func_type).cloned()
        }
    }

    fn five_descriptor(sideeffect: bool) -> Arc<FunctionDescriptor> {
        Arc::new(FunctionDescriptor {
            class_name: "Five",
            settings_schema: Schema::default(),
            inputs_schema: Schema::default(),
            outputs_schema: Schema::new(vec![FieldSchema::new("five", ValueType::Int)]),
            flags: FunctionFlags {
                has_sideeffect: sideeffect,
                ..Default::default()
            },
            construct: |_| Ok(Box::new(Five)),
            validate_settings: |r| Ok(r),
        })
    }

    #[test]
    fn apply_installs_nodes_and_reaches_first_pass_success() {
        let mut map = HashMap::new();
        map.insert("demo/Five".to_string(), five_descriptor(true));
        let catalog: Arc<dyn FunctionCatalog> = Arc::new(TestCatalog(map));
        let mut pipeline = opensight_engine::Pipeline::new(catalog.clone());

        let graph = crate::validate::ValidatedGraph {
            nodes: vec![ValidatedNode {
                id: "A".into(),
                func_type: "demo/Five".into(),
                settings: Record::new(),
                links: BTreeMap::<String, ResolvedLink>::new(),
            }],
        };

        apply(&mut pipeline, &graph, catalog.as_ref()).unwrap();
        assert!(!pipeline.is_broken());
        assert!(pipeline.contains("A"));
    }

    static CONSTRUCTIONS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    struct CountingFive;
    impl Function for CountingFive {
        fn run(&mut self, _inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
            Ok(Outcome::Empty)
        }
    }

    fn counting_five_descriptor(require_restart: bool) -> Arc<FunctionDescriptor> {
        Arc::new(FunctionDescriptor {
            class_name: "Five",
            settings_schema: Schema::new(vec![FieldSchema::new("n", ValueType::Int).with_default(opensight_config::DynValue::Int(0))]),
            inputs_schema: Schema::default(),
            outputs_schema: Schema::default(),
            flags: FunctionFlags {
                has_sideeffect: true,
                require_restart,
                ..Default::default()
            },
            construct: |_| {
                CONSTRUCTIONS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Box::new(CountingFive))
            },
            validate_settings: |r| Ok(r),
        })
    }

    #[test]
    fn reapplying_unchanged_settings_does_not_reconstruct_the_instance() {
        CONSTRUCTIONS.store(0, std::sync::atomic::Ordering::SeqCst);
        let mut map = HashMap::new();
        map.insert("demo/Five".to_string(), counting_five_descriptor(true));
        let catalog: Arc<dyn FunctionCatalog> = Arc::new(TestCatalog(map));
        let mut pipeline = opensight_engine::Pipeline::new(catalog.clone());

        let mut settings = Record::new();
        settings.insert("n".into(), opensight_config::DynValue::Int(1));
        let graph = crate::validate::ValidatedGraph {
            nodes: vec![ValidatedNode {
                id: "A".into(),
                func_type: "demo/Five".into(),
                settings,
                links: BTreeMap::<String, ResolvedLink>::new(),
            }],
        };

        apply(&mut pipeline, &graph, catalog.as_ref()).unwrap();
        assert_eq!(CONSTRUCTIONS.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Same settings, require_restart=true: the instance must survive.
        apply(&mut pipeline, &graph, catalog.as_ref()).unwrap();
        assert_eq!(CONSTRUCTIONS.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn changing_settings_on_a_require_restart_node_reconstructs_it() {
        CONSTRUCTIONS.store(0, std::sync::atomic::Ordering::SeqCst);
        let mut map = HashMap::new();
        map.insert("demo/Five".to_string(), counting_five_descriptor(true));
        let catalog: Arc<dyn FunctionCatalog> = Arc::new(TestCatalog(map));
        let mut pipeline = opensight_engine::Pipeline::new(catalog.clone());

        let mut settings = Record::new();
        settings.insert("n".into(), opensight_config::DynValue::Int(1));
        let graph = crate::validate::ValidatedGraph {
            nodes: vec![ValidatedNode {
                id: "A".into(),
                func_type: "demo/Five".into(),
                settings: settings.clone(),
                links: BTreeMap::<String, ResolvedLink>::new(),
            }],
        };
        apply(&mut pipeline, &graph, catalog.as_ref()).unwrap();
        assert_eq!(CONSTRUCTIONS.load(std::sync::atomic::Ordering::SeqCst), 1);

        settings.insert("n".into(), opensight_config::DynValue::Int(2));
        let graph2 = crate::validate::ValidatedGraph {
            nodes: vec![ValidatedNode {
                id: "A".into(),
                func_type: "demo/Five".into(),
                settings,
                links: BTreeMap::<String, ResolvedLink>::new(),
            }],
        };
        apply(&mut pipeline, &graph2, catalog.as_ref()).unwrap();
        assert_eq!(CONSTRUCTIONS.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
