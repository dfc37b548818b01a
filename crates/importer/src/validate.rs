//! Steps 1-5 of the Importer's algorithm (`spec.md` §4.4): graph shape
//! (duplicate ids, dangling links, unknown outputs), cycle detection, type
//! resolution against the catalog, the settings fallback, and pruning to
//! the side-effect-reachable subgraph. Runs entirely outside the FIFO lock
//! (`SPEC_FULL.md` §4.4) — nothing here touches the live pipeline.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use opensight_config::{Context, DynValue, Error, FieldName, FuncType, NodeN, NodeTreeN, Record, ValueType};
use opensight_engine::{FunctionCatalog, FunctionDescriptor, NodeId};

/// A link whose target has already been checked to exist and to name a
/// real output field. The wire schema only carries node-to-node links
/// (constants live in Settings, not Inputs); this type exists so the apply
/// step never has to re-check what validation already established.
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    pub target: NodeId,
    pub output: FieldName,
}

/// One node of a fully validated, pruned import, ready to be applied to the
/// live `Pipeline` under the lock.
#[derive(Debug, Clone)]
pub struct ValidatedNode {
    pub id: NodeId,
    pub func_type: FuncType,
    pub settings: Record,
    pub links: BTreeMap<FieldName, ResolvedLink>,
}

/// The outcome of validating and pruning one `NodeTreeN`.
#[derive(Debug, Clone, Default)]
pub struct ValidatedGraph {
    pub nodes: Vec<ValidatedNode>,
}

/// Runs steps 1-5 against `tree`, returning the pruned, fully-resolved
/// graph or the first validation failure encountered.
pub fn validate(tree: &NodeTreeN, catalog: &dyn FunctionCatalog) -> Result<ValidatedGraph, Error> {
    let mut seen_ids = BTreeSet::new();
    for node in &tree.nodes {
        if !seen_ids.insert(node.id.clone()) {
            return Err(Error::DuplicateNode {
                node_id: node.id.clone(),
            });
        }
    }

    // Step: type resolution.
    let mut descriptors: BTreeMap<NodeId, Arc<FunctionDescriptor>> = BTreeMap::new();
    for node in &tree.nodes {
        let descriptor = catalog.lookup(&node.func_type).ok_or_else(|| Error::UnknownFunctionType {
            context: Context::node(node.id.as_str()),
            function_type: node.func_type.clone(),
        })?;
        descriptors.insert(node.id.clone(), descriptor);
    }

    // Step: dangling links and unknown outputs.
    for node in &tree.nodes {
        for (input_name, link) in &node.inputs {
            let Some(link) = link else { continue };
            let target_descriptor = descriptors.get(&link.id).ok_or_else(|| Error::DanglingLink {
                context: Context::new(node.id.as_str(), node.func_type.as_str()),
                target: link.id.clone(),
            })?;
            if target_descriptor.outputs_schema.field(&link.name).is_none() {
                return Err(Error::UnknownOutput {
                    context: Context::new(node.id.as_str(), node.func_type.as_str()),
                    target: link.id.clone(),
                    output: link.name.clone(),
                });
            }
            let _ = input_name;
        }
    }

    // Step: cycle detection via Kahn's algorithm over the full (unpruned)
    // graph — mirrors `Pipeline::recompute_run_order`'s algorithm.
    let adjacency = dependency_adjacency(tree);
    assert_acyclic(tree, &adjacency)?;

    // Step: settings fallback (provided -> declared default -> widget
    // default-construct), resolved per `SPEC_FULL.md` §4.3's closure of the
    // Open Question on default widget values.
    let mut validated: BTreeMap<NodeId, ValidatedNode> = BTreeMap::new();
    for node in &tree.nodes {
        let descriptor = &descriptors[&node.id];
        let settings = resolve_settings(node, descriptor)?;
        let settings = (descriptor.validate_settings)(settings).map_err(|err| Error::InvalidSettings {
            context: Context::new(node.id.as_str(), node.func_type.as_str()),
            message: err.to_string(),
        })?;
        let links = node
            .inputs
            .iter()
            .filter_map(|(name, link)| {
                // `None` means "left unconnected" — simply absent from the
                // resolved link map, not a placeholder value. A Node with
                // fewer resolved inputs than its arity produces no output
                // this pass (`spec.md` §4.3).
                link.as_ref().map(|l| {
                    (
                        name.clone(),
                        ResolvedLink {
                            target: l.id.clone(),
                            output: l.name.clone(),
                        },
                    )
                })
            })
            .collect();
        validated.insert(
            node.id.clone(),
            ValidatedNode {
                id: node.id.clone(),
                func_type: node.func_type.clone(),
                settings,
                links,
            },
        );
    }

    // Step: prune to the subgraph reachable (via dependency edges) from
    // every side-effect root.
    let keep = reachable_from_sideeffects(tree, &adjacency, &descriptors);
    let nodes = tree
        .nodes
        .iter()
        .filter(|n| keep.contains(&n.id))
        .map(|n| validated.remove(&n.id).expect("validated above"))
        .collect();

    Ok(ValidatedGraph { nodes })
}

/// `node id -> set of node ids it directly depends on` (its `NodeLink`
/// targets), built from the declared inputs.
fn dependency_adjacency(tree: &NodeTreeN) -> BTreeMap<NodeId, BTreeSet<NodeId>> {
    let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> =
        tree.nodes.iter().map(|n| (n.id.clone(), BTreeSet::new())).collect();
    for node in &tree.nodes {
        for link in node.inputs.values().flatten() {
            adjacency.get_mut(&node.id).expect("seeded above").insert(link.id.clone());
        }
    }
    adjacency
}

fn assert_acyclic(tree: &NodeTreeN, adjacency: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> Result<(), Error> {
    let mut remaining: BTreeMap<NodeId, usize> =
        adjacency.iter().map(|(id, deps)| (id.clone(), deps.len())).collect();
    let mut consumers: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for (node, deps) in adjacency {
        for dep in deps {
            consumers.entry(dep.clone()).or_default().push(node.clone());
        }
    }

    let mut ready: VecDeque<NodeId> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let mut resolved = 0usize;
    while let Some(id) = ready.pop_front() {
        resolved += 1;
        if let Some(cs) = consumers.get(&id) {
            for c in cs {
                let count = remaining.get_mut(c).expect("seeded above");
                *count -= 1;
                if *count == 0 {
                    ready.push_back(c.clone());
                }
            }
        }
    }

    if resolved != tree.nodes.len() {
        let stuck: Vec<NodeId> = remaining
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(id, _)| id)
            .collect();
        return Err(Error::CycleDetected { nodes: stuck });
    }
    Ok(())
}

fn reachable_from_sideeffects(
    tree: &NodeTreeN,
    adjacency: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    descriptors: &BTreeMap<NodeId, Arc<FunctionDescriptor>>,
) -> BTreeSet<NodeId> {
    let mut keep = BTreeSet::new();
    let mut stack: Vec<NodeId> = tree
        .nodes
        .iter()
        .filter(|n| descriptors[&n.id].flags.has_sideeffect)
        .map(|n| n.id.clone())
        .collect();
    while let Some(id) = stack.pop() {
        if keep.insert(id.clone()) {
            if let Some(deps) = adjacency.get(&id) {
                stack.extend(deps.iter().cloned());
            }
        }
    }
    keep
}

/// Fallback chain for one node's settings: provided JSON value, then the
/// field's declared default, then (for widget types) a default-constructed
/// value. A field with none of the three is an error.
fn resolve_settings(node: &NodeN, descriptor: &FunctionDescriptor) -> Result<Record, Error> {
    let ctx = Context::new(node.id.as_str(), node.func_type.as_str());
    let mut settings = Record::new();
    for field in &descriptor.settings_schema.fields {
        let value = if let Some(json) = node.settings.get(&field.name) {
            coerce(json, &field.value_type, &ctx)?
        } else if let Some(default) = &field.default {
            default.clone()
        } else {
            default_construct_field(&field.value_type, &ctx)?
        };
        settings.insert(field.name.clone(), value);
    }
    Ok(settings)
}

fn default_construct_field(value_type: &ValueType, ctx: &Context) -> Result<DynValue, Error> {
    match value_type {
        ValueType::Range(widget) => Ok(DynValue::Range(widget.default_range())),
        ValueType::Slide(widget) => Ok(DynValue::Slide(widget.default_slide())),
        ValueType::Enum(items) => items.first().cloned().map(DynValue::Enum).ok_or_else(|| Error::InvalidSettings {
            context: ctx.clone(),
            message: "enum type declares no options to default-construct".into(),
        }),
        other => Err(Error::MissingSettingsKey {
            context: ctx.clone(),
            key: format!("<no default available for {}>", other.type_name()),
        }),
    }
}

fn coerce(json: &serde_json::Value, value_type: &ValueType, ctx: &Context) -> Result<DynValue, Error> {
    match value_type {
        ValueType::Int => json
            .as_i64()
            .map(DynValue::Int)
            .ok_or_else(|| invalid(ctx, "expected an integer")),
        ValueType::Float => json
            .as_f64()
            .map(DynValue::Float)
            .ok_or_else(|| invalid(ctx, "expected a number")),
        ValueType::Bool => json
            .as_bool()
            .map(DynValue::Bool)
            .ok_or_else(|| invalid(ctx, "expected a boolean")),
        ValueType::Str => json
            .as_str()
            .map(|s| DynValue::Str(s.to_string()))
            .ok_or_else(|| invalid(ctx, "expected a string")),
        ValueType::Enum(items) => {
            let s = json.as_str().ok_or_else(|| invalid(ctx, "expected a string"))?;
            if !items.iter().any(|i| i == s) {
                return Err(invalid(ctx, &format!("{s:?} is not one of {items:?}")));
            }
            Ok(DynValue::Enum(s.to_string()))
        }
        ValueType::Range(widget) => {
            let min = json.get("min").and_then(serde_json::Value::as_f64).ok_or_else(|| invalid(ctx, "range missing min"))?;
            let max = json.get("max").and_then(serde_json::Value::as_f64).ok_or_else(|| invalid(ctx, "range missing max"))?;
            widget
                .create_range(min, max, ctx)
                .map(DynValue::Range)
        }
        ValueType::Slide(widget) => {
            let value = json.as_f64().ok_or_else(|| invalid(ctx, "expected a number"))?;
            widget.create_slide(value, ctx).map(DynValue::Slide)
        }
        ValueType::Any | ValueType::Vector(_) => Ok(DynValue::Any(Box::new(best_effort_scalar(json)))),
    }
}

fn best_effort_scalar(json: &serde_json::Value) -> DynValue {
    if let Some(i) = json.as_i64() {
        DynValue::Int(i)
    } else if let Some(f) = json.as_f64() {
        DynValue::Float(f)
    } else if let Some(b) = json.as_bool() {
        DynValue::Bool(b)
    } else {
        DynValue::Str(json.to_string())
    }
}

fn invalid(ctx: &Context, message: &str) -> Error {
    Error::InvalidSettings {
        context: ctx.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensight_config::{FieldSchema, FunctionFlags, LinkN, Schema};
    use opensight_engine::{CancelScope, Function, FunctionError, Outcome};
    use std::collections::HashMap;

    struct Noop;
    impl Function for Noop {
        fn run(&mut self, _inputs: &Record, _cancel: &mut CancelScope<'_>) -> Result<Outcome, FunctionError> {
            Ok(Outcome::Empty)
        }
    }

    struct TestCatalog(HashMap<FuncType, Arc<FunctionDescriptor>>);
    impl FunctionCatalog for TestCatalog {
        fn lookup(&self, func_type: &FuncType) -> Option<Arc<FunctionDescriptor>> {
            self.0.get(func_type).cloned()
        }
    }

    fn catalog_with_sum_and_print() -> TestCatalog {
        let mut map = HashMap::new();
        map.insert(
            "demo/Five".to_string(),
            Arc::new(FunctionDescriptor {
                class_name: "Five",
                settings_schema: Schema::default(),
                inputs_schema: Schema::default(),
                outputs_schema: Schema::new(vec![FieldSchema::new("five", ValueType::Int)]),
                flags: FunctionFlags::default(),
                construct: |_| Ok(Box::new(Noop)),
                validate_settings: |r| Ok(r),
            }),
        );
        map.insert(
            "demo/Print".to_string(),
            Arc::new(FunctionDescriptor {
                class_name: "Print",
                settings_schema: Schema::default(),
                inputs_schema: Schema::new(vec![FieldSchema::new("val", ValueType::Any)]),
                outputs_schema: Schema::default(),
                flags: FunctionFlags {
                    has_sideeffect: true,
                    ..Default::default()
                },
                construct: |_| Ok(Box::new(Noop)),
                validate_settings: |r| Ok(r),
            }),
        );
        TestCatalog(map)
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

    #[test]
    fn prunes_nodes_with_no_sideeffect_consumer() {
        let tree = NodeTreeN {
            nodes: vec![node("A", "demo/Five", vec![])],
        };
        let catalog = catalog_with_sum_and_print();
        let graph = validate(&tree, &catalog).unwrap();
        assert!(graph.nodes.is_empty(), "A has no side-effect consumer, must be pruned");
    }

    #[test]
    fn keeps_ancestors_of_a_sideeffect_node() {
        let tree = NodeTreeN {
            nodes: vec![
                node("A", "demo/Five", vec![]),
                node("B", "demo/Print", vec![("val", Some(("A", "five")))]),
            ],
        };
        let catalog = catalog_with_sum_and_print();
        let graph = validate(&tree, &catalog).unwrap();
        let ids: BTreeSet<_> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        assert!(ids.contains("A"));
        assert!(ids.contains("B"));
    }

    #[test]
    fn rejects_cycles() {
        let tree = NodeTreeN {
            nodes: vec![
                node("A", "demo/Print", vec![("val", Some(("B", "five")))]),
                node("B", "demo/Print", vec![("val", Some(("A", "five")))]),
            ],
        };
        let catalog = catalog_with_sum_and_print();
        assert!(matches!(validate(&tree, &catalog), Err(Error::CycleDetected { .. })));
    }

    #[test]
    fn rejects_dangling_links() {
        let tree = NodeTreeN {
            nodes: vec![node("B", "demo/Print", vec![("val", Some(("missing", "five")))])],
        };
        let catalog = catalog_with_sum_and_print();
        assert!(matches!(validate(&tree, &catalog), Err(Error::DanglingLink { .. })));
    }

    #[test]
    fn rejects_unknown_function_types() {
        let tree = NodeTreeN {
            nodes: vec![node("A", "demo/DoesNotExist", vec![])],
        };
        let catalog = catalog_with_sum_and_print();
        assert!(matches!(validate(&tree, &catalog), Err(Error::UnknownFunctionType { .. })));
    }

    #[test]
    fn runs_the_function_s_own_settings_validator() {
        let mut map = HashMap::new();
        map.insert(
            "demo/Picky".to_string(),
            Arc::new(FunctionDescriptor {
                class_name: "Picky",
                settings_schema: Schema::default(),
                inputs_schema: Schema::default(),
                outputs_schema: Schema::default(),
                flags: FunctionFlags {
                    has_sideeffect: true,
                    ..Default::default()
                },
                construct: |_| Ok(Box::new(Noop)),
                validate_settings: |_| Err(FunctionError::InvalidSettings("always rejects".into())),
            }),
        );
        let catalog = TestCatalog(map);
        let tree = NodeTreeN {
            nodes: vec![node("A", "demo/Picky", vec![])],
        };
        assert!(matches!(validate(&tree, &catalog), Err(Error::InvalidSettings { .. })));
    }
}
