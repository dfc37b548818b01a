//! The Pipeline (`spec.md` §4.3): owns the node set, adjacency, topological
//! order, per-frame skip flags, and the single-pass evaluator.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use opensight_config::{DynValue, FieldName, FieldSchema, FuncType, Record, Schema};
use tracing::warn;

use crate::cancel::{CancelRequest, CancelScope};
use crate::catalog::FunctionCatalog;
use crate::function::Outcome;
use crate::link::Link;
use crate::node::{Node, NodeId};
use crate::perf::{BenchmarkState, CalculatedPerformance};
use crate::fps::FpsCounter;

/// Owns the live DAG and evaluates it one pass at a time.
pub struct Pipeline {
    nodes: BTreeMap<NodeId, Node>,
    /// node → the set of nodes it depends on (producers it reads from).
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// node → the set of nodes that depend on it; rebuilt alongside
    /// `run_order`.
    consumers: BTreeMap<NodeId, BTreeSet<NodeId>>,
    insertion_order: Vec<NodeId>,
    run_order: Vec<NodeId>,
    current: Option<NodeId>,
    broken: bool,
    catalog: Arc<dyn FunctionCatalog>,
    fps: FpsCounter,
    benchmark: Option<BenchmarkState>,
}

impl Pipeline {
    #[must_use]
    pub fn new(catalog: Arc<dyn FunctionCatalog>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            adjacency: BTreeMap::new(),
            consumers: BTreeMap::new(),
            insertion_order: Vec::new(),
            run_order: Vec::new(),
            current: None,
            broken: false,
            catalog,
            fps: FpsCounter::new(),
            benchmark: None,
        }
    }

    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn set_broken(&mut self, broken: bool) {
        self.broken = broken;
    }

    #[must_use]
    pub fn current(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.insertion_order.clone()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn run_order(&self) -> &[NodeId] {
        &self.run_order
    }

    pub fn enter_benchmark_mode(&mut self) {
        self.benchmark = Some(BenchmarkState::default());
    }

    pub fn leave_benchmark_mode(&mut self) {
        self.benchmark = None;
    }

    #[must_use]
    pub fn benchmark_stats(&self) -> Option<CalculatedPerformance> {
        self.benchmark.as_ref().map(BenchmarkState::calculate)
    }

    // ---- graph mutation (spec.md §4.3) ----

    /// Creates a new Node; inserts an empty adjacency entry; does not wire
    /// inputs.
    pub fn create_node(&mut self, func_type: FuncType, id: NodeId) {
        self.nodes.insert(id.clone(), Node::new(id.clone(), func_type));
        self.adjacency.entry(id.clone()).or_default();
        self.insertion_order.push(id);
        self.run_order.clear();
    }

    /// For each entry, looks up the source Node, adds it to
    /// `adjacency[target]`, and sets `target.input_links[name] =
    /// NodeLink(source, output)`. A missing source id returns `None`; the
    /// caller (the Importer) reports that as an import error — by this
    /// point in the Importer's algorithm every reference has already been
    /// validated, so this is a defensive check, not the primary validation
    /// path.
    #[must_use]
    pub fn create_links(
        &mut self,
        target: &NodeId,
        links: BTreeMap<FieldName, (NodeId, FieldName)>,
    ) -> Option<()> {
        for (name, (source, output)) in links {
            if !self.nodes.contains_key(&source) {
                return None;
            }
            self.adjacency.entry(target.clone()).or_default().insert(source.clone());
            if let Some(node) = self.nodes.get_mut(target) {
                node.input_links.insert(name, Link::Node { target: source, output });
            }
        }
        self.run_order.clear();
        Some(())
    }

    /// Installs a `StaticLink`.
    pub fn set_static_link(&mut self, node: &NodeId, name: FieldName, value: DynValue) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.input_links.insert(name, Link::Static(value));
        }
        self.run_order.clear();
    }

    /// Disposes every Node whose id is not in `keep_ids`, removes it from
    /// `nodes` and `adjacency`, and clears run state.
    pub fn prune_nodetree(&mut self, keep_ids: &BTreeSet<NodeId>) {
        let remove: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !keep_ids.contains(*id))
            .cloned()
            .collect();
        for id in &remove {
            self.nodes.remove(id);
            self.adjacency.remove(id);
        }
        self.insertion_order.retain(|id| !remove.contains(id));
        let remaining: BTreeSet<NodeId> = self.nodes.keys().cloned().collect();
        for deps in self.adjacency.values_mut() {
            deps.retain(|d| remaining.contains(d));
        }
        self.run_order.clear();
    }

    /// Resets links and run_order but preserves Node identities (used when
    /// replacing the graph wholesale).
    pub fn clear(&mut self) {
        for node in self.nodes.values_mut() {
            node.input_links.clear();
        }
        self.adjacency = self.nodes.keys().map(|id| (id.clone(), BTreeSet::new())).collect();
        self.consumers.clear();
        self.run_order.clear();
    }

    fn recompute_run_order(&mut self) {
        self.consumers.clear();
        for (node, deps) in &self.adjacency {
            for dep in deps {
                self.consumers.entry(dep.clone()).or_default().insert(node.clone());
            }
        }

        let mut remaining: BTreeMap<NodeId, usize> = self
            .nodes
            .keys()
            .map(|id| (id.clone(), self.adjacency.get(id).map_or(0, BTreeSet::len)))
            .collect();

        let mut ready: VecDeque<NodeId> = self
            .insertion_order
            .iter()
            .filter(|id| remaining.get(*id).copied() == Some(0))
            .cloned()
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id.clone());
            if let Some(cons) = self.consumers.get(&id) {
                // Advance consumers in stable insertion order so ties are
                // broken deterministically (spec.md §4.3 step 2).
                for c in self.insertion_order.iter().filter(|c| cons.contains(*c)) {
                    if let Some(r) = remaining.get_mut(c) {
                        *r -= 1;
                        if *r == 0 {
                            ready.push_back(c.clone());
                        }
                    }
                }
            }
        }

        // Cycles are impossible by invariant 1 (the Importer rejects them
        // before anything reaches the Pipeline); this is the "defensive
        // assert" spec.md §4.3 step 2 calls for.
        debug_assert_eq!(
            order.len(),
            self.nodes.len(),
            "pipeline adjacency contains a cycle, which the Importer should have rejected"
        );

        self.run_order = order;
    }

    // ---- evaluation (spec.md §4.3) ----

    /// Runs one full topological pass. No-ops if the pipeline is broken.
    pub fn evaluate(&mut self) {
        if self.broken {
            return;
        }
        if self.run_order.is_empty() && !self.nodes.is_empty() {
            self.recompute_run_order();
        }

        for node in self.nodes.values_mut() {
            node.reset_frame();
            node.skip = false;
        }

        let pass_start = Instant::now();
        let order = self.run_order.clone();
        for id in &order {
            self.current = Some(id.clone());

            let skip_now = self.nodes.get(id).is_some_and(|n| n.skip);
            if skip_now {
                if let Some(n) = self.nodes.get_mut(id) {
                    n.skip = false;
                }
                continue;
            }

            let node_start = Instant::now();
            let cancel_requests = self.run_one(id);
            if self.benchmark.is_some() {
                let elapsed = node_start.elapsed();
                self.benchmark.as_mut().unwrap().record_node(id, elapsed);
            }
            self.apply_cancel_requests(id, cancel_requests);
        }

        self.current = None;
        self.fps.tick();
        if let Some(bench) = self.benchmark.as_mut() {
            bench.record_total(pass_start.elapsed());
        }
    }

    /// Runs a single node's turn, returning any cancellation requests it
    /// raised (directly, or implicitly because it errored).
    fn run_one(&mut self, id: &NodeId) -> Vec<CancelRequest> {
        let mut cancel_requests = Vec::new();

        let func_type = match self.nodes.get(id) {
            Some(n) => n.func_type.clone(),
            None => return cancel_requests,
        };
        let descriptor = match self.catalog.lookup(&func_type) {
            Some(d) => d,
            None => {
                warn!(node = %id, func_type = %func_type, "function type missing at runtime");
                cancel_requests.push(CancelRequest::Current);
                return cancel_requests;
            }
        };

        if let Err(err) = self
            .nodes
            .get_mut(id)
            .expect("checked above")
            .ensure_init(&descriptor)
        {
            warn!(node = %id, error = %err, "failed to initialize node");
            cancel_requests.push(CancelRequest::Current);
            return cancel_requests;
        }

        let mut inputs = Record::new();
        let mut resolved_count = 0usize;
        let links: Vec<(FieldName, Link)> = self
            .nodes
            .get(id)
            .expect("checked above")
            .input_links
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, link) in &links {
            let value = match link {
                Link::Static(v) => Some(v.clone()),
                Link::Node { target, output } => self
                    .nodes
                    .get(target)
                    .and_then(|t| t.result.as_ref())
                    .and_then(|r| r.get(output).cloned()),
            };
            if let Some(v) = value {
                inputs.insert(name.clone(), v);
                resolved_count += 1;
            }
        }

        if resolved_count < descriptor.inputs_schema.fields.len() {
            let node = self.nodes.get_mut(id).expect("checked above");
            node.result = None;
            node.has_run = true;
            return cancel_requests;
        }

        let outcome = {
            let mut scope = CancelScope::new(id, &mut cancel_requests);
            self.nodes
                .get_mut(id)
                .expect("checked above")
                .run(&inputs, &mut scope)
        };

        let node = self.nodes.get_mut(id).expect("checked above");
        match outcome {
            Ok(Outcome::Produced(record)) => node.result = Some(record),
            Ok(Outcome::Empty) => {
                node.result = default_construct(&descriptor.outputs_schema);
                if node.result.is_none() && !descriptor.outputs_schema.fields.is_empty() {
                    warn!(node = %id, "empty outcome with no defaultable outputs");
                }
            }
            Err(err) => {
                warn!(node = %id, error = %err, "node run failed");
                node.result = None;
                cancel_requests.push(CancelRequest::Current);
            }
        }
        node.has_run = true;
        cancel_requests
    }

    fn apply_cancel_requests(&mut self, current: &NodeId, requests: Vec<CancelRequest>) {
        for req in requests {
            let skip_set = match req {
                CancelRequest::Current => self.transitive_consumers(current),
                CancelRequest::Output(name) => {
                    let mut set = BTreeSet::new();
                    let direct: Vec<NodeId> = self
                        .nodes
                        .iter()
                        .filter(|(_, n)| {
                            n.input_links.values().any(|l| {
                                matches!(l, Link::Node { target, output } if target == current && output == &name)
                            })
                        })
                        .map(|(id, _)| id.clone())
                        .collect();
                    for d in direct {
                        set.insert(d.clone());
                        set.extend(self.transitive_consumers(&d));
                    }
                    set
                }
            };
            for id in skip_set {
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.skip = true;
                }
            }
        }
    }

    /// All nodes strictly downstream of `start` (not including `start`
    /// itself), following the consumer graph.
    fn transitive_consumers(&self, start: &NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start.clone()];
        while let Some(n) = stack.pop() {
            if let Some(cs) = self.consumers.get(&n) {
                for c in cs {
                    if seen.insert(c.clone()) {
                        stack.push(c.clone());
                    }
                }
            }
        }
        seen
    }
}

/// Default-constructs an Outputs record when every field declares a
/// default; otherwise returns `None` (`spec.md` §4.3 step 4: "attempt to
/// default-construct Outputs; on failure log and emit empty").
#[must_use]
pub fn default_construct(schema: &Schema) -> Option<Record> {
    let mut record = Record::new();
    for field in &schema.fields {
        let FieldSchema { name, default, .. } = field;
        record.insert(name.clone(), default.clone()?);
    }
    Some(record)
}
