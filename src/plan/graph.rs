// src/plan/graph.rs

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Once;

use crate::errors::ExecError;
use crate::plan::lifetime::LifetimeAnalyzer;
use crate::plan::node::PlanNode;
use crate::plan::symbols::{SymbolTable, Variable};
use crate::types::NodeId;

/// A compiled, validated query plan.
///
/// The plan is immutable once built and may be shared (e.g. cached) across
/// many query runs. The only write that ever happens afterwards is the
/// one-shot lifetime analysis, guarded by a [`Once`].
///
/// Besides the nodes themselves we keep two derived indexes:
/// - `dependents`: reverse edges of the structural dependency relation
/// - `scopes`: for every reachable node, the `Select`/`Loop` whose sub-plan
///   contains it (`None` for the top level)
#[derive(Debug)]
pub struct ExecutionPlan {
    nodes: BTreeMap<NodeId, PlanNode>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
    scopes: HashMap<NodeId, Option<NodeId>>,
    symbols: SymbolTable,
    root: NodeId,
    lifetime: Once,
}

impl ExecutionPlan {
    /// Assemble a plan from already-validated parts.
    ///
    /// Assumes that:
    /// - every dependency and sub-plan reference exists
    /// - there are no cycles
    pub(crate) fn new_unchecked(
        nodes: BTreeMap<NodeId, PlanNode>,
        symbols: SymbolTable,
        root: NodeId,
    ) -> Self {
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in nodes.values() {
            for dep in node.dependencies() {
                dependents.entry(*dep).or_default().push(node.id());
            }
        }

        let scopes = compute_scopes(&nodes, root);

        Self {
            nodes,
            dependents,
            scopes,
            symbols,
            root,
            lifetime: Once::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &PlanNode {
        // `root` is checked to exist when the plan is built.
        &self.nodes[&self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(&id)
    }

    /// Like [`node`](Self::node), but reports a missing id as a scheduling error.
    pub(crate) fn lookup(&self, id: NodeId) -> Result<&PlanNode, ExecError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| ExecError::Internal(format!("plan node {id} does not exist")))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.symbols.get_var(name)
    }

    /// Nodes that list `id` among their structural dependencies.
    pub fn dependents_of(&self, id: NodeId) -> &[NodeId] {
        self.dependents
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The `Select`/`Loop` whose sub-plan directly contains `id`, if any.
    pub fn enclosing_control(&self, id: NodeId) -> Option<NodeId> {
        self.scopes.get(&id).copied().flatten()
    }

    /// Run the lifetime analysis once for this plan.
    ///
    /// Later calls (e.g. from another run of a cached plan) are no-ops; a
    /// concurrent caller blocks until the first analysis has finished.
    pub fn analyze_lifetime(&self) {
        self.lifetime.call_once(|| LifetimeAnalyzer::new(self).analyze());
    }

    pub fn lifetime_analyzed(&self) -> bool {
        self.lifetime.is_completed()
    }
}

/// Assign every node reachable from `root` to the scope it runs in.
///
/// Scopes are explored breadth-first, outer before inner, so a node reachable
/// both from the top level and from a sub-plan belongs to the outer scope.
pub(crate) fn compute_scopes(
    nodes: &BTreeMap<NodeId, PlanNode>,
    root: NodeId,
) -> HashMap<NodeId, Option<NodeId>> {
    let mut scopes: HashMap<NodeId, Option<NodeId>> = HashMap::new();
    let mut pending: VecDeque<(NodeId, Option<NodeId>)> = VecDeque::new();
    pending.push_back((root, None));

    while let Some((entry, scope)) = pending.pop_front() {
        let mut stack = vec![entry];
        let mut seen: HashSet<NodeId> = HashSet::new();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) || scopes.contains_key(&id) {
                continue;
            }
            let Some(node) = nodes.get(&id) else {
                continue;
            };
            scopes.insert(id, scope);

            for sub in node.sub_plans() {
                pending.push_back((sub, Some(id)));
            }
            stack.extend(node.dependencies().iter().copied());
        }
    }

    scopes
}
