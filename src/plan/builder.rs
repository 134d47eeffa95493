// src/plan/builder.rs

//! Planner-side construction of an [`ExecutionPlan`].
//!
//! Every node gets a generated output variable `__<Kind>_<id>` and is
//! registered as its writer. Depending on a node reads that node's output
//! variable. `set_output_var` rewires a node onto a shared name, which is
//! how branches of a `Select` (or iterations of a `Loop`) converge on one
//! variable for a downstream `Argument`.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{Result, SchedError};
use crate::plan::graph::{compute_scopes, ExecutionPlan};
use crate::plan::node::{PlanNode, PlanNodeKind};
use crate::plan::symbols::SymbolTable;
use crate::types::NodeId;

#[derive(Debug, Default)]
pub struct PlanBuilder {
    next_id: NodeId,
    nodes: BTreeMap<NodeId, PlanNode>,
    symbols: SymbolTable,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root leaf of a plan or sub-plan.
    pub fn start(&mut self) -> NodeId {
        self.add_node(PlanNodeKind::Start, "Start")
    }

    /// Reconvergence node reading `var`, whoever ends up writing it.
    pub fn argument(&mut self, var: &str) -> NodeId {
        let id = self.add_node(PlanNodeKind::Argument, "Argument");
        self.read_variable(id, var);
        id
    }

    /// Ordinary operator depending on (and reading the output of) `deps`.
    pub fn operator(&mut self, name: &str, deps: &[NodeId]) -> NodeId {
        let id = self.add_node(
            PlanNodeKind::Operator {
                name: name.to_string(),
            },
            name,
        );
        for dep in deps {
            self.depend_on(id, *dep);
        }
        id
    }

    /// Binary operator over `left` and `right`.
    pub fn join(&mut self, name: &str, left: NodeId, right: NodeId) -> NodeId {
        let id = self.add_node(
            PlanNodeKind::Join {
                name: name.to_string(),
            },
            name,
        );
        self.depend_on(id, left);
        self.depend_on(id, right);
        id
    }

    /// If/else node. Its own evaluation writes the condition to its output
    /// variable.
    pub fn select(&mut self, deps: &[NodeId], then_body: NodeId, else_body: NodeId) -> NodeId {
        let id = self.add_node(
            PlanNodeKind::Select {
                condition_var: String::new(),
                then_body,
                else_body,
            },
            "Select",
        );
        self.attach_control(id, deps);
        id
    }

    /// Loop node. Its own evaluation writes the condition to its output
    /// variable before every iteration.
    pub fn loop_node(&mut self, deps: &[NodeId], body: NodeId) -> NodeId {
        let id = self.add_node(
            PlanNodeKind::Loop {
                condition_var: String::new(),
                body,
            },
            "Loop",
        );
        self.attach_control(id, deps);
        id
    }

    /// Make `node` write `var` instead of its current output variable.
    ///
    /// Readers that reach `node` through a structural dependency follow the
    /// rename. For `Select`/`Loop` the condition variable is the output
    /// variable, so it moves too.
    pub fn set_output_var(&mut self, node: NodeId, var: &str) -> &mut Self {
        let Some(old) = self.nodes.get(&node).map(|n| n.output_var().to_string()) else {
            return self;
        };
        if old == var {
            return self;
        }

        self.symbols.delete_written_by(&old, node);
        self.symbols.written_by(var, node);

        if let Some(n) = self.nodes.get_mut(&node) {
            if n.condition_var() == Some(old.as_str()) {
                n.set_condition_var(var);
            }
            n.set_output_var(var);
        }

        let readers: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.dependencies().contains(&node))
            .map(|n| n.id())
            .collect();
        for reader in readers {
            if let Some(n) = self.nodes.get_mut(&reader) {
                if n.input_vars().iter().any(|v| *v == old) {
                    n.replace_input_var(&old, var);
                    self.symbols.delete_read_by(&old, reader);
                    self.symbols.read_by(var, reader);
                }
            }
        }

        debug!(node, old = %old, new = %var, "rewired output variable");
        self
    }

    /// Record that `node` reads `var` (without a structural dependency).
    pub fn read_variable(&mut self, node: NodeId, var: &str) -> &mut Self {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.add_input_var(var);
            self.symbols.read_by(var, node);
        }
        self
    }

    pub fn output_var(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.output_var())
    }

    /// Validate and freeze the plan.
    ///
    /// Checks for:
    /// - unknown root, dependency or sub-plan references
    /// - self dependencies
    /// - `Argument` nodes without exactly one input variable, or reading a
    ///   variable nobody writes
    /// - cycles over dependency and sub-plan edges
    /// - sub-plans depending on nodes outside themselves
    pub fn build(self, root: NodeId) -> Result<ExecutionPlan> {
        if !self.nodes.contains_key(&root) {
            return Err(SchedError::NodeNotFound(format!("plan root {root}")));
        }

        self.validate_references()?;
        self.validate_arguments()?;
        self.validate_acyclic()?;
        self.validate_scopes(root)?;

        debug!(root, nodes = self.nodes.len(), "plan built");
        Ok(ExecutionPlan::new_unchecked(self.nodes, self.symbols, root))
    }

    fn add_node(&mut self, kind: PlanNodeKind, label: &str) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;

        let var = format!("__{label}_{id}");
        self.symbols.written_by(&var, id);

        let mut node = PlanNode::new(id, kind, var.clone());
        node.set_condition_var(&var);
        self.nodes.insert(id, node);
        id
    }

    fn depend_on(&mut self, node: NodeId, dep: NodeId) {
        let dep_var = self.nodes.get(&dep).map(|d| d.output_var().to_string());
        if let Some(n) = self.nodes.get_mut(&node) {
            n.add_dep(dep);
        }
        match dep_var {
            Some(var) => {
                self.read_variable(node, &var);
            }
            None => {
                // Reported by `build`.
                debug!(node, dep, "dependency on a node that does not exist yet");
            }
        }
    }

    fn attach_control(&mut self, id: NodeId, deps: &[NodeId]) {
        // Control nodes wait on their deps but do not consume their output.
        if let Some(n) = self.nodes.get_mut(&id) {
            for dep in deps {
                n.add_dep(*dep);
            }
        }
    }

    fn validate_references(&self) -> Result<()> {
        for node in self.nodes.values() {
            for dep in node.dependencies() {
                if *dep == node.id() {
                    return Err(SchedError::ConfigError(format!(
                        "node {node} cannot depend on itself"
                    )));
                }
                if !self.nodes.contains_key(dep) {
                    return Err(SchedError::NodeNotFound(format!(
                        "node {node} depends on unknown node {dep}"
                    )));
                }
            }
            for sub in node.sub_plans() {
                if !self.nodes.contains_key(&sub) {
                    return Err(SchedError::NodeNotFound(format!(
                        "node {node} references unknown sub-plan root {sub}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_arguments(&self) -> Result<()> {
        for node in self.nodes.values().filter(|n| n.is_argument()) {
            let [var] = node.input_vars() else {
                return Err(SchedError::ConfigError(format!(
                    "argument node {node} must read exactly one variable (got {})",
                    node.input_vars().len()
                )));
            };
            let written = self
                .symbols
                .get_var(var)
                .map(|v| !v.written_by.is_empty())
                .unwrap_or(false);
            if !written {
                return Err(SchedError::ConfigError(format!(
                    "argument node {node} reads variable '{var}' which no node writes"
                )));
            }
        }
        Ok(())
    }

    fn validate_acyclic(&self) -> Result<()> {
        // Edge direction: dep -> node, and sub-plan root -> owning control
        // node (the control node finishes after its sub-plan).
        let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for node in self.nodes.values() {
            graph.add_node(node.id());
            for dep in node.dependencies() {
                graph.add_edge(*dep, node.id(), ());
            }
            for sub in node.sub_plans() {
                graph.add_edge(sub, node.id(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => {
                let id = cycle.node_id();
                let label = self
                    .nodes
                    .get(&id)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| id.to_string());
                Err(SchedError::PlanCycle(format!(
                    "cycle detected in plan involving node {label}"
                )))
            }
        }
    }

    fn validate_scopes(&self, root: NodeId) -> Result<()> {
        let scopes = compute_scopes(&self.nodes, root);
        for (id, scope) in scopes.iter() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for dep in node.dependencies() {
                let dep_scope = scopes.get(dep).copied().flatten();
                if dep_scope != *scope {
                    return Err(SchedError::ConfigError(format!(
                        "node {node} depends on node {dep} from a different sub-plan"
                    )));
                }
            }
        }
        self.validate_outer_reads(&scopes)
    }

    /// A node inside a sub-plan only waits on writers of its own scope.
    /// Any other writer must be ordered against the control node leading
    /// to the reader: finished before it starts, or running after it (a
    /// value carried from an earlier iteration).
    fn validate_outer_reads(&self, scopes: &HashMap<NodeId, Option<NodeId>>) -> Result<()> {
        for (id, reader) in self.nodes.iter() {
            if !scopes.contains_key(id) {
                continue;
            }
            let reader_path = scope_path(scopes, *id);
            for input in reader.input_vars() {
                let Some(var) = self.symbols.get_var(input) else {
                    continue;
                };
                for writer in var.written_by.iter().filter(|w| scopes.contains_key(*w)) {
                    let writer_path = scope_path(scopes, *writer);
                    let Some((reader_rep, writer_rep)) =
                        meeting_point(scopes, &reader_path, &writer_path)
                    else {
                        continue;
                    };
                    if reader_rep == *id
                        || reader_rep == writer_rep
                        || self.is_upstream(writer_rep, reader_rep)
                        || self.is_upstream(reader_rep, writer_rep)
                    {
                        continue;
                    }
                    let label = |n: NodeId| {
                        self.nodes
                            .get(&n)
                            .map(|node| node.to_string())
                            .unwrap_or_else(|| n.to_string())
                    };
                    return Err(SchedError::ConfigError(format!(
                        "node {reader} reads '{input}' written by node {}, which is not ordered against {}",
                        label(*writer),
                        label(reader_rep)
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether `node` is a transitive structural dependency of `of`.
    fn is_upstream(&self, node: NodeId, of: NodeId) -> bool {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = vec![of];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(current) = self.nodes.get(&id) else {
                continue;
            };
            for dep in current.dependencies() {
                if *dep == node {
                    return true;
                }
                stack.push(*dep);
            }
        }
        false
    }
}

/// `id` followed by its enclosing control nodes, innermost first.
fn scope_path(scopes: &HashMap<NodeId, Option<NodeId>>, id: NodeId) -> Vec<NodeId> {
    let mut path = vec![id];
    let mut current = id;
    while let Some(Some(control)) = scopes.get(&current) {
        path.push(*control);
        current = *control;
    }
    path
}

/// First pair of entries, one from each path, that share a scope.
fn meeting_point(
    scopes: &HashMap<NodeId, Option<NodeId>>,
    reader_path: &[NodeId],
    writer_path: &[NodeId],
) -> Option<(NodeId, NodeId)> {
    let scope_of = |n: &NodeId| scopes.get(n).copied().flatten();
    reader_path.iter().find_map(|r| {
        let scope = scope_of(r);
        writer_path
            .iter()
            .find(|w| scope_of(*w) == scope)
            .map(|w| (*r, *w))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_reader_of_concurrent_outer_writer_is_rejected() {
        // Join(Select(then: T(Argument(X))), X); X races the Select.
        let mut b = PlanBuilder::new();
        let start = b.start();
        let x = b.operator("X", &[start]);
        b.set_output_var(x, "x");
        let arg = b.argument("x");
        let then_op = b.operator("T", &[arg]);
        let else_op = b.operator("E", &[]);
        let select = b.select(&[start], then_op, else_op);
        let root = b.join("Final", select, x);

        match b.build(root) {
            Err(SchedError::ConfigError(msg)) => {
                assert!(msg.contains("reads 'x'"), "unexpected message: {msg}");
                assert!(msg.contains(&format!("X#{x}")));
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn nested_reader_of_upstream_outer_writer_is_accepted() {
        let mut b = PlanBuilder::new();
        let start = b.start();
        let x = b.operator("X", &[start]);
        b.set_output_var(x, "x");
        let arg = b.argument("x");
        let then_op = b.operator("T", &[arg]);
        let else_op = b.operator("E", &[]);
        let select = b.select(&[x], then_op, else_op);
        let root = b.operator("Project", &[select]);

        assert!(b.build(root).is_ok());
    }

    #[test]
    fn dependency_across_sub_plans_is_rejected() {
        let mut b = PlanBuilder::new();
        let start = b.start();
        let body = b.operator("Body", &[start]);
        let loop_node = b.loop_node(&[start], body);

        assert!(matches!(
            b.build(loop_node),
            Err(SchedError::ConfigError(_))
        ));
    }
}
