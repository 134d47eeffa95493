// src/executor/graph.rs

//! Runtime executor graph for one (sub-)plan invocation.
//!
//! Built from a plan node by walking structural dependencies bottom-up.
//! The walk stops at `Select`/`Loop` nodes: their sub-plans get their own
//! graph, built only when the branch is taken (and once per `Loop`
//! iteration).
//!
//! Executors live in an arena and refer to each other by index.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::context::QueryContext;
use crate::errors::ExecError;
use crate::executor::Operator;
use crate::plan::ExecutionPlan;
use crate::types::NodeId;

pub struct Executor {
    id: u64,
    node: NodeId,
    operator: Arc<dyn Operator>,
    depends: Vec<usize>,
    successors: Vec<usize>,
    /// Resolved writers of an `Argument`'s input variable (indexes into the
    /// same graph). Always empty for other nodes.
    argument_writers: Vec<usize>,
    argument: bool,
    finish_dep: AtomicUsize,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("depends", &self.depends)
            .field("successors", &self.successors)
            .field("argument_writers", &self.argument_writers)
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn operator(&self) -> &Arc<dyn Operator> {
        &self.operator
    }

    pub fn depends(&self) -> &[usize] {
        &self.depends
    }

    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    pub fn argument_writers(&self) -> &[usize] {
        &self.argument_writers
    }

    pub fn is_argument(&self) -> bool {
        self.argument
    }

    /// Executors this one has to wait for before it may run.
    pub fn upstream(&self) -> &[usize] {
        if self.argument {
            &self.argument_writers
        } else {
            &self.depends
        }
    }

    /// Number of completions needed before this executor is ready.
    pub fn pending_total(&self) -> usize {
        self.upstream().len()
    }

    /// Count one more finished predecessor; returns the new count.
    pub(crate) fn finish_one(&self) -> usize {
        self.finish_dep.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[derive(Debug)]
pub struct ExecutorGraph {
    executors: Vec<Executor>,
    by_node: HashMap<NodeId, usize>,
    root: usize,
}

impl ExecutorGraph {
    /// Build the executor graph rooted at plan node `root`.
    pub fn build(qctx: &QueryContext, root: NodeId) -> Result<Arc<Self>, ExecError> {
        let plan = qctx.plan();

        // Discover the nodes of this scope, root first.
        let mut order: Vec<NodeId> = Vec::new();
        let mut by_node: HashMap<NodeId, usize> = HashMap::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            if by_node.contains_key(&id) {
                continue;
            }
            let node = plan.lookup(id)?;
            by_node.insert(id, order.len());
            order.push(id);
            queue.extend(node.dependencies().iter().copied());
        }

        let mut executors: Vec<Executor> = Vec::with_capacity(order.len());
        for id in order.iter() {
            let node = plan.lookup(*id)?;
            let operator = qctx.operators().create(node)?;
            let depends = node
                .dependencies()
                .iter()
                .filter_map(|dep| by_node.get(dep).copied())
                .collect();
            executors.push(Executor {
                id: qctx.next_executor_id(),
                node: *id,
                operator,
                depends,
                successors: Vec::new(),
                argument_writers: Vec::new(),
                argument: node.is_argument(),
                finish_dep: AtomicUsize::new(0),
            });
        }

        for idx in 0..executors.len() {
            let depends = executors[idx].depends.clone();
            for dep in depends {
                executors[dep].successors.push(idx);
            }
        }

        for idx in 0..executors.len() {
            if executors[idx].argument {
                let writers = resolve_argument_writers(plan, &executors, &by_node, idx)?;
                trace!(
                    node = executors[idx].node,
                    writers = ?writers,
                    "resolved argument writers"
                );
                executors[idx].argument_writers = writers;
            }
        }

        let root_idx = by_node.get(&root).copied().ok_or_else(|| {
            ExecError::Internal(format!("root {root} missing from its executor graph"))
        })?;

        debug!(root, executors = executors.len(), "built executor graph");
        Ok(Arc::new(Self {
            executors,
            by_node,
            root: root_idx,
        }))
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    pub fn executor(&self, idx: usize) -> &Executor {
        &self.executors[idx]
    }

    pub fn executors(&self) -> impl Iterator<Item = (usize, &Executor)> {
        self.executors.iter().enumerate()
    }

    /// Executor index of plan node `node`, if it is part of this graph.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.by_node.get(&node).copied()
    }
}

/// Map every writer of the argument's input variable onto an executor of
/// this graph.
///
/// - a writer in this graph stands for itself
/// - a writer inside a sub-plan is represented by the innermost enclosing
///   `Select`/`Loop` present in this graph, which completes only after its
///   chosen branch did
/// - a writer without representative lives in an outer scope, where plan
///   validation ordered it before the control node leading here, and
///   imposes no wait
///
/// Representatives downstream of the argument (loop-carried writers) are
/// dropped.
fn resolve_argument_writers(
    plan: &ExecutionPlan,
    executors: &[Executor],
    by_node: &HashMap<NodeId, usize>,
    arg: usize,
) -> Result<Vec<usize>, ExecError> {
    let node = plan.lookup(executors[arg].node)?;
    let [var_name] = node.input_vars() else {
        return Err(ExecError::Internal(format!(
            "argument {node} must read exactly one variable"
        )));
    };
    let var = plan.variable(var_name).ok_or_else(|| {
        ExecError::Internal(format!("argument {node} reads unknown variable '{var_name}'"))
    })?;

    let downstream = reachable_from(executors, arg);

    let mut writers: BTreeSet<usize> = BTreeSet::new();
    for writer in var.written_by.iter() {
        let mut current = Some(*writer);
        while let Some(id) = current {
            if let Some(idx) = by_node.get(&id) {
                if !downstream.contains(idx) {
                    writers.insert(*idx);
                }
                break;
            }
            current = plan.enclosing_control(id);
        }
    }
    Ok(writers.into_iter().collect())
}

/// `start` plus everything reachable from it through successor edges.
fn reachable_from(executors: &[Executor], start: usize) -> HashSet<usize> {
    let mut seen: HashSet<usize> = HashSet::new();
    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
        if seen.insert(idx) {
            stack.extend(executors[idx].successors.iter().copied());
        }
    }
    seen
}
