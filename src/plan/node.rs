// src/plan/node.rs

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::NodeId;

/// What a plan node does, as far as the scheduler is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanNodeKind {
    /// Root leaf of a (sub-)plan; does nothing.
    Start,
    /// Reconvergence point: bound to an input variable instead of a
    /// structural dependency.
    Argument,
    /// If/else over two sub-plans, chosen by a boolean written to
    /// `condition_var` when the node itself runs.
    Select {
        condition_var: String,
        then_body: NodeId,
        else_body: NodeId,
    },
    /// Runs `body` again and again while the node's own evaluation writes
    /// `true` to `condition_var`.
    Loop { condition_var: String, body: NodeId },
    /// Ordinary operator with zero or more inputs (scan, filter, project...).
    Operator { name: String },
    /// Binary operator (joins, set operations).
    Join { name: String },
}

/// Immutable description of one operator in a compiled plan.
///
/// `loop_layers` is the only mutable piece; it is written once by the
/// lifetime analysis.
#[derive(Debug)]
pub struct PlanNode {
    id: NodeId,
    kind: PlanNodeKind,
    deps: Vec<NodeId>,
    input_vars: Vec<String>,
    output_var: String,
    loop_layers: AtomicUsize,
}

impl PlanNode {
    pub(crate) fn new(id: NodeId, kind: PlanNodeKind, output_var: String) -> Self {
        Self {
            id,
            kind,
            deps: Vec::new(),
            input_vars: Vec::new(),
            output_var,
            loop_layers: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &PlanNodeKind {
        &self.kind
    }

    /// Structural dependencies, in declaration order.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.deps
    }

    pub fn input_vars(&self) -> &[String] {
        &self.input_vars
    }

    pub fn output_var(&self) -> &str {
        &self.output_var
    }

    /// Loop nesting depth assigned by the lifetime analysis.
    pub fn loop_layers(&self) -> usize {
        self.loop_layers.load(Ordering::Relaxed)
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(
            self.kind,
            PlanNodeKind::Select { .. } | PlanNodeKind::Loop { .. }
        )
    }

    pub fn is_argument(&self) -> bool {
        matches!(self.kind, PlanNodeKind::Argument)
    }

    /// Variable holding the evaluated condition of a `Select`/`Loop`.
    pub fn condition_var(&self) -> Option<&str> {
        match &self.kind {
            PlanNodeKind::Select { condition_var, .. }
            | PlanNodeKind::Loop { condition_var, .. } => Some(condition_var),
            _ => None,
        }
    }

    /// Roots of the sub-plans owned by this node (empty unless control flow).
    pub fn sub_plans(&self) -> Vec<NodeId> {
        match &self.kind {
            PlanNodeKind::Select {
                then_body,
                else_body,
                ..
            } => vec![*then_body, *else_body],
            PlanNodeKind::Loop { body, .. } => vec![*body],
            _ => Vec::new(),
        }
    }

    /// Short operator name, e.g. `Start`, `Loop` or `Project`.
    pub fn name(&self) -> &str {
        match &self.kind {
            PlanNodeKind::Start => "Start",
            PlanNodeKind::Argument => "Argument",
            PlanNodeKind::Select { .. } => "Select",
            PlanNodeKind::Loop { .. } => "Loop",
            PlanNodeKind::Operator { name } | PlanNodeKind::Join { name } => name,
        }
    }

    pub(crate) fn add_dep(&mut self, dep: NodeId) {
        self.deps.push(dep);
    }

    pub(crate) fn add_input_var(&mut self, var: &str) {
        self.input_vars.push(var.to_string());
    }

    pub(crate) fn replace_input_var(&mut self, old: &str, new: &str) {
        for var in self.input_vars.iter_mut().filter(|v| *v == old) {
            *var = new.to_string();
        }
    }

    pub(crate) fn set_output_var(&mut self, var: &str) {
        self.output_var = var.to_string();
    }

    pub(crate) fn set_condition_var(&mut self, var: &str) {
        match &mut self.kind {
            PlanNodeKind::Select { condition_var, .. }
            | PlanNodeKind::Loop { condition_var, .. } => *condition_var = var.to_string(),
            _ => {}
        }
    }

    pub(crate) fn set_loop_layers(&self, layers: usize) {
        self.loop_layers.store(layers, Ordering::Relaxed);
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name(), self.id)
    }
}
