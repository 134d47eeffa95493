// src/plan/lifetime.rs

//! Variable lifetime analysis.
//!
//! Annotates a plan before its first dispatch so that operators can decide
//! whether a value may be moved out of the execution context instead of
//! being copied:
//! - every variable's `user_count` becomes the number of distinct consuming
//!   nodes, or [`UNBOUNDED_USERS`] when consumers cannot be bounded
//! - every node (and its output variable) gets its loop nesting depth
//!
//! [`UNBOUNDED_USERS`]: crate::plan::symbols::UNBOUNDED_USERS

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::plan::graph::ExecutionPlan;
use crate::plan::node::PlanNodeKind;
use crate::types::NodeId;

/// Explicit-stack depth-first walk over a plan, including sub-plans.
pub struct LifetimeAnalyzer<'a> {
    plan: &'a ExecutionPlan,
}

impl<'a> LifetimeAnalyzer<'a> {
    pub fn new(plan: &'a ExecutionPlan) -> Self {
        Self { plan }
    }

    /// Analyze the whole plan starting from its root.
    ///
    /// Prefer [`ExecutionPlan::analyze_lifetime`], which makes repeated calls
    /// on a cached plan free.
    pub fn analyze(&self) {
        let root = self.plan.root_node();
        // The query result is consumed by the caller, not by another node.
        if let Some(var) = self.plan.variable(root.output_var()) {
            var.mark_unbounded();
        }
        self.analyze_from(root.id(), 0);
    }

    fn analyze_from(&self, root: NodeId, loop_layers: usize) {
        let mut stack: Vec<(NodeId, usize)> = vec![(root, loop_layers)];
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Some((id, layers)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.plan.node(id) else {
                continue;
            };

            for input in node.input_vars() {
                if let Some(var) = self.plan.variable(input) {
                    var.add_user();
                }
            }

            node.set_loop_layers(layers);
            if let Some(var) = self.plan.variable(node.output_var()) {
                var.set_loop_layers(layers);
            }
            trace!(node = %node, loop_layers = layers, "lifetime: visited node");

            for dep in node.dependencies() {
                stack.push((*dep, layers));
            }

            match node.kind() {
                PlanNodeKind::Select {
                    then_body,
                    else_body,
                    ..
                } => {
                    // Read after whichever branch ran.
                    self.mark_output_unbounded(id);
                    stack.push((*then_body, layers));
                    stack.push((*else_body, layers));
                }
                PlanNodeKind::Loop { body, .. } => {
                    self.mark_output_unbounded(id);
                    stack.push((*body, layers + 1));
                }
                _ => {}
            }
        }

        debug!(
            root,
            visited = visited.len(),
            "lifetime analysis finished"
        );
    }

    fn mark_output_unbounded(&self, id: NodeId) {
        if let Some(node) = self.plan.node(id) {
            if let Some(var) = self.plan.variable(node.output_var()) {
                var.mark_unbounded();
            }
        }
    }
}
