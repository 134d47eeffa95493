// src/scheduler/mod.rs

//! Query scheduling.
//!
//! - [`completion`] is the broadcast-once signal the notify scheduler wires
//!   executors together with.
//! - [`notify`] is the general scheduler (`Select`, `Loop`, `Argument`).
//! - [`push`] is the cheaper scheduler for control-flow-free plans.
//!
//! [`create`] picks one of them for a query, once, from the shape of the
//! plan and the configured [`SchedulingStrategy`].

pub mod completion;
pub mod notify;
pub mod push;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::context::QueryContext;
use crate::errors::Status;
use crate::plan::{ExecutionPlan, PlanNodeKind};
use crate::types::{NodeId, SchedulingStrategy};

pub use notify::NotifyScheduler;
pub use push::PushScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Notify,
    Push,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Notify => f.write_str("notify"),
            SchedulerKind::Push => f.write_str("push"),
        }
    }
}

/// Drives one query to its terminal status.
pub trait Scheduler: Send + Sync {
    fn kind(&self) -> SchedulerKind;

    /// Run the whole plan. Resolves with success or the first failure.
    fn schedule(&self) -> BoxFuture<'static, Status>;
}

/// Pick the scheduler for `qctx`'s plan.
///
/// `Auto` chooses push exactly when [`is_push_eligible`] holds. A forced
/// `Push` on an ineligible plan falls back to notify.
pub fn create(qctx: Arc<QueryContext>) -> Box<dyn Scheduler> {
    let eligible = is_push_eligible(qctx.plan());
    let kind = match qctx.config().strategy {
        SchedulingStrategy::Notify => SchedulerKind::Notify,
        SchedulingStrategy::Auto if eligible => SchedulerKind::Push,
        SchedulingStrategy::Auto => SchedulerKind::Notify,
        SchedulingStrategy::Push if eligible => SchedulerKind::Push,
        SchedulingStrategy::Push => {
            warn!(
                root = qctx.plan().root(),
                "push scheduling requested for a plan with control flow, using notify"
            );
            SchedulerKind::Notify
        }
    };

    info!(root = qctx.plan().root(), scheduler = %kind, "scheduler selected");
    match kind {
        SchedulerKind::Notify => Box::new(NotifyScheduler::new(qctx)),
        SchedulerKind::Push => Box::new(PushScheduler::new(qctx)),
    }
}

/// Create the scheduler for `qctx` and run the query.
pub async fn execute(qctx: Arc<QueryContext>) -> Status {
    create(qctx).schedule().await
}

/// Whether every node reachable from the root can be push-scheduled.
///
/// `Start` and `Argument` always qualify. Operators qualify when all their
/// dependencies do; a join needs both sides. Any `Select`/`Loop` rules the
/// whole plan out.
pub fn is_push_eligible(plan: &ExecutionPlan) -> bool {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = vec![plan.root()];

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = plan.node(id) else {
            return false;
        };
        match node.kind() {
            PlanNodeKind::Select { .. } | PlanNodeKind::Loop { .. } => {
                debug!(node = %node, "control flow rules out push scheduling");
                return false;
            }
            PlanNodeKind::Start | PlanNodeKind::Argument => {}
            PlanNodeKind::Operator { .. } | PlanNodeKind::Join { .. } => {
                stack.extend(node.dependencies().iter().copied());
            }
        }
    }
    true
}

/// One-time per-plan preparation before the first dispatch.
pub(crate) fn prepare_plan(qctx: &QueryContext) {
    if qctx.config().enable_lifetime_optimize {
        qctx.plan().analyze_lifetime();
    }
}
