// src/scheduler/notify.rs

//! General scheduler: one completion per executor, waiters per dependency.
//!
//! Handles `Select`, `Loop` and `Argument`. A control node's completion
//! resolves only once the sub-plan it chose has fully run. Sub-plans are
//! scheduled by the same routine, one nesting level deeper.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, trace, warn};

use crate::context::QueryContext;
use crate::errors::{ExecError, Status};
use crate::executor::{dispatch, ExecutorGraph};
use crate::plan::{PlanNode, PlanNodeKind};
use crate::scheduler::completion::{wait_all, Completion, Waiter};
use crate::scheduler::{prepare_plan, Scheduler, SchedulerKind};
use crate::types::NodeId;

#[derive(Debug)]
pub struct NotifyScheduler {
    qctx: Arc<QueryContext>,
}

impl NotifyScheduler {
    pub fn new(qctx: Arc<QueryContext>) -> Self {
        Self { qctx }
    }
}

impl Scheduler for NotifyScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Notify
    }

    fn schedule(&self) -> BoxFuture<'static, Status> {
        let qctx = Arc::clone(&self.qctx);
        async move {
            prepare_plan(&qctx);
            let root = qctx.plan().root();
            let status = schedule_plan(qctx, root, 0).await;
            match &status {
                Ok(()) => info!(root, "notify schedule finished"),
                Err(err) => warn!(root, error = %err, "notify schedule failed"),
            }
            status
        }
        .boxed()
    }
}

/// Build a fresh executor graph for the (sub-)plan rooted at `root` and run
/// it. Resolves with the status of `root`'s executor.
fn schedule_plan(qctx: Arc<QueryContext>, root: NodeId, depth: usize) -> BoxFuture<'static, Status> {
    async move {
        let graph = ExecutorGraph::build(&qctx, root)?;
        run_graph(qctx, graph, depth).await
    }
    .boxed()
}

fn run_graph(qctx: Arc<QueryContext>, graph: Arc<ExecutorGraph>, depth: usize) -> BoxFuture<'static, Status> {
    // Breadth-first discovery from the root, each executor exactly once.
    let mut visited: HashSet<usize> = HashSet::new();
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut order: Vec<usize> = Vec::with_capacity(graph.len());
    queue.push_back(graph.root());
    visited.insert(graph.root());
    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for up in graph.executor(idx).upstream() {
            if visited.insert(*up) {
                queue.push_back(*up);
            }
        }
    }

    let mut completions: Vec<Option<Completion>> = (0..graph.len()).map(|_| None).collect();
    for idx in order.iter() {
        completions[*idx] = Some(Completion::new());
    }

    // Register every waiter before anything is spawned.
    let mut waiters: Vec<Vec<Waiter>> = vec![Vec::new(); graph.len()];
    for idx in order.iter() {
        for up in graph.executor(*idx).upstream() {
            if let Some(completion) = &completions[*up] {
                waiters[*idx].push(completion.waiter());
            }
        }
    }
    let root_waiter = completions[graph.root()].as_ref().map(Completion::waiter);

    // Dependencies were discovered after their dependents, so walking the
    // discovery order backwards spawns producers first.
    for idx in order.iter().rev() {
        let Some(completion) = completions[*idx].take() else {
            continue;
        };
        let deps = std::mem::take(&mut waiters[*idx]);
        let task_ctx = Arc::clone(&qctx);
        let task_graph = Arc::clone(&graph);
        let idx = *idx;
        qctx.runner().spawn(async move {
            let status = match wait_all(deps).await {
                Ok(()) => schedule_executor(&task_ctx, &task_graph, idx, depth).await,
                Err(err) => {
                    trace!(
                        node = task_graph.executor(idx).node(),
                        error = %err,
                        "dependency failed, skipping executor"
                    );
                    Err(err)
                }
            };
            completion.resolve(status);
        });
    }

    async move {
        match root_waiter {
            Some(waiter) => waiter.wait().await,
            None => Err(ExecError::Internal("root executor was never discovered".to_string())),
        }
    }
    .boxed()
}

async fn schedule_executor(
    qctx: &Arc<QueryContext>,
    graph: &ExecutorGraph,
    idx: usize,
    depth: usize,
) -> Status {
    let executor = graph.executor(idx);
    let node = qctx.plan().lookup(executor.node())?;
    match node.kind() {
        PlanNodeKind::Select {
            then_body,
            else_body,
            ..
        } => {
            dispatch(qctx, executor).await?;
            let taken = read_condition(qctx, node)?;
            let branch = if taken { *then_body } else { *else_body };
            debug!(node = node.id(), condition = taken, branch, "select branch chosen");
            let inner = enter_sub_plan(qctx, depth)?;
            schedule_plan(Arc::clone(qctx), branch, inner).await
        }
        PlanNodeKind::Loop { body, .. } => {
            let mut iteration: u64 = 0;
            loop {
                dispatch(qctx, executor).await?;
                if !read_condition(qctx, node)? {
                    debug!(node = node.id(), iterations = iteration, "loop finished");
                    return Ok(());
                }
                let inner = enter_sub_plan(qctx, depth)?;
                trace!(node = node.id(), iteration, "running loop body");
                schedule_plan(Arc::clone(qctx), *body, inner).await?;
                iteration += 1;
            }
        }
        _ => dispatch(qctx, executor).await,
    }
}

fn enter_sub_plan(qctx: &QueryContext, depth: usize) -> Result<usize, ExecError> {
    let limit = qctx.config().max_control_depth;
    if depth >= limit {
        warn!(depth, limit, "control-flow nesting limit reached");
        return Err(ExecError::NestingTooDeep { limit });
    }
    Ok(depth + 1)
}

/// Boolean written by a `Select`/`Loop` to its condition variable.
fn read_condition(qctx: &QueryContext, node: &PlanNode) -> Result<bool, ExecError> {
    let var = node.condition_var().unwrap_or(node.output_var());
    let value = qctx.ectx().get_value(var);
    value.as_bool().ok_or_else(|| ExecError::BadCondition {
        node: node.to_string(),
        value: value.to_string(),
        type_name: value.type_name().to_string(),
    })
}
