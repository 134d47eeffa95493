// src/scheduler/push.rs

//! Push scheduler for control-flow-free plans.
//!
//! No completions are allocated. Leaves are launched together; every
//! finished executor bumps the `finish_dep` counter of its successors (and
//! of the arguments waiting on its output variable) and launches those
//! whose counter reached their total. The returned future resolves when
//! the whole fan-out has.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, info, trace, warn};

use crate::context::QueryContext;
use crate::errors::{ExecError, Status};
use crate::executor::{dispatch, ExecutorGraph};
use crate::scheduler::{prepare_plan, Scheduler, SchedulerKind};

#[derive(Debug)]
pub struct PushScheduler {
    qctx: Arc<QueryContext>,
}

impl PushScheduler {
    pub fn new(qctx: Arc<QueryContext>) -> Self {
        Self { qctx }
    }
}

impl Scheduler for PushScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Push
    }

    fn schedule(&self) -> BoxFuture<'static, Status> {
        let qctx = Arc::clone(&self.qctx);
        async move {
            prepare_plan(&qctx);
            let root = qctx.plan().root();
            let status = run(&qctx).await;
            match &status {
                Ok(()) => info!(root, "push schedule finished"),
                Err(err) => warn!(root, error = %err, "push schedule failed"),
            }
            status
        }
        .boxed()
    }
}

/// Shared state of one push run.
struct PushRun {
    qctx: Arc<QueryContext>,
    graph: Arc<ExecutorGraph>,
    /// Input variable name -> argument executors reading it.
    argument_map: HashMap<String, Vec<usize>>,
}

async fn run(qctx: &Arc<QueryContext>) -> Status {
    let graph = ExecutorGraph::build(qctx, qctx.plan().root())?;

    let mut argument_map: HashMap<String, Vec<usize>> = HashMap::new();
    let mut leaves: Vec<usize> = Vec::new();
    for (idx, executor) in graph.executors() {
        if executor.is_argument() {
            let node = qctx.plan().lookup(executor.node())?;
            for var in node.input_vars() {
                argument_map.entry(var.clone()).or_default().push(idx);
            }
        }
        if executor.pending_total() == 0 {
            leaves.push(idx);
        }
    }
    if leaves.is_empty() {
        return Err(ExecError::Internal(
            "executor graph has no leaf to start from".to_string(),
        ));
    }
    debug!(leaves = leaves.len(), arguments = argument_map.len(), "push run starting");

    let run = Arc::new(PushRun {
        qctx: Arc::clone(qctx),
        graph,
        argument_map,
    });
    try_join_all(leaves.into_iter().map(|idx| launch(Arc::clone(&run), idx)))
        .await
        .map(|_| ())
}

/// Run executor `idx`, then everything it makes ready.
fn launch(run: Arc<PushRun>, idx: usize) -> BoxFuture<'static, Status> {
    async move {
        let executor = run.graph.executor(idx);
        dispatch(&run.qctx, executor).await?;

        let mut ready: Vec<usize> = Vec::new();

        let node = run.qctx.plan().lookup(executor.node())?;
        if let Some(arguments) = run.argument_map.get(node.output_var()) {
            for arg in arguments {
                let waiting = run.graph.executor(*arg);
                if waiting.argument_writers().contains(&idx)
                    && waiting.finish_one() == waiting.pending_total()
                {
                    ready.push(*arg);
                }
            }
        }

        for succ in executor.successors() {
            let successor = run.graph.executor(*succ);
            if successor.finish_one() == successor.pending_total() {
                ready.push(*succ);
            }
        }

        trace!(node = executor.node(), ready = ?ready, "pushing ready executors");
        try_join_all(ready.into_iter().map(|next| launch(Arc::clone(&run), next)))
            .await
            .map(|_| ())
    }
    .boxed()
}
