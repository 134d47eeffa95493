// src/executor/dispatch.rs

//! Running one executor on the query's runner.
//!
//! The `open` -> `execute` -> `close` sequence runs as its own task so a
//! panicking operator surfaces as a join error here instead of tearing
//! down the scheduler.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::context::{ProfilingStats, QueryContext};
use crate::errors::{ExecError, Status};
use crate::executor::{Executor, Operator};
use crate::types::NodeId;

/// Run `executor` to completion and return its terminal status.
pub async fn dispatch(qctx: &Arc<QueryContext>, executor: &Executor) -> Status {
    let node = executor.node();
    let id = executor.id();
    debug!(node, executor = id, "dispatching executor");

    let task_ctx = Arc::clone(qctx);
    let operator = Arc::clone(executor.operator());
    let handle = qctx
        .runner()
        .spawn(async move { run_operator(&task_ctx, operator.as_ref(), node, id).await });

    let status = match handle.await {
        Ok(status) => status,
        Err(err) if err.is_panic() => {
            let msg = panic_message(err.into_panic());
            warn!(node, executor = id, error = %msg, "executor panicked");
            Err(ExecError::Fault(msg))
        }
        Err(err) => Err(ExecError::Fault(err.to_string())),
    };

    match &status {
        Ok(()) => debug!(node, executor = id, "executor finished"),
        Err(err) => debug!(node, executor = id, error = %err, "executor failed"),
    }
    status
}

async fn run_operator(
    qctx: &QueryContext,
    operator: &dyn Operator,
    node_id: NodeId,
    executor: u64,
) -> Status {
    let node = qctx.plan().lookup(node_id)?;
    let started = Instant::now();

    if qctx.is_killed() {
        return Err(ExecError::Killed);
    }
    operator.open(qctx, node)?;

    let exec_started = Instant::now();
    operator.execute(qctx, node).await?;
    let exec_duration = exec_started.elapsed();

    operator.close(qctx, node)?;
    qctx.record_profile(ProfilingStats {
        node: node_id,
        executor,
        exec_duration,
        total_duration: started.elapsed(),
    });
    Ok(())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "executor panicked".to_string()
    }
}
