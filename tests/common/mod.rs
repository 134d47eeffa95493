#![allow(dead_code)]

use std::sync::Arc;

use plansched::config::SchedulerConfig;
use plansched::context::QueryContext;
use plansched::errors::Status;
use plansched::ops::ScriptedOperators;
use plansched::plan::ExecutionPlan;
use plansched::scheduler;
use plansched::types::SchedulingStrategy;

pub use plansched_test_utils::builders;
pub use plansched_test_utils::recording::RecordingOperators;
pub use plansched_test_utils::{init_tracing, query, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Outcome of one scheduled run, with everything a test wants to inspect.
pub struct Run {
    pub status: Status,
    pub ops: RecordingOperators,
    pub qctx: Arc<QueryContext>,
}

/// Schedule `plan` with the given strategy and wait for its status.
pub async fn run_plan(
    plan: impl Into<Arc<ExecutionPlan>>,
    operators: ScriptedOperators,
    strategy: SchedulingStrategy,
) -> Run {
    run_with_config(
        plan,
        operators,
        SchedulerConfig::default().with_strategy(strategy),
    )
    .await
}

pub async fn run_with_config(
    plan: impl Into<Arc<ExecutionPlan>>,
    operators: ScriptedOperators,
    config: SchedulerConfig,
) -> Run {
    let ops = RecordingOperators::new(operators);
    let qctx = query(plan.into(), Arc::new(ops.clone()), config);
    let status = with_timeout(scheduler::execute(Arc::clone(&qctx))).await;
    Run { status, ops, qctx }
}
