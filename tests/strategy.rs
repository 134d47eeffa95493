// tests/strategy.rs

mod common;
use crate::common::builders::{chain, counting_loop, diamond, select_reconverging};
use crate::common::{init_tracing, query, run_plan, RecordingOperators, TestResult};

use std::sync::Arc;

use plansched::config::SchedulerConfig;
use plansched::errors::ExecError;
use plansched::ops::{OpSpec, ScriptedOperators};
use plansched::plan::{ExecutionPlan, PlanBuilder};
use plansched::scheduler::{create, is_push_eligible, SchedulerKind};
use plansched::types::SchedulingStrategy;

fn kind_for(plan: ExecutionPlan, strategy: SchedulingStrategy) -> SchedulerKind {
    let qctx = query(
        Arc::new(plan),
        Arc::new(ScriptedOperators::new()),
        SchedulerConfig::default().with_strategy(strategy),
    );
    create(qctx).kind()
}

#[tokio::test]
async fn auto_picks_push_only_without_control_flow() {
    init_tracing();
    assert_eq!(kind_for(diamond().plan, SchedulingStrategy::Auto), SchedulerKind::Push);
    assert_eq!(
        kind_for(select_reconverging().plan, SchedulingStrategy::Auto),
        SchedulerKind::Notify
    );
    assert_eq!(
        kind_for(counting_loop().plan, SchedulingStrategy::Auto),
        SchedulerKind::Notify
    );
}

#[tokio::test]
async fn forced_strategies() {
    init_tracing();
    assert_eq!(kind_for(diamond().plan, SchedulingStrategy::Notify), SchedulerKind::Notify);
    assert_eq!(kind_for(diamond().plan, SchedulingStrategy::Push), SchedulerKind::Push);
    // Push cannot run control flow; the request degrades to notify.
    assert_eq!(
        kind_for(counting_loop().plan, SchedulingStrategy::Push),
        SchedulerKind::Notify
    );
}

#[test]
fn control_flow_anywhere_below_the_root_disqualifies_push() {
    // Start -> Select -> Filter -> Join(Filter, Scan)
    let mut b = PlanBuilder::new();
    let then_op = b.operator("Then", &[]);
    let else_op = b.operator("Else", &[]);
    let start = b.start();
    let scan = b.operator("Scan", &[start]);
    let select = b.select(&[start], then_op, else_op);
    let filter = b.operator("Filter", &[select]);
    let root = b.join("Join", filter, scan);
    let plan = b.build(root).expect("valid plan");

    assert!(!is_push_eligible(&plan));
    assert!(is_push_eligible(&chain(3).0));
    assert!(is_push_eligible(&diamond().plan));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn both_schedulers_agree_on_control_flow_free_plans() -> TestResult {
    init_tracing();

    let make_ops = |d: &common::builders::Diamond| {
        ScriptedOperators::new()
            .with(d.a, OpSpec::new().value("left"))
            .with(d.b, OpSpec::new().value(2))
    };

    let d = diamond();
    let notify_ops = make_ops(&d);
    let notify = run_plan(d.plan, notify_ops, SchedulingStrategy::Notify).await;

    let d = diamond();
    let push_ops = make_ops(&d);
    let push = run_plan(d.plan, push_ops, SchedulingStrategy::Push).await;

    assert_eq!(notify.status, push.status);
    assert_eq!(notify.qctx.ectx().snapshot(), push.qctx.ectx().snapshot());
    Ok(())
}

#[tokio::test]
async fn both_schedulers_report_the_same_failure() -> TestResult {
    init_tracing();
    let mut statuses = Vec::new();

    for strategy in [SchedulingStrategy::Notify, SchedulingStrategy::Push] {
        let (plan, ids) = chain(4);
        let ops = ScriptedOperators::new().with(ids[2], OpSpec::new().fail("disk full"));
        let run = run_plan(plan, ops, strategy).await;
        assert!(!run.ops.ran(ids[3]));
        statuses.push(run.status);
    }

    assert_eq!(statuses[0], Err(ExecError::failed("disk full")));
    assert_eq!(statuses[0], statuses[1]);
    Ok(())
}

#[tokio::test]
async fn same_plan_can_run_under_either_scheduler() -> TestResult {
    init_tracing();
    let plan = Arc::new(diamond().plan);

    for strategy in [SchedulingStrategy::Push, SchedulingStrategy::Notify] {
        let ops = RecordingOperators::new(ScriptedOperators::new());
        let qctx = query(
            Arc::clone(&plan),
            Arc::new(ops.clone()),
            SchedulerConfig::default().with_strategy(strategy),
        );
        let scheduler = create(qctx);
        scheduler.schedule().await?;
        assert_eq!(ops.events().len(), 2 * plan.len());
    }
    Ok(())
}
