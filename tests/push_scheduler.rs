// tests/push_scheduler.rs

mod common;
use crate::common::builders::{chain, diamond};
use crate::common::{init_tracing, run_plan, TestResult};

use std::time::Duration;

use plansched::errors::ExecError;
use plansched::ops::{OpSpec, ScriptedOperators};
use plansched::plan::{ExecutionPlan, PlanBuilder};
use plansched::types::{NodeId, SchedulingStrategy, Value};

const PUSH: SchedulingStrategy = SchedulingStrategy::Push;

/// `Start -> Source(v)`, `Argument(v)`, `Final = Join(Argument, Source)`.
fn argument_plan() -> (ExecutionPlan, NodeId, NodeId, NodeId) {
    let mut b = PlanBuilder::new();
    let start = b.start();
    let source = b.operator("Source", &[start]);
    b.set_output_var(source, "v");
    let argument = b.argument("v");
    let root = b.join("Final", argument, source);
    let plan = b.build(root).expect("argument plan is valid");
    (plan, source, argument, root)
}

#[tokio::test]
async fn chain_is_pushed_in_dependency_order() -> TestResult {
    init_tracing();
    let (plan, ids) = chain(5);

    let run = run_plan(plan, ScriptedOperators::new(), PUSH).await;
    run.status?;

    assert_eq!(run.ops.dispatch_order(), ids);
    for pair in ids.windows(2) {
        assert!(run.ops.finishes(pair[0])[0] < run.ops.dispatches(pair[1])[0]);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn join_is_pushed_once_after_both_sides() -> TestResult {
    init_tracing();
    let d = diamond();
    let ops = ScriptedOperators::new()
        .with(d.a, OpSpec::new().value(1).delay(Duration::from_millis(20)))
        .with(d.b, OpSpec::new().value(2));
    let root_var = d.plan.root_node().output_var().to_string();
    let (a, b, c) = (d.a, d.b, d.c);

    let run = run_plan(d.plan, ops, PUSH).await;
    run.status?;

    assert_eq!(run.ops.dispatch_count(c), 1);
    let c_dispatched = run.ops.dispatches(c)[0];
    assert!(run.ops.finishes(a)[0] < c_dispatched);
    assert!(run.ops.finishes(b)[0] < c_dispatched);
    assert_eq!(
        run.qctx.ectx().get_value(&root_var),
        Value::List(vec![Value::Int(1), Value::Int(2)])
    );
    Ok(())
}

#[tokio::test]
async fn argument_is_pushed_by_its_writer() -> TestResult {
    init_tracing();
    let (plan, source, argument, root) = argument_plan();
    let root_var = plan.root_node().output_var().to_string();
    let ops = ScriptedOperators::new().with(
        source,
        OpSpec::new().value(5).delay(Duration::from_millis(10)),
    );

    let run = run_plan(plan, ops, PUSH).await;
    run.status?;

    assert!(run.ops.finishes(source)[0] < run.ops.dispatches(argument)[0]);
    assert_eq!(run.ops.dispatch_count(root), 1);
    assert_eq!(
        run.qctx.ectx().get_value(&root_var),
        Value::List(vec![Value::Int(5), Value::Int(5)])
    );
    Ok(())
}

#[tokio::test]
async fn failure_stops_the_push_fan_out() -> TestResult {
    init_tracing();
    let d = diamond();
    let ops = ScriptedOperators::new().with(d.b, OpSpec::new().fail("b broke"));
    let c = d.c;

    let run = run_plan(d.plan, ops, PUSH).await;

    assert_eq!(run.status, Err(ExecError::failed("b broke")));
    assert!(!run.ops.ran(c));
    Ok(())
}

#[tokio::test]
async fn panic_in_pushed_executor_becomes_fault() -> TestResult {
    init_tracing();
    let (plan, ids) = chain(3);
    let ops = ScriptedOperators::new().with(ids[1], OpSpec::new().panic("pushed too far"));

    let run = run_plan(plan, ops, PUSH).await;

    assert_eq!(run.status, Err(ExecError::Fault("pushed too far".to_string())));
    assert!(!run.ops.ran(ids[2]));
    Ok(())
}

#[tokio::test]
async fn killed_query_fails_on_first_push() -> TestResult {
    init_tracing();
    let d = diamond();
    let ops = common::RecordingOperators::new(ScriptedOperators::new());
    let qctx = common::query(
        d.plan.into(),
        std::sync::Arc::new(ops.clone()),
        plansched::config::SchedulerConfig::default().with_strategy(PUSH),
    );
    qctx.kill();

    let status = plansched::scheduler::execute(qctx).await;

    assert_eq!(status, Err(ExecError::Killed));
    assert!(ops.events().is_empty());
    Ok(())
}
