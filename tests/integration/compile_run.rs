// tests/integration/compile_run.rs

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;

use plansched::cli::{CliArgs, StrategyArg};
use plansched::config::{compile, load_and_validate, CompiledPlan};
use plansched::context::{QueryContext, RunnerHandle};
use plansched::errors::{ExecError, Status};
use plansched::scheduler;
use plansched::types::Value;
use plansched_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const SELECT_PLAN: &str = r#"
root = "final"

[node.start]
kind = "start"

[node.pick]
kind = "select"
deps = ["start"]
then = "yes"
else = "no"
condition = false

[node.yes]
kind = "operator"
value = "yes"
output = "answer"

[node.no]
kind = "operator"
value = "no"
output = "answer"

[node.arg]
kind = "argument"
var = "answer"

[node.final]
kind = "join"
deps = ["arg", "pick"]
"#;

const LOOP_PLAN: &str = r#"
root = "project"

[scheduler]
strategy = "notify"

[node.start]
kind = "start"

[node.init]
kind = "operator"
deps = ["start"]
value = 0
output = "acc"

[node.repeat]
kind = "loop"
deps = ["init"]
body = "step"
iterations = 2

[node.carry]
kind = "argument"
var = "acc"

[node.step]
kind = "operator"
name = "Step"
deps = ["carry"]
output = "acc"

[node.project]
kind = "operator"
deps = ["repeat"]
"#;

const FAILING_PLAN: &str = r#"
root = "sink"

[node.start]
kind = "start"

[node.scan]
kind = "operator"
deps = ["start"]
fail = "storage unavailable"

[node.sink]
kind = "operator"
deps = ["scan"]
"#;

fn plan_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn compile_str(contents: &str) -> Result<CompiledPlan, Box<dyn Error>> {
    let file = plan_file(contents);
    let plan = load_and_validate(file.path())?;
    Ok(compile(&plan)?)
}

async fn execute(compiled: CompiledPlan) -> (Status, Arc<QueryContext>) {
    let qctx = QueryContext::new(
        Arc::new(compiled.plan),
        Arc::new(compiled.operators),
        RunnerHandle::current(),
        compiled.scheduler,
    );
    let status = with_timeout(scheduler::execute(Arc::clone(&qctx))).await;
    (status, qctx)
}

#[tokio::test]
async fn select_plan_file_reconverges_on_else_branch() -> TestResult {
    init_tracing();
    let compiled = compile_str(SELECT_PLAN)?;
    let yes = compiled.id("yes").ok_or("yes missing")?;
    let no = compiled.id("no").ok_or("no missing")?;
    assert_eq!(
        compiled.plan.variable("answer").map(|v| v.written_by.len()),
        Some(2)
    );
    assert!(compiled.plan.variable("answer").unwrap().written_by.contains(&yes));
    assert!(compiled.plan.variable("answer").unwrap().written_by.contains(&no));

    let (status, qctx) = execute(compiled).await;
    status?;

    let root = qctx.plan().root_node();
    assert_eq!(
        qctx.ectx().get_value(root.output_var()),
        Value::List(vec![Value::from("no"), Value::Bool(false)])
    );
    assert_eq!(qctx.ectx().history("answer"), vec![Value::from("no")]);
    Ok(())
}

#[tokio::test]
async fn loop_plan_file_carries_accumulator() -> TestResult {
    init_tracing();
    let compiled = compile_str(LOOP_PLAN)?;
    let step = compiled.id("step").ok_or("step missing")?;
    assert_eq!(
        compiled.plan.node(step).map(|n| n.to_string()),
        Some(format!("Step#{step}"))
    );

    let (status, qctx) = execute(compiled).await;
    status?;

    let acc = qctx.ectx().history("acc");
    assert_eq!(
        acc,
        vec![
            Value::Int(0),
            Value::List(vec![Value::Int(0)]),
            Value::List(vec![Value::List(vec![Value::Int(0)])]),
        ]
    );
    let step_runs = qctx
        .profiling_stats()
        .iter()
        .filter(|s| s.node == step)
        .count();
    assert_eq!(step_runs, 2);
    Ok(())
}

#[tokio::test]
async fn failing_operator_in_plan_file_fails_query() -> TestResult {
    init_tracing();
    let compiled = compile_str(FAILING_PLAN)?;

    let (status, _qctx) = execute(compiled).await;

    assert_eq!(status, Err(ExecError::failed("storage unavailable")));
    Ok(())
}

#[tokio::test]
async fn cli_driver_runs_and_reports() -> TestResult {
    init_tracing();
    let ok = plan_file(LOOP_PLAN);
    let failing = plan_file(FAILING_PLAN);

    let args = |path: &NamedTempFile, dry_run: bool| CliArgs {
        plan: path.path().display().to_string(),
        strategy: Some(StrategyArg::Auto),
        worker_threads: None,
        log_level: None,
        dry_run,
        profile: true,
    };

    plansched::run(args(&ok, true)).await?;
    plansched::run(args(&ok, false)).await?;
    plansched::run(args(&failing, true)).await?;

    let err = plansched::run(args(&failing, false))
        .await
        .expect_err("failing plan must fail");
    assert!(format!("{err:#}").contains("storage unavailable"));
    Ok(())
}
