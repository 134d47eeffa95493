// src/lib.rs

//! Execution scheduler for compiled query plans.
//!
//! A plan is a DAG of operators, with `Select`/`Loop` nodes owning
//! sub-plans and `Argument` nodes reconverging on whichever branch wrote a
//! variable. [`scheduler::create`] picks a scheduling algorithm for a plan
//! and drives its executors on a [`context::RunnerHandle`] until the root
//! finishes or something fails.

pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod ops;
pub mod plan;
pub mod scheduler;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{compile, load_and_validate, PlanFile};
use crate::context::{QueryContext, RunnerHandle};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan file loading and validation
/// - compilation into an execution plan plus scripted operators
/// - scheduler selection and the run itself
pub async fn run(args: CliArgs) -> Result<()> {
    let plan_path = PathBuf::from(&args.plan);
    let mut file = load_and_validate(&plan_path)
        .with_context(|| format!("loading plan file {}", plan_path.display()))?;

    if let Some(strategy) = args.strategy {
        file.scheduler.strategy = strategy.into();
    }

    if args.dry_run {
        print_dry_run(&file);
        return Ok(());
    }

    let compiled = compile(&file)?;
    let plan = Arc::new(compiled.plan);
    let qctx = QueryContext::new(
        Arc::clone(&plan),
        Arc::new(compiled.operators),
        RunnerHandle::current(),
        compiled.scheduler,
    );

    info!(plan = %plan_path.display(), nodes = plan.len(), "scheduling plan");
    let status = scheduler::execute(Arc::clone(&qctx)).await;

    if args.profile {
        print_profile(&qctx, &compiled.ids);
    }

    match status {
        Ok(()) => {
            let root = plan.root_node();
            println!("status: ok");
            println!("{} = {}", root.output_var(), qctx.ectx().get_value(root.output_var()));
            Ok(())
        }
        Err(err) => {
            println!("status: failed");
            Err(anyhow::Error::new(err).context("query failed"))
        }
    }
}

fn print_profile(qctx: &QueryContext, ids: &std::collections::BTreeMap<String, types::NodeId>) {
    println!("profile:");
    for stats in qctx.profiling_stats() {
        let name = ids
            .iter()
            .find(|(_, id)| **id == stats.node)
            .map(|(name, _)| name.as_str())
            .unwrap_or("?");
        println!(
            "  {name} (executor {}): exec {:?}, total {:?}",
            stats.executor, stats.exec_duration, stats.total_duration
        );
    }
}

/// Simple dry-run output: print scheduler settings and nodes.
fn print_dry_run(file: &PlanFile) {
    println!("plansched dry-run");
    println!("  scheduler.strategy = {:?}", file.scheduler.strategy);
    println!(
        "  scheduler.enable_lifetime_optimize = {}",
        file.scheduler.enable_lifetime_optimize
    );
    println!(
        "  scheduler.max_control_depth = {}",
        file.scheduler.max_control_depth
    );
    println!("  root = {}", file.root);
    println!();

    println!("nodes ({}):", file.node.len());
    for (name, node) in file.node.iter() {
        println!("  - {name} ({:?})", node.kind);
        if !node.deps.is_empty() {
            println!("      deps: {:?}", node.deps);
        }
        if let Some(ref var) = node.var {
            println!("      var: {var}");
        }
        if let Some(ref output) = node.output {
            println!("      output: {output}");
        }
        if let Some(ref then_branch) = node.then_branch {
            println!("      then: {then_branch}");
        }
        if let Some(ref else_branch) = node.else_branch {
            println!("      else: {else_branch}");
        }
        if let Some(ref body) = node.body {
            println!("      body: {body}");
        }
    }

    debug!("dry-run complete (no execution)");
}
