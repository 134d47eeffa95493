// src/config/compile.rs

//! Turning a validated [`PlanFile`] into an [`ExecutionPlan`] plus the
//! scripted operators that give its nodes behaviour.

use std::collections::BTreeMap;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::model::{NodeConfig, NodeKindConfig, PlanFile};
use crate::config::validate::sub_plan_refs;
use crate::config::SchedulerConfig;
use crate::errors::{Result, SchedError};
use crate::ops::{OpSpec, ScriptedOperators};
use crate::plan::{ExecutionPlan, PlanBuilder};
use crate::types::NodeId;

/// Result of compiling a plan file.
#[derive(Debug)]
pub struct CompiledPlan {
    pub plan: ExecutionPlan,
    pub operators: ScriptedOperators,
    pub scheduler: SchedulerConfig,
    /// Node table name -> plan node id.
    pub ids: BTreeMap<String, NodeId>,
}

impl CompiledPlan {
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.ids.get(name).copied()
    }
}

pub fn compile(file: &PlanFile) -> Result<CompiledPlan> {
    let mut builder = PlanBuilder::new();
    let mut ids: BTreeMap<String, NodeId> = BTreeMap::new();
    let mut operators = ScriptedOperators::new();

    for name in creation_order(file)? {
        let Some(cfg) = file.node.get(&name) else {
            continue;
        };
        let id = add_node(&mut builder, &ids, &name, cfg)?;
        operators.insert(id, op_spec(cfg));
        ids.insert(name, id);
    }

    // Explicit outputs are applied last so every reader exists already.
    for (name, cfg) in file.node.iter() {
        if let (Some(output), Some(id)) = (cfg.output.as_deref(), ids.get(name)) {
            builder.set_output_var(*id, output);
        }
    }

    let root = lookup(&ids, &file.root)?;
    let plan = builder.build(root)?;
    debug!(root = %file.root, nodes = ids.len(), "compiled plan file");

    Ok(CompiledPlan {
        plan,
        operators,
        scheduler: file.scheduler.clone(),
        ids,
    })
}

/// Node names ordered so that dependencies and sub-plan roots come before
/// the nodes referencing them.
fn creation_order(file: &PlanFile) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (name, cfg) in file.node.iter() {
        graph.add_node(name.as_str());
        for dep in cfg.deps.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
        for (_, sub) in sub_plan_refs(cfg) {
            graph.add_edge(sub, name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(SchedError::PlanCycle(format!(
            "cycle detected in plan involving node '{}'",
            cycle.node_id()
        ))),
    }
}

fn add_node(
    builder: &mut PlanBuilder,
    ids: &BTreeMap<String, NodeId>,
    name: &str,
    cfg: &NodeConfig,
) -> Result<NodeId> {
    let deps = cfg
        .deps
        .iter()
        .map(|dep| lookup(ids, dep))
        .collect::<Result<Vec<_>>>()?;
    let label = cfg.name.as_deref().unwrap_or(name);

    let id = match cfg.kind {
        NodeKindConfig::Start => builder.start(),
        NodeKindConfig::Argument => {
            let var = cfg.var.as_deref().ok_or_else(|| {
                SchedError::ConfigError(format!("argument node '{name}' requires `var`"))
            })?;
            builder.argument(var)
        }
        NodeKindConfig::Operator => builder.operator(label, &deps),
        NodeKindConfig::Join => match deps.as_slice() {
            [left, right] => builder.join(label, *left, *right),
            _ => {
                return Err(SchedError::ConfigError(format!(
                    "join node '{name}' requires exactly 2 deps"
                )));
            }
        },
        NodeKindConfig::Select => {
            let then_body = lookup(ids, required(name, "then", &cfg.then_branch)?)?;
            let else_body = lookup(ids, required(name, "else", &cfg.else_branch)?)?;
            builder.select(&deps, then_body, else_body)
        }
        NodeKindConfig::Loop => {
            let body = lookup(ids, required(name, "body", &cfg.body)?)?;
            builder.loop_node(&deps, body)
        }
    };
    Ok(id)
}

fn op_spec(cfg: &NodeConfig) -> OpSpec {
    OpSpec {
        value: cfg.value.clone(),
        fail: cfg.fail.clone(),
        panic: cfg.panic.clone(),
        delay: cfg.delay_ms.map(Duration::from_millis),
        condition: cfg.condition.clone(),
        iterations: cfg.iterations.unwrap_or(0),
    }
}

fn required<'a>(name: &str, key: &str, value: &'a Option<String>) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| SchedError::ConfigError(format!("node '{name}' requires `{key}`")))
}

fn lookup(ids: &BTreeMap<String, NodeId>, name: &str) -> Result<NodeId> {
    ids.get(name)
        .copied()
        .ok_or_else(|| SchedError::NodeNotFound(format!("node '{name}'")))
}
