// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{NodeConfig, NodeKindConfig, PlanFile, RawPlanFile};
use crate::errors::{Result, SchedError};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::SchedError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.scheduler, raw.root, raw.node))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_nodes(plan)?;
    validate_scheduler(plan)?;
    validate_root(plan)?;
    validate_references(plan)?;
    validate_node_kinds(plan)?;
    validate_arguments(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_nodes(plan: &RawPlanFile) -> Result<()> {
    if plan.node.is_empty() {
        return Err(SchedError::ConfigError(
            "plan must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(plan: &RawPlanFile) -> Result<()> {
    if plan.scheduler.max_control_depth == 0 {
        return Err(SchedError::ConfigError(
            "[scheduler].max_control_depth must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_root(plan: &RawPlanFile) -> Result<()> {
    if !plan.node.contains_key(&plan.root) {
        return Err(SchedError::NodeNotFound(format!(
            "root '{}' is not a declared node",
            plan.root
        )));
    }
    Ok(())
}

fn validate_references(plan: &RawPlanFile) -> Result<()> {
    for (name, node) in plan.node.iter() {
        for dep in node.deps.iter() {
            if dep == name {
                return Err(SchedError::ConfigError(format!(
                    "node '{name}' cannot depend on itself"
                )));
            }
            if !plan.node.contains_key(dep) {
                return Err(SchedError::NodeNotFound(format!(
                    "node '{name}' has unknown dependency '{dep}' in `deps`"
                )));
            }
        }
        for (key, sub) in sub_plan_refs(node) {
            if !plan.node.contains_key(sub) {
                return Err(SchedError::NodeNotFound(format!(
                    "node '{name}' has unknown sub-plan root '{sub}' in `{key}`"
                )));
            }
            if sub == name.as_str() {
                return Err(SchedError::ConfigError(format!(
                    "node '{name}' cannot use itself as `{key}`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_node_kinds(plan: &RawPlanFile) -> Result<()> {
    for (name, node) in plan.node.iter() {
        match node.kind {
            NodeKindConfig::Start => {
                if !node.deps.is_empty() {
                    return Err(SchedError::ConfigError(format!(
                        "start node '{name}' cannot have `deps`"
                    )));
                }
            }
            NodeKindConfig::Argument => {
                if !node.deps.is_empty() {
                    return Err(SchedError::ConfigError(format!(
                        "argument node '{name}' cannot have `deps`; it waits on the writers of `var`"
                    )));
                }
                if node.var.is_none() {
                    return Err(SchedError::ConfigError(format!(
                        "argument node '{name}' requires `var`"
                    )));
                }
            }
            NodeKindConfig::Join => {
                if node.deps.len() != 2 {
                    return Err(SchedError::ConfigError(format!(
                        "join node '{name}' requires exactly 2 deps (got {})",
                        node.deps.len()
                    )));
                }
            }
            NodeKindConfig::Select => {
                if node.then_branch.is_none() || node.else_branch.is_none() {
                    return Err(SchedError::ConfigError(format!(
                        "select node '{name}' requires both `then` and `else`"
                    )));
                }
            }
            NodeKindConfig::Loop => {
                if node.body.is_none() {
                    return Err(SchedError::ConfigError(format!(
                        "loop node '{name}' requires `body`"
                    )));
                }
            }
            NodeKindConfig::Operator => {}
        }
    }
    Ok(())
}

fn validate_arguments(plan: &RawPlanFile) -> Result<()> {
    for (name, node) in plan.node.iter() {
        let Some(var) = node.var.as_deref() else {
            continue;
        };
        let written = plan
            .node
            .values()
            .any(|other| other.output.as_deref() == Some(var));
        if !written {
            return Err(SchedError::ConfigError(format!(
                "node '{name}' reads variable '{var}' but no node declares it as `output`"
            )));
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    // Edge direction: dep -> node, and sub-plan root -> owning select/loop.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in plan.node.keys() {
        graph.add_node(name.as_str());
    }

    for (name, node) in plan.node.iter() {
        for dep in node.deps.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
        for (_, sub) in sub_plan_refs(node) {
            graph.add_edge(sub, name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(SchedError::PlanCycle(format!(
                "cycle detected in plan involving node '{}'",
                node
            )))
        }
    }
}

/// `(key, target)` pairs of the sub-plan roots a node references.
pub(crate) fn sub_plan_refs(node: &NodeConfig) -> Vec<(&'static str, &str)> {
    let mut refs = Vec::new();
    if let Some(sub) = node.then_branch.as_deref() {
        refs.push(("then", sub));
    }
    if let Some(sub) = node.else_branch.as_deref() {
        refs.push(("else", sub));
    }
    if let Some(sub) = node.body.as_deref() {
        refs.push(("body", sub));
    }
    refs
}
