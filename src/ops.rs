// src/ops.rs

//! Scripted operators.
//!
//! A concrete [`OperatorFactory`] whose operators do what a declarative
//! [`OpSpec`] says: write a value, fail, panic, sleep, or produce a
//! `Select`/`Loop` condition. Plan files compile to it, and tests use it to
//! build plans with precisely controlled behaviour.
//!
//! Default behaviour per node kind:
//! - `Start`: nothing
//! - `Argument`: copy the latest value of its input variable to its output
//! - `Select`: write `true`
//! - `Loop`: write `true` for the first `iterations` evaluations, then `false`
//! - `Operator`/`Join`: write `value`, or the list of input values

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::trace;

use crate::context::QueryContext;
use crate::errors::{ExecError, Status};
use crate::executor::{Operator, OperatorFactory};
use crate::plan::{PlanNode, PlanNodeKind};
use crate::types::{NodeId, Value};

/// Behaviour of one scripted operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpSpec {
    pub value: Option<Value>,
    pub fail: Option<String>,
    pub panic: Option<String>,
    pub delay: Option<Duration>,
    /// Condition written by a `Select`/`Loop`, overriding the default.
    pub condition: Option<Value>,
    /// Number of `true` evaluations of a `Loop`.
    pub iterations: u64,
}

impl OpSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn fail(mut self, msg: impl Into<String>) -> Self {
        self.fail = Some(msg.into());
        self
    }

    pub fn panic(mut self, msg: impl Into<String>) -> Self {
        self.panic = Some(msg.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn condition(mut self, value: impl Into<Value>) -> Self {
        self.condition = Some(value.into());
        self
    }

    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = n;
        self
    }
}

/// Factory handing out one [`ScriptedOperator`] per executor.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperators {
    specs: HashMap<NodeId, OpSpec>,
}

impl ScriptedOperators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, node: NodeId, spec: OpSpec) -> Self {
        self.insert(node, spec);
        self
    }

    pub fn insert(&mut self, node: NodeId, spec: OpSpec) {
        self.specs.insert(node, spec);
    }

    pub fn spec(&self, node: NodeId) -> Option<&OpSpec> {
        self.specs.get(&node)
    }
}

impl OperatorFactory for ScriptedOperators {
    fn create(&self, node: &PlanNode) -> Result<Arc<dyn Operator>, ExecError> {
        let spec = self.specs.get(&node.id()).cloned().unwrap_or_default();
        Ok(Arc::new(ScriptedOperator::new(spec)))
    }
}

#[derive(Debug)]
pub struct ScriptedOperator {
    spec: OpSpec,
    evaluations: AtomicU64,
}

impl ScriptedOperator {
    pub fn new(spec: OpSpec) -> Self {
        Self {
            spec,
            evaluations: AtomicU64::new(0),
        }
    }

    async fn run(&self, ctx: &QueryContext, node: &PlanNode) -> Status {
        if let Some(delay) = self.spec.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = &self.spec.panic {
            panic!("{msg}");
        }
        if let Some(msg) = &self.spec.fail {
            return Err(ExecError::failed(msg.clone()));
        }

        let ectx = ctx.ectx();
        match node.kind() {
            PlanNodeKind::Start => {}
            PlanNodeKind::Argument => {
                let value = node
                    .input_vars()
                    .first()
                    .map(|var| ectx.get_value(var))
                    .unwrap_or_default();
                ectx.set_value(node.output_var(), value);
            }
            PlanNodeKind::Select { condition_var, .. } => {
                let cond = self.spec.condition.clone().unwrap_or(Value::Bool(true));
                ectx.set_value(condition_var, cond);
            }
            PlanNodeKind::Loop { condition_var, .. } => {
                let n = self.evaluations.fetch_add(1, Ordering::Relaxed);
                let cond = match &self.spec.condition {
                    Some(v) => v.clone(),
                    None => Value::Bool(n < self.spec.iterations),
                };
                trace!(node = %node, evaluation = n, "loop condition evaluated");
                ectx.set_value(condition_var, cond);
            }
            PlanNodeKind::Operator { .. } | PlanNodeKind::Join { .. } => {
                let value = match &self.spec.value {
                    Some(v) => v.clone(),
                    None => Value::List(read_inputs(ctx, node)),
                };
                ectx.set_value(node.output_var(), value);
            }
        }
        Ok(())
    }
}

impl Operator for ScriptedOperator {
    fn execute<'a>(&'a self, ctx: &'a QueryContext, node: &'a PlanNode) -> BoxFuture<'a, Status> {
        self.run(ctx, node).boxed()
    }
}

/// Latest value of every input variable, moved out of the context where
/// the lifetime analysis allows it.
fn read_inputs(ctx: &QueryContext, node: &PlanNode) -> Vec<Value> {
    node.input_vars()
        .iter()
        .map(|name| match ctx.plan().variable(name) {
            Some(var) => ctx.ectx().move_or_copy(var, node).unwrap_or_default(),
            None => ctx.ectx().get_value(name),
        })
        .collect()
}
