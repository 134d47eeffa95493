// src/executor/operator.rs

//! The contract between the scheduler and per-operator logic.
//!
//! The scheduler never knows what an operator computes. It asks an
//! [`OperatorFactory`] for one [`Operator`] per executor and sequences
//! `open` -> `execute` -> `close` on it. A failure at any stage is treated
//! the same way.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::QueryContext;
use crate::errors::{ExecError, Status};
use crate::plan::PlanNode;

/// Work unit behind one executor.
///
/// `Select`/`Loop` operators evaluate their condition and write the result
/// (a boolean) to the node's condition variable. The scheduler reads it
/// back once `execute` has finished.
pub trait Operator: Send + Sync {
    /// Pre-flight, called before `execute`.
    fn open(&self, _ctx: &QueryContext, _node: &PlanNode) -> Status {
        Ok(())
    }

    fn execute<'a>(&'a self, ctx: &'a QueryContext, node: &'a PlanNode) -> BoxFuture<'a, Status>;

    /// Post-flight, called after a successful `execute`.
    fn close(&self, _ctx: &QueryContext, _node: &PlanNode) -> Status {
        Ok(())
    }
}

/// Creates the operator for a plan node.
///
/// Called once per executor, i.e. again for every `Loop` iteration and for
/// every lazily built `Select` branch.
pub trait OperatorFactory: Send + Sync {
    fn create(&self, node: &PlanNode) -> Result<Arc<dyn Operator>, ExecError>;
}
