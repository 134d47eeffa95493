// src/executor/mod.rs

//! Executors: the runtime side of plan nodes.
//!
//! - [`operator`] defines the traits operator implementations provide.
//! - [`graph`] builds the per-invocation [`ExecutorGraph`].
//! - [`dispatch`] runs one executor on the query's runner.

pub mod dispatch;
pub mod graph;
pub mod operator;

pub use dispatch::dispatch;
pub use graph::{Executor, ExecutorGraph};
pub use operator::{Operator, OperatorFactory};
