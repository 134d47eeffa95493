// src/plan/mod.rs

//! Compiled query plans.
//!
//! - [`node`] describes one operator and its static edges.
//! - [`symbols`] tracks variables: who writes them, who reads them, and the
//!   usage counters filled in by the lifetime analysis.
//! - [`graph`] holds a validated, shareable [`ExecutionPlan`].
//! - [`builder`] is the planner-facing API producing plans.
//! - [`lifetime`] is the usage-count / loop-depth pre-pass.

pub mod builder;
pub mod graph;
pub mod lifetime;
pub mod node;
pub mod symbols;

pub use builder::PlanBuilder;
pub use graph::ExecutionPlan;
pub use lifetime::LifetimeAnalyzer;
pub use node::{PlanNode, PlanNodeKind};
pub use symbols::{SymbolTable, Variable, UNBOUNDED_USERS};
