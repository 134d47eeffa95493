// src/config/mod.rs

//! Plan files and scheduler configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate references, kind-specific keys and acyclicity (`validate.rs`).
//! - Compile a validated file into an executable plan (`compile.rs`).

pub mod compile;
pub mod loader;
pub mod model;
pub mod validate;

pub use compile::{compile, CompiledPlan};
pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{NodeConfig, NodeKindConfig, PlanFile, RawPlanFile, SchedulerConfig};
