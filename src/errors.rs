// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Two layers:
//! - [`SchedError`] is what library entry points (plan loading, building,
//!   the CLI driver) return.
//! - [`ExecError`] is the terminal failure of a single executor. It is
//!   `Clone` because one failure is broadcast to every waiter of that
//!   executor, and a query's [`Status`] carries it unchanged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Plan node not found: {0}")]
    NodeNotFound(String),

    #[error("Cycle detected in plan: {0}")]
    PlanCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Terminal failure of one executor (and therefore of the query).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Failure reported by an operator; relayed verbatim.
    #[error("{0}")]
    Failed(String),

    /// The query was killed before this executor could open.
    #[error("Execution had been killed")]
    Killed,

    /// A `Select`/`Loop` condition evaluated to something other than a bool.
    #[error("{node} produces a bad condition result: {value} type: {type_name}")]
    BadCondition {
        node: String,
        value: String,
        type_name: String,
    },

    /// The operator task panicked (or could not be joined).
    #[error("{0}")]
    Fault(String),

    /// Control-flow sub-plans nested deeper than `max_control_depth`.
    #[error("control-flow nesting exceeds the configured limit of {limit}")]
    NestingTooDeep { limit: usize },

    #[error("internal scheduler error: {0}")]
    Internal(String),
}

impl ExecError {
    /// Shorthand for an operator-level failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        ExecError::Failed(msg.into())
    }
}

/// Outcome of one executor, and of a whole `schedule()` call.
pub type Status = std::result::Result<(), ExecError>;

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedError>;
