// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{SchedulingStrategy, Value};

/// Scheduler knobs, read from the `[scheduler]` section of a plan file or
/// built directly by an embedding application.
///
/// ```toml
/// [scheduler]
/// enable_lifetime_optimize = true
/// strategy = "auto"
/// max_control_depth = 64
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Run the lifetime analysis before the first dispatch of a plan.
    #[serde(default = "default_enable_lifetime_optimize")]
    pub enable_lifetime_optimize: bool,

    /// `"auto"` (default), `"notify"` or `"push"`.
    #[serde(default)]
    pub strategy: SchedulingStrategy,

    /// Maximum nesting of `Select`/`Loop` sub-plans scheduled inside each
    /// other. Exceeding it fails the query.
    #[serde(default = "default_max_control_depth")]
    pub max_control_depth: usize,
}

fn default_enable_lifetime_optimize() -> bool {
    true
}

fn default_max_control_depth() -> usize {
    64
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_lifetime_optimize: default_enable_lifetime_optimize(),
            strategy: SchedulingStrategy::default(),
            max_control_depth: default_max_control_depth(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_lifetime_optimize(mut self, enabled: bool) -> Self {
        self.enable_lifetime_optimize = enabled;
        self
    }

    pub fn with_max_control_depth(mut self, depth: usize) -> Self {
        self.max_control_depth = depth;
        self
    }
}

/// A plan file as read from TOML, before validation.
///
/// ```toml
/// root = "project"
///
/// [node.start]
/// kind = "start"
///
/// [node.scan]
/// kind = "operator"
/// deps = ["start"]
/// value = 42
///
/// [node.project]
/// kind = "operator"
/// deps = ["scan"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Name of the node whose completion completes the query.
    pub root: String,

    /// All nodes from `[node.<name>]`.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// A validated plan file. Construct through `PlanFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub scheduler: SchedulerConfig,
    pub root: String,
    pub node: BTreeMap<String, NodeConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerConfig,
        root: String,
        node: BTreeMap<String, NodeConfig>,
    ) -> Self {
        Self {
            scheduler,
            root,
            node,
        }
    }
}

/// `kind = "..."` of a `[node.<name>]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKindConfig {
    Start,
    Argument,
    Operator,
    Join,
    Select,
    Loop,
}

/// `[node.<name>]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub kind: NodeKindConfig,

    /// Structural dependencies (node names). Joins need exactly two.
    #[serde(default)]
    pub deps: Vec<String>,

    /// Operator name; defaults to the node's table name.
    #[serde(default)]
    pub name: Option<String>,

    /// Variable read by an `argument` node.
    #[serde(default)]
    pub var: Option<String>,

    /// Explicit output variable (shared by reconverging writers).
    #[serde(default)]
    pub output: Option<String>,

    /// `select`: sub-plan root run when the condition is true.
    #[serde(default, rename = "then")]
    pub then_branch: Option<String>,

    /// `select`: sub-plan root run when the condition is false.
    #[serde(default, rename = "else")]
    pub else_branch: Option<String>,

    /// `loop`: sub-plan root run once per iteration.
    #[serde(default)]
    pub body: Option<String>,

    /// Value the operator writes to its output variable.
    #[serde(default)]
    pub value: Option<Value>,

    /// Fail the operator with this message.
    #[serde(default)]
    pub fail: Option<String>,

    /// Panic inside the operator with this message.
    #[serde(default)]
    pub panic: Option<String>,

    /// Sleep before completing.
    #[serde(default)]
    pub delay_ms: Option<u64>,

    /// `select`: value written as the condition (should be a bool).
    #[serde(default)]
    pub condition: Option<Value>,

    /// `loop`: number of iterations before the condition turns false.
    #[serde(default)]
    pub iterations: Option<u64>,
}
