use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier of a plan node, unique within one [`ExecutionPlan`].
///
/// [`ExecutionPlan`]: crate::plan::ExecutionPlan
pub type NodeId = i64;

/// Which scheduling algorithm runs a query.
///
/// - `Auto`: pick push-based scheduling when the plan is free of control
///   flow, notify-based otherwise (default behaviour).
/// - `Notify`: always use the general promise/notify scheduler.
/// - `Push`: use push-based scheduling; plans with `Select`/`Loop` still fall
///   back to notify-based scheduling because push cannot express them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingStrategy {
    #[default]
    Auto,
    Notify,
    Push,
}

impl FromStr for SchedulingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(SchedulingStrategy::Auto),
            "notify" => Ok(SchedulingStrategy::Notify),
            "push" => Ok(SchedulingStrategy::Push),
            other => Err(format!(
                "invalid strategy: {other} (expected \"auto\", \"notify\" or \"push\")"
            )),
        }
    }
}

/// Runtime value stored in the execution context.
///
/// Operators are free to store anything here; the scheduler itself only ever
/// inspects `Bool` (the result of a `Select`/`Loop` condition).
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    #[default]
    Null,
}

impl Value {
    /// Name of the value's type, as shown in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Int(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Str(_) => "STRING",
            Value::List(_) => "LIST",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "__NULL__"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
