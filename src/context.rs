// src/context.rs

//! Per-query execution state.
//!
//! - [`ExecutionContext`] is the variable store shared by every executor of
//!   one query. It keeps every version written to a variable so loop
//!   iterations stay observable.
//! - [`QueryContext`] bundles everything one run needs: the (possibly
//!   cached) plan, the value store, the operator factory, the runner to
//!   dispatch on, the scheduler config, plus the kill switch and profiling
//!   stats.
//! - [`RunnerHandle`] is the explicitly passed thread pool.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::executor::OperatorFactory;
use crate::plan::{ExecutionPlan, PlanNode, Variable};
use crate::types::{NodeId, Value};

/// Versioned variable store.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    values: RwLock<HashMap<String, Vec<Value>>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new version of `name`.
    pub fn set_value(&self, name: &str, value: Value) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.entry(name.to_string()).or_default().push(value);
    }

    /// Latest version of `name`, or `Value::Null` if it was never written.
    pub fn get_value(&self, name: &str) -> Value {
        self.try_get_value(name).unwrap_or_default()
    }

    pub fn try_get_value(&self, name: &str) -> Option<Value> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(name).and_then(|versions| versions.last().cloned())
    }

    /// Every version of `name`, oldest first.
    pub fn history(&self, name: &str) -> Vec<Value> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(name).cloned().unwrap_or_default()
    }

    pub fn num_versions(&self, name: &str) -> usize {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(name).map(Vec::len).unwrap_or(0)
    }

    /// Latest value of `var` as read by `reader`.
    ///
    /// Moved out of the store when the lifetime analysis proved `reader` is
    /// its single consumer and neither of them runs inside a loop. Cloned
    /// otherwise: a loop body reads the same version on every iteration.
    pub fn move_or_copy(&self, var: &Variable, reader: &PlanNode) -> Option<Value> {
        if !var.is_movable() || reader.loop_layers() > 0 {
            return self.try_get_value(&var.name);
        }
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let versions = values.get_mut(&var.name)?;
        let value = versions.pop();
        if versions.is_empty() {
            values.remove(&var.name);
        }
        debug!(var = %var.name, "moved single-consumer value out of the context");
        value
    }

    pub fn drop_result(&self, name: &str) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.remove(name);
    }

    /// Copy of the whole store, ordered by variable name.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Value>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Handle to the thread pool executors are dispatched on.
///
/// Passed in explicitly; there is no process-wide runner.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    handle: Handle,
}

impl RunnerHandle {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Handle of the Tokio runtime the caller is running on.
    ///
    /// Panics when called outside a Tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }
}

/// Timing recorded for one successful executor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilingStats {
    pub node: NodeId,
    pub executor: u64,
    /// Time spent in `execute` only.
    pub exec_duration: Duration,
    /// Time from `open` to the end of `close`.
    pub total_duration: Duration,
}

/// Everything one query run needs.
pub struct QueryContext {
    plan: Arc<ExecutionPlan>,
    ectx: ExecutionContext,
    operators: Arc<dyn OperatorFactory>,
    runner: RunnerHandle,
    config: SchedulerConfig,
    killed: AtomicBool,
    next_executor_id: AtomicU64,
    profile: Mutex<Vec<ProfilingStats>>,
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("plan_root", &self.plan.root())
            .field("config", &self.config)
            .field("killed", &self.is_killed())
            .finish_non_exhaustive()
    }
}

impl QueryContext {
    pub fn new(
        plan: Arc<ExecutionPlan>,
        operators: Arc<dyn OperatorFactory>,
        runner: RunnerHandle,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            plan,
            ectx: ExecutionContext::new(),
            operators,
            runner,
            config,
            killed: AtomicBool::new(false),
            next_executor_id: AtomicU64::new(0),
            profile: Mutex::new(Vec::new()),
        })
    }

    pub fn plan(&self) -> &Arc<ExecutionPlan> {
        &self.plan
    }

    pub fn ectx(&self) -> &ExecutionContext {
        &self.ectx
    }

    pub fn operators(&self) -> &dyn OperatorFactory {
        self.operators.as_ref()
    }

    pub fn runner(&self) -> &RunnerHandle {
        &self.runner
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Stop dispatching: every executor opened from now on fails.
    ///
    /// Executors already running are not interrupted.
    pub fn kill(&self) {
        info!(root = self.plan.root(), "query killed");
        self.killed.store(true, Ordering::Release);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    /// Fresh executor id, unique within this run.
    pub(crate) fn next_executor_id(&self) -> u64 {
        self.next_executor_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn record_profile(&self, stats: ProfilingStats) {
        let mut profile = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        profile.push(stats);
    }

    /// Stats of every executor run that closed successfully, in completion
    /// order.
    pub fn profiling_stats(&self) -> Vec<ProfilingStats> {
        let profile = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        profile.clone()
    }
}
