pub mod builders;
pub mod recording;

use std::sync::{Arc, Once};

use plansched::config::SchedulerConfig;
use plansched::context::{QueryContext, RunnerHandle};
use plansched::executor::OperatorFactory;
use plansched::plan::ExecutionPlan;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=plansched=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Query context on the current Tokio runtime.
pub fn query(
    plan: Arc<ExecutionPlan>,
    operators: Arc<dyn OperatorFactory>,
    config: SchedulerConfig,
) -> Arc<QueryContext> {
    QueryContext::new(plan, operators, RunnerHandle::current(), config)
}
