use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use plansched::context::QueryContext;
use plansched::errors::{ExecError, Status};
use plansched::executor::{Operator, OperatorFactory};
use plansched::plan::PlanNode;
use plansched::types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Dispatched,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub node: NodeId,
    pub kind: EventKind,
    /// Global sequence number, strictly increasing across all events.
    pub seq: u64,
}

#[derive(Debug, Default)]
struct Log {
    seq: AtomicU64,
    events: Mutex<Vec<Event>>,
}

impl Log {
    fn record(&self, node: NodeId, kind: EventKind) {
        let mut events = self.events.lock().unwrap();
        // Taken under the lock so `seq` order matches vector order.
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        events.push(Event { node, kind, seq });
    }
}

/// Decorates another factory and records when each operator's `execute`
/// starts and ends.
#[derive(Clone)]
pub struct RecordingOperators {
    inner: Arc<dyn OperatorFactory>,
    log: Arc<Log>,
}

impl RecordingOperators {
    pub fn new(inner: impl OperatorFactory + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            log: Arc::new(Log::default()),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.events.lock().unwrap().clone()
    }

    fn seqs(&self, node: NodeId, kind: EventKind) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter(|e| e.node == node && e.kind == kind)
            .map(|e| e.seq)
            .collect()
    }

    pub fn dispatches(&self, node: NodeId) -> Vec<u64> {
        self.seqs(node, EventKind::Dispatched)
    }

    pub fn finishes(&self, node: NodeId) -> Vec<u64> {
        self.seqs(node, EventKind::Finished)
    }

    pub fn dispatch_count(&self, node: NodeId) -> usize {
        self.dispatches(node).len()
    }

    pub fn ran(&self, node: NodeId) -> bool {
        self.dispatch_count(node) > 0
    }

    /// Nodes in the order their executions started.
    pub fn dispatch_order(&self) -> Vec<NodeId> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == EventKind::Dispatched)
            .map(|e| e.node)
            .collect()
    }
}

impl OperatorFactory for RecordingOperators {
    fn create(&self, node: &PlanNode) -> Result<Arc<dyn Operator>, ExecError> {
        let inner = self.inner.create(node)?;
        Ok(Arc::new(RecordingOperator {
            inner,
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingOperator {
    inner: Arc<dyn Operator>,
    log: Arc<Log>,
}

impl Operator for RecordingOperator {
    fn open(&self, ctx: &QueryContext, node: &PlanNode) -> Status {
        self.inner.open(ctx, node)
    }

    fn execute<'a>(&'a self, ctx: &'a QueryContext, node: &'a PlanNode) -> BoxFuture<'a, Status> {
        async move {
            self.log.record(node.id(), EventKind::Dispatched);
            let status = self.inner.execute(ctx, node).await;
            let kind = if status.is_ok() {
                EventKind::Finished
            } else {
                EventKind::Failed
            };
            self.log.record(node.id(), kind);
            status
        }
        .boxed()
    }

    fn close(&self, ctx: &QueryContext, node: &PlanNode) -> Status {
        self.inner.close(ctx, node)
    }
}
