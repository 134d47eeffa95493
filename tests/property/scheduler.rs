use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use plansched::config::SchedulerConfig;
use plansched::errors::{ExecError, Status};
use plansched::ops::{OpSpec, ScriptedOperators};
use plansched::plan::{ExecutionPlan, PlanBuilder};
use plansched::scheduler;
use plansched::types::{NodeId, SchedulingStrategy, Value};
use plansched_test_utils::query;
use plansched_test_utils::recording::RecordingOperators;

/// A random control-flow-free plan plus the structural edges used to build it.
#[derive(Debug, Clone)]
struct RandomDag {
    /// `deps[i]` are indexes `< i`; index 0 is `Start`.
    deps: Vec<BTreeSet<usize>>,
}

impl RandomDag {
    fn build(&self) -> (ExecutionPlan, Vec<NodeId>) {
        let mut b = PlanBuilder::new();
        let mut ids: Vec<NodeId> = vec![b.start()];
        for (i, deps) in self.deps.iter().enumerate().skip(1) {
            let dep_ids: Vec<NodeId> = deps.iter().map(|d| ids[*d]).collect();
            ids.push(b.operator(&format!("Op{i}"), &dep_ids));
        }

        // Hang every sink below one root so the whole DAG is reachable.
        let sinks: Vec<NodeId> = (0..ids.len())
            .filter(|i| !self.deps.iter().any(|deps| deps.contains(i)))
            .map(|i| ids[i])
            .collect();
        let root = b.operator("Root", &sinks);
        ids.push(root);

        (b.build(root).expect("random DAG is valid"), ids)
    }

    /// Structural edges `(dep, node)` as node ids.
    fn edges(&self, ids: &[NodeId]) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::new();
        for (i, deps) in self.deps.iter().enumerate() {
            for d in deps {
                edges.push((ids[*d], ids[i]));
            }
        }
        let root = ids[ids.len() - 1];
        for i in 0..self.deps.len() {
            if !self.deps.iter().any(|deps| deps.contains(&i)) {
                edges.push((ids[i], root));
            }
        }
        edges
    }
}

// Acyclic by construction: node N may only depend on nodes 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = RandomDag> {
    (2..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..3),
            num_nodes,
        )
        .prop_map(move |raw| {
            let deps = raw
                .into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        picks.into_iter().map(|p| p % i).collect()
                    }
                })
                .collect();
            RandomDag { deps }
        })
    })
}

struct Outcome {
    status: Status,
    ops: RecordingOperators,
    values: std::collections::BTreeMap<String, Vec<Value>>,
}

fn run(plan: ExecutionPlan, operators: ScriptedOperators, strategy: SchedulingStrategy) -> Outcome {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("test runtime");

    runtime.block_on(async move {
        let ops = RecordingOperators::new(operators);
        let qctx = query(
            Arc::new(plan),
            Arc::new(ops.clone()),
            SchedulerConfig::default().with_strategy(strategy),
        );
        let status = plansched_test_utils::with_timeout(scheduler::execute(Arc::clone(&qctx))).await;
        Outcome {
            status,
            ops,
            values: qctx.ectx().snapshot(),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_dependency_finishes_before_its_dependent_dispatches(
        dag in dag_strategy(8),
        use_push in any::<bool>(),
    ) {
        let strategy = if use_push { SchedulingStrategy::Push } else { SchedulingStrategy::Notify };
        let (plan, ids) = dag.build();
        let outcome = run(plan, ScriptedOperators::new(), strategy);

        prop_assert!(outcome.status.is_ok());
        for id in ids.iter() {
            prop_assert_eq!(outcome.ops.dispatch_count(*id), 1);
        }
        for (dep, node) in dag.edges(&ids) {
            let finished = outcome.ops.finishes(dep)[0];
            let dispatched = outcome.ops.dispatches(node)[0];
            prop_assert!(finished < dispatched, "{} dispatched before {} finished", node, dep);
        }
    }

    #[test]
    fn notify_and_push_agree(
        dag in dag_strategy(8),
        failing in proptest::option::of(any::<usize>()),
    ) {
        let (plan, ids) = dag.build();
        let mut operators = ScriptedOperators::new();
        for (i, id) in ids.iter().enumerate() {
            operators.insert(*id, OpSpec::new().value(i as i64));
        }
        // At most one failure keeps "first failure" deterministic.
        let failing = failing.map(|f| ids[f % ids.len()]);
        if let Some(id) = failing {
            operators.insert(id, OpSpec::new().fail("injected"));
        }

        let notify = run(plan, operators.clone(), SchedulingStrategy::Notify);
        let (plan, _) = dag.build();
        let push = run(plan, operators, SchedulingStrategy::Push);

        prop_assert_eq!(&notify.status, &push.status);
        match failing {
            Some(_) => prop_assert_eq!(notify.status, Err(ExecError::failed("injected"))),
            None => prop_assert_eq!(notify.values, push.values),
        }
    }
}
