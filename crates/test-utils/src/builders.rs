#![allow(dead_code)]

//! Plan fixtures shared by the test suites.

use plansched::plan::{ExecutionPlan, PlanBuilder};
use plansched::types::NodeId;

/// `Start -> A`, `Start -> B`, `A,B -> C` with `C` as root.
pub struct Diamond {
    pub plan: ExecutionPlan,
    pub start: NodeId,
    pub a: NodeId,
    pub b: NodeId,
    pub c: NodeId,
}

pub fn diamond() -> Diamond {
    let mut b = PlanBuilder::new();
    let start = b.start();
    let left = b.operator("A", &[start]);
    let right = b.operator("B", &[start]);
    let c = b.join("C", left, right);
    let plan = b.build(c).expect("diamond plan is valid");
    Diamond {
        plan,
        start,
        a: left,
        b: right,
        c,
    }
}

/// `Start -> Op1 -> ... -> OpN`; returns the plan and the ids in chain order
/// (start first).
pub fn chain(n: usize) -> (ExecutionPlan, Vec<NodeId>) {
    let mut b = PlanBuilder::new();
    let mut ids = vec![b.start()];
    for i in 0..n {
        let prev = *ids.last().expect("chain is never empty");
        ids.push(b.operator(&format!("Op{i}"), &[prev]));
    }
    let root = *ids.last().expect("chain is never empty");
    let plan = b.build(root).expect("chain plan is valid");
    (plan, ids)
}

/// If/else whose branches both write `v`, read back by an `Argument`.
///
/// ```text
/// Start -> Select(then: Then, else: Else)
/// Argument(v)
/// Final = Join(Argument, Select)      (root)
/// ```
pub struct SelectFixture {
    pub plan: ExecutionPlan,
    pub start: NodeId,
    pub select: NodeId,
    pub then_op: NodeId,
    pub else_op: NodeId,
    pub argument: NodeId,
    pub root: NodeId,
}

pub fn select_reconverging() -> SelectFixture {
    let mut b = PlanBuilder::new();
    let then_op = b.operator("Then", &[]);
    let else_op = b.operator("Else", &[]);
    b.set_output_var(then_op, "v");
    b.set_output_var(else_op, "v");

    let start = b.start();
    let select = b.select(&[start], then_op, else_op);
    let argument = b.argument("v");
    let root = b.join("Final", argument, select);

    let plan = b.build(root).expect("select plan is valid");
    SelectFixture {
        plan,
        start,
        select,
        then_op,
        else_op,
        argument,
        root,
    }
}

/// Loop carrying `x` from one iteration to the next.
///
/// ```text
/// Start -> Init(x) -> Loop(body: Inc) -> Project   (root)
/// body:   Argument(x) -> Inc(x)
/// ```
pub struct LoopFixture {
    pub plan: ExecutionPlan,
    pub start: NodeId,
    pub init: NodeId,
    pub loop_node: NodeId,
    pub argument: NodeId,
    pub body: NodeId,
    pub root: NodeId,
}

pub fn counting_loop() -> LoopFixture {
    let mut b = PlanBuilder::new();
    let argument = b.argument("x");
    let body = b.operator("Inc", &[argument]);

    let start = b.start();
    let init = b.operator("Init", &[start]);
    let loop_node = b.loop_node(&[init], body);
    let root = b.operator("Project", &[loop_node]);

    b.set_output_var(init, "x");
    b.set_output_var(body, "x");

    let plan = b.build(root).expect("loop plan is valid");
    LoopFixture {
        plan,
        start,
        init,
        loop_node,
        argument,
        body,
        root,
    }
}

/// `Select` nested in the `then` branch of another `Select`.
pub struct NestedSelect {
    pub plan: ExecutionPlan,
    pub outer: NodeId,
    pub inner: NodeId,
    pub leaf: NodeId,
}

pub fn nested_select() -> NestedSelect {
    let mut b = PlanBuilder::new();
    let leaf = b.operator("Leaf", &[]);
    let inner_else = b.operator("InnerElse", &[]);
    let inner = b.select(&[], leaf, inner_else);
    let outer_else = b.operator("OuterElse", &[]);
    let start = b.start();
    let outer = b.select(&[start], inner, outer_else);
    let plan = b.build(outer).expect("nested select plan is valid");
    NestedSelect {
        plan,
        outer,
        inner,
        leaf,
    }
}

/// `Loop` whose body runs another `Loop`.
pub struct NestedLoop {
    pub plan: ExecutionPlan,
    pub outer: NodeId,
    pub outer_step: NodeId,
    pub inner: NodeId,
    pub inner_body: NodeId,
}

pub fn loop_in_loop() -> NestedLoop {
    let mut b = PlanBuilder::new();
    let inner_body = b.operator("InnerBody", &[]);
    let inner = b.loop_node(&[], inner_body);
    let outer_step = b.operator("OuterStep", &[inner]);

    let start = b.start();
    let outer = b.loop_node(&[start], outer_step);
    let root = b.operator("Project", &[outer]);

    let plan = b.build(root).expect("nested loop plan is valid");
    NestedLoop {
        plan,
        outer,
        outer_step,
        inner,
        inner_body,
    }
}

/// `Loop` whose body branches; the `then` branch carries `x` through an
/// `Argument` two scopes below its initial writer.
pub struct SelectInLoop {
    pub plan: ExecutionPlan,
    pub init: NodeId,
    pub loop_node: NodeId,
    pub select: NodeId,
    pub argument: NodeId,
    pub inc: NodeId,
    pub skip: NodeId,
    pub after: NodeId,
}

pub fn select_in_loop() -> SelectInLoop {
    let mut b = PlanBuilder::new();
    let argument = b.argument("x");
    let inc = b.operator("Inc", &[argument]);
    let skip = b.operator("Skip", &[]);
    let select = b.select(&[], inc, skip);
    let after = b.operator("After", &[select]);

    let start = b.start();
    let init = b.operator("Init", &[start]);
    let loop_node = b.loop_node(&[init], after);
    let root = b.operator("Project", &[loop_node]);

    b.set_output_var(init, "x");
    b.set_output_var(inc, "x");

    let plan = b.build(root).expect("select-in-loop plan is valid");
    SelectInLoop {
        plan,
        init,
        loop_node,
        select,
        argument,
        inc,
        skip,
        after,
    }
}
