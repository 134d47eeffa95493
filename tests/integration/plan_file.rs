// tests/integration/plan_file.rs

use std::io::Write;

use tempfile::NamedTempFile;

use plansched::config::{load_and_validate, load_from_path};
use plansched::errors::SchedError;
use plansched::types::SchedulingStrategy;

fn plan_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_scheduler_section_defaults() {
    let file = plan_file(
        r#"
root = "start"

[node.start]
kind = "start"
"#,
    );

    let plan = load_and_validate(file.path()).unwrap();
    assert_eq!(plan.scheduler.strategy, SchedulingStrategy::Auto);
    assert!(plan.scheduler.enable_lifetime_optimize);
    assert_eq!(plan.scheduler.max_control_depth, 64);
}

#[test]
fn test_scheduler_section_is_parsed() {
    let file = plan_file(
        r#"
root = "start"

[scheduler]
strategy = "push"
enable_lifetime_optimize = false
max_control_depth = 3

[node.start]
kind = "start"
"#,
    );

    let plan = load_and_validate(file.path()).unwrap();
    assert_eq!(plan.scheduler.strategy, SchedulingStrategy::Push);
    assert!(!plan.scheduler.enable_lifetime_optimize);
    assert_eq!(plan.scheduler.max_control_depth, 3);
}

#[test]
fn test_plan_cycle_returns_structured_error() {
    let file = plan_file(
        r#"
root = "b"

[node.a]
kind = "operator"
deps = ["b"]

[node.b]
kind = "operator"
deps = ["a"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(SchedError::PlanCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('a') || msg.contains('b'));
        }
        Err(e) => panic!("Expected PlanCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_cycle_through_loop_body_is_rejected() {
    // The body depends on the loop that owns it.
    let file = plan_file(
        r#"
root = "loop"

[node.start]
kind = "start"

[node.loop]
kind = "loop"
deps = ["start"]
body = "inc"

[node.inc]
kind = "operator"
deps = ["loop"]
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(SchedError::PlanCycle(_))
    ));
}

#[test]
fn test_unknown_dependency_returns_not_found() {
    let file = plan_file(
        r#"
root = "a"

[node.a]
kind = "operator"
deps = ["missing"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(SchedError::NodeNotFound(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("missing"));
        }
        Err(e) => panic!("Expected NodeNotFound error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_root_is_rejected() {
    let file = plan_file(
        r#"
root = "nowhere"

[node.start]
kind = "start"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(SchedError::NodeNotFound(_))
    ));
}

#[test]
fn test_kind_specific_keys_are_required() {
    let cases = [
        (
            r#"
root = "sel"
[node.t]
kind = "operator"
[node.sel]
kind = "select"
then = "t"
"#,
            "requires both `then` and `else`",
        ),
        (
            r#"
root = "arg"
[node.arg]
kind = "argument"
"#,
            "requires `var`",
        ),
        (
            r#"
root = "j"
[node.s]
kind = "start"
[node.j]
kind = "join"
deps = ["s"]
"#,
            "exactly 2 deps",
        ),
        (
            r#"
root = "arg"
[node.arg]
kind = "argument"
var = "nobody_writes_this"
"#,
            "no node declares it as `output`",
        ),
    ];

    for (contents, expected) in cases {
        let file = plan_file(contents);
        match load_and_validate(file.path()) {
            Err(SchedError::ConfigError(msg)) => {
                assert!(msg.contains(expected), "unexpected message: {msg}");
            }
            Err(e) => panic!("Expected ConfigError containing {expected:?}, got: {e:?}"),
            Ok(_) => panic!("Expected error for {expected:?}, got Ok"),
        }
    }
}

#[test]
fn test_invalid_toml_returns_toml_error() {
    let file = plan_file("root = ");
    assert!(matches!(
        load_from_path(file.path()),
        Err(SchedError::TomlError(_))
    ));
}

#[test]
fn test_unknown_strategy_is_a_toml_error() {
    let file = plan_file(
        r#"
root = "start"

[scheduler]
strategy = "eager"

[node.start]
kind = "start"
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(SchedError::TomlError(_))
    ));
}
