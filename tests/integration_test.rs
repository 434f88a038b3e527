// ABOUTME: End-to-end scenarios exercising the full pipeline

use pretty_assertions::assert_eq;
use treep::builtins;
use treep::element::{Element, Kind};
use treep::error::TreepError;
use treep::value::Value;
use treep::{expand_source, infer_source, run_source};

fn run_captured(source: &str) -> (Result<Value, TreepError>, String) {
    builtins::capture(|| run_source(source))
}

/// Walk a tree looking for a node satisfying the predicate.
fn find<'a>(el: &'a Element, pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    if pred(el) {
        return Some(el);
    }
    el.children.iter().find_map(|c| find(c, pred))
}

fn scheme_display(source: &str, name: &str) -> String {
    let (_, env) = infer_source(source).unwrap();
    env.get(name).unwrap().to_string()
}

#[test]
fn test_e1_hello_world() {
    let source = r#"def main() returns: Int { println("Hello, TreeP!") return 0 }"#;
    let (result, output) = run_captured(source);
    assert_eq!(output, "Hello, TreeP!\n");
    assert!(matches!(result.unwrap(), Value::Int(0)));
}

#[test]
fn test_e2_typed_arithmetic() {
    let source = r#"
        def add(x, y) { return x + y }
        def main() returns: Int {
            let r = add(10, 20)
            println(r)
            return 0
        }
    "#;
    assert_eq!(scheme_display(source, "add"), "Int -> Int -> Int");

    let (result, output) = run_captured(source);
    assert_eq!(output, "30\n");
    assert!(matches!(result.unwrap(), Value::Int(0)));
}

#[test]
fn test_e3_when_expansion() {
    let source = r#"def main() { let x = 1 when(x > 0) { println("positive") } }"#;

    let program = expand_source(source).unwrap();
    let expected_if = Element::new(Kind::If)
        .with_child(Element::condition(Element::call(
            ">",
            vec![Element::var("x"), Element::literal("Int", "0")],
        )))
        .with_child(Element::block(vec![Element::call(
            "println",
            vec![Element::string_literal("positive")],
        )]));
    let found = program
        .iter()
        .find_map(|el| find(el, &|n| *n == expected_if));
    assert!(found.is_some(), "expanded tree lacks the expected if node");

    let when_left = program
        .iter()
        .find_map(|el| find(el, &|n| {
            n.kind == Kind::Call && n.name.as_deref() == Some("when")
        }));
    assert!(when_left.is_none(), "a when call survived expansion");

    let (result, output) = run_captured(source);
    result.unwrap();
    assert_eq!(output, "positive\n");
}

#[test]
fn test_e4_factorial() {
    let source = r#"
        def factorial(n) {
            if (n <= 1) { return 1 }
            else { return n * factorial(n - 1) }
        }
        def main() returns: Int {
            println(factorial(5))
            return 0
        }
    "#;
    assert_eq!(scheme_display(source, "factorial"), "Int -> Int");

    let (result, output) = run_captured(source);
    assert_eq!(output, "120\n");
    assert!(matches!(result.unwrap(), Value::Int(0)));
}

#[test]
fn test_expander_idempotent_on_source_programs() {
    let source = r#"
        def main() {
            let n = 3
            until(n == 0) { dec(n) }
            when(n == 0) { log("done") }
            debug(trace(n + 1))
        }
    "#;
    let once = expand_source(source).unwrap();
    let registry = treep::macros::MacroRegistry::new();
    let twice: Vec<_> = once
        .iter()
        .map(|el| registry.expand(el).unwrap())
        .collect();
    assert_eq!(once, twice);
}

#[test]
fn test_block_argument_sugar_runs() {
    // f(args) { B } and f(args, () -> { B }) execute identically
    let sugared = r#"
        let total = 0
        ifPositive(5) { total = total + 1 }
        total
    "#;
    let explicit = r#"
        let total = 0
        ifPositive(5, () -> { total = total + 1 })
        total
    "#;
    let (sugared_result, _) = run_captured(sugared);
    let (explicit_result, _) = run_captured(explicit);
    assert!(matches!(sugared_result.unwrap(), Value::Int(1)));
    assert!(matches!(explicit_result.unwrap(), Value::Int(1)));
}

#[test]
fn test_user_macro_via_registration_hook() {
    let source = r#"
        macro twice pattern($x) expand { $x + $x }
        def main() returns: Int {
            println(twice(21))
            return 0
        }
    "#;
    let (result, output) = run_captured(source);
    assert_eq!(output, "42\n");
    assert!(matches!(result.unwrap(), Value::Int(0)));
}

#[test]
fn test_type_error_terminates_before_execution() {
    let source = r#"
        def main() {
            println("never printed")
            let bad = 1 && true
        }
    "#;
    let (result, output) = run_captured(source);
    assert!(matches!(result, Err(TreepError::Type(_))));
    assert_eq!(output, "");
}

#[test]
fn test_runtime_error_carries_message() {
    let source = r#"def main() { error("explicit failure") }"#;
    let (result, _) = run_captured(source);
    match result {
        Err(TreepError::Runtime(e)) => assert_eq!(e.to_string(), "explicit failure"),
        other => panic!("Expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_lex_error_reaches_caller() {
    assert!(matches!(
        run_source("let __x = 1"),
        Err(TreepError::Lex(_))
    ));
}

#[test]
fn test_et_json_round_trip_via_pipeline() {
    let source = r#"def add(x: Int, y: Int) returns: Int { return x + y }"#;
    let program = expand_source(source).unwrap();
    let json = serde_json::to_string(&program).unwrap();
    let back: Vec<Element> = serde_json::from_str(&json).unwrap();
    assert_eq!(program, back);
}

#[test]
fn test_assert_macro_end_to_end() {
    let ok = r#"def main() { assert(2 > 1) println("after") }"#;
    let (result, output) = run_captured(ok);
    result.unwrap();
    assert_eq!(output, "after\n");

    let failing = r#"def main() { let x = 0 assert(x > 0) }"#;
    let (result, _) = run_captured(failing);
    match result {
        Err(TreepError::Runtime(e)) => assert_eq!(e.to_string(), "Assertion failed"),
        other => panic!("Expected assertion failure, got {:?}", other),
    }
}

#[test]
fn test_debug_and_log_output_prefixes() {
    let source = r#"
        def main() {
            debug(6 * 7)
            log("starting")
        }
    "#;
    let (result, output) = run_captured(source);
    result.unwrap();
    assert_eq!(output, "Debug: 42\n[LOG] starting\n");
}

#[test]
fn test_counting_loop_program() {
    let source = r#"
        def sumTo(n: Int) returns: Int {
            let total = 0
            for (i = 1, n) {
                total = total + i
            }
            return total
        }
        def main() returns: Int {
            println(sumTo(10))
            return 0
        }
    "#;
    assert_eq!(scheme_display(source, "sumTo"), "Int -> Int");
    let (result, output) = run_captured(source);
    assert_eq!(output, "55\n");
    assert!(matches!(result.unwrap(), Value::Int(0)));
}
