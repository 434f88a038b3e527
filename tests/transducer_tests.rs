// ABOUTME: Transducer laws exercised over pipeline-produced trees

use pretty_assertions::assert_eq;
use treep::element::{Element, Kind};
use treep::expand_source;
use treep::transducer::dsl::*;
use treep::transducer::{Pattern, Transducer};

fn expanded_program(source: &str) -> Vec<Element> {
    expand_source(source).unwrap()
}

#[test]
fn test_identity_default_over_real_programs() {
    // An empty rule set leaves every pipeline-produced tree untouched
    let source = r#"
        def factorial(n) {
            if (n <= 1) { return 1 }
            else { return n * factorial(n - 1) }
        }
        let x = 1
        when(x > 0) { println(factorial(5)) }
    "#;
    let transducer = Transducer::new(vec![]);
    for tree in expanded_program(source) {
        assert_eq!(transducer.transform(&tree).unwrap(), tree);
    }
}

#[test]
fn test_rename_def_rule_over_parsed_input() {
    // E5: def(add, [param(x), param(y)]) -> function(add, [argument(x), argument(y)])
    let rules = vec![
        rule(
            match_kind("def")
                .capture_name("fname")
                .capture_children("kids")
                .build(),
        )
        .template(
            generate_node("function")
                .name(var_ref("fname"))
                .child(generate_var("kids"))
                .build(),
        ),
        rule(match_kind("param").capture_name("pname").build())
            .template(generate_node("argument").name(var_ref("pname")).build()),
    ];
    let transducer = Transducer::new(rules);

    let program = expanded_program("def add(x, y) { return x + y }");
    let out = transducer.transform(&program[0]).unwrap();

    assert_eq!(out.kind, Kind::from("function"));
    assert_eq!(out.name.as_deref(), Some("add"));
    assert_eq!(out.children[0].kind, Kind::from("argument"));
    assert_eq!(out.children[0].name.as_deref(), Some("x"));
    assert_eq!(out.children[1].kind, Kind::from("argument"));
    assert_eq!(out.children[1].name.as_deref(), Some("y"));
    // The body block is spliced through unchanged
    assert_eq!(out.children[2].kind, Kind::Block);
}

fn arithmetic_identities() -> Transducer {
    Transducer::new(vec![
        match_binary_op("+")
            .when(is_int_literal("right", 0))
            .template(generate_var("left")),
        match_binary_op("+")
            .when(is_int_literal("left", 0))
            .template(generate_var("right")),
        match_binary_op("*")
            .when(is_int_literal("right", 1))
            .template(generate_var("left")),
        match_binary_op("*")
            .when(is_int_literal("left", 1))
            .template(generate_var("right")),
        match_binary_op("*")
            .when(is_int_literal("right", 0))
            .template(make_literal("Int", text("0"))),
        match_binary_op("*")
            .when(is_int_literal("left", 0))
            .template(make_literal("Int", text("0"))),
    ])
}

#[test]
fn test_e6_arithmetic_identity_fixpoint_from_source() {
    // ((x + 0) * 1) + 0 simplifies to x
    let program = expanded_program("let x = 1 ((x + 0) * 1) + 0");
    let (result, used) = arithmetic_identities()
        .fixpoint(&program[1], 10)
        .unwrap();
    assert_eq!(result, Element::var("x"));
    assert!(used <= 3, "took {} iterations", used);
}

#[test]
fn test_simplification_inside_larger_tree() {
    // The rewrite reaches expressions nested in statements
    let program = expanded_program("def f(x) { return x * 1 + 0 }");
    let (result, _) = arithmetic_identities()
        .fixpoint_default(&program[0])
        .unwrap();

    let body = &result.children[1];
    let ret = &body.children[0];
    assert_eq!(ret.children[0], Element::var("x"));
}

#[test]
fn test_rule_order_decides_between_overlapping_rules() {
    // Both rules match x * 0; declaration order picks the winner
    let simplify = || {
        match_binary_op("*")
            .when(is_int_literal("right", 0))
            .template(generate_var("left"))
    };
    let annihilate = || {
        match_binary_op("*")
            .when(is_int_literal("right", 0))
            .template(make_literal("Int", text("0")))
    };

    let tree = Element::call("*", vec![Element::var("x"), Element::int_literal(0)]);

    let simplify_wins = Transducer::new(vec![simplify(), annihilate()]);
    assert_eq!(simplify_wins.transform(&tree).unwrap(), Element::var("x"));

    let annihilate_wins = Transducer::new(vec![annihilate(), simplify()]);
    assert_eq!(
        annihilate_wins.transform(&tree).unwrap(),
        Element::int_literal(0)
    );
}

#[test]
fn test_rest_capture_binds_exact_tail() {
    // Rotate a call's first argument to the end: f(a, b, c) -> f(b, c, a)
    let rotate = Transducer::new(vec![rule(
        match_kind("call")
            .capture_name("f")
            .children(vec![capture("first"), rest("others")])
            .build(),
    )
    .template(
        generate_node("call")
            .name(var_ref("f"))
            .child(generate_var("others"))
            .child(generate_var("first"))
            .build(),
    )]);

    let tree = Element::call(
        "f",
        vec![Element::var("a"), Element::var("b"), Element::var("c")],
    );
    // Children of the output are themselves rewritten, so use vars only
    let out = rotate.transform(&tree).unwrap();
    assert_eq!(out.name.as_deref(), Some("f"));
    let names: Vec<_> = out
        .children
        .iter()
        .map(|c| c.name.as_deref().unwrap())
        .collect();
    assert_eq!(names, vec!["b", "c", "a"]);
}

#[test]
fn test_without_rest_capture_arity_must_match() {
    let two_only = Transducer::new(vec![rule(
        match_kind("call")
            .children(vec![Pattern::Any, Pattern::Any])
            .build(),
    )
    .template(generate_node("pair").build())]);

    let two = Element::call("f", vec![Element::var("a"), Element::var("b")]);
    let three = Element::call(
        "f",
        vec![Element::var("a"), Element::var("b"), Element::var("c")],
    );

    assert_eq!(
        two_only.transform(&two).unwrap().kind,
        Kind::from("pair")
    );
    // Arity mismatch: the rule does not fire, identity applies
    assert_eq!(two_only.transform(&three).unwrap(), three);
}
