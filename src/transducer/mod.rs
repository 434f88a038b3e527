// ABOUTME: Declarative tree transducer - ordered pattern/condition/template
// rules applied top-down with recursive descent into untouched subtrees

pub mod dsl;
pub mod pattern;
pub mod template;

pub use pattern::{AttrPattern, Binding, Bindings, KindPattern, Pattern};
pub use template::{Expr, Generated, NodeTemplate, Template};

use crate::config::FIXPOINT_CAP;
use crate::element::Element;
use crate::error::TransducerError;

/// A single rewrite rule. The condition runs after a successful structural
/// match and may install derived bindings for the template to reference.
pub struct Rule {
    pub(crate) pattern: Pattern,
    pub(crate) condition: Option<Box<dyn Fn(&mut Bindings) -> bool>>,
    pub(crate) template: Template,
}

impl Rule {
    pub fn new(pattern: Pattern, template: Template) -> Self {
        Rule {
            pattern,
            condition: None,
            template,
        }
    }
}

/// An ordered rule list. Rules are fixed at construction; `transform` is
/// read-only and reusable.
pub struct Transducer {
    rules: Vec<Rule>,
}

impl Transducer {
    pub fn new(rules: Vec<Rule>) -> Self {
        Transducer { rules }
    }

    /// Rewrite one node. Rules are tried in declaration order; the first
    /// whose pattern matches and whose condition holds is applied, and the
    /// children of its output are transformed recursively. With no matching
    /// rule the node is returned with its children transformed (identity by
    /// default).
    pub fn transform(&self, node: &Element) -> Result<Element, TransducerError> {
        for rule in &self.rules {
            let mut bindings = Bindings::new();
            if !rule.pattern.matches(node, &mut bindings) {
                continue;
            }
            if let Some(condition) = &rule.condition {
                if !condition(&mut bindings) {
                    continue;
                }
            }
            let mut out = rule.template.generate_one(&bindings)?;
            out.children = out
                .children
                .iter()
                .map(|child| self.transform(child))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(out);
        }

        let mut out = node.clone();
        out.children = node
            .children
            .iter()
            .map(|child| self.transform(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(out)
    }

    /// Apply `transform` repeatedly until the tree stops changing or the cap
    /// is reached. Returns the final tree and the number of applications.
    pub fn fixpoint(
        &self,
        node: &Element,
        cap: usize,
    ) -> Result<(Element, usize), TransducerError> {
        let mut current = node.clone();
        for used in 1..=cap {
            let next = self.transform(&current)?;
            if next == current {
                return Ok((next, used));
            }
            current = next;
        }
        Ok((current, cap))
    }

    /// `fixpoint` with the default iteration cap.
    pub fn fixpoint_default(&self, node: &Element) -> Result<(Element, usize), TransducerError> {
        self.fixpoint(node, FIXPOINT_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::dsl::*;
    use super::*;
    use crate::element::Kind;
    use pretty_assertions::assert_eq;

    fn sample_tree() -> Element {
        Element::new(Kind::Def)
            .with_name("add")
            .with_attr("x", "Int")
            .with_child(Element::param("x").with_attr("type", "Int"))
            .with_child(Element::param("y"))
            .with_child(Element::block(vec![Element::call(
                "+",
                vec![Element::var("x"), Element::var("y")],
            )]))
    }

    #[test]
    fn test_empty_rule_set_is_identity() {
        let transducer = Transducer::new(vec![]);
        let tree = sample_tree();
        assert_eq!(transducer.transform(&tree).unwrap(), tree);
    }

    #[test]
    fn test_rule_order_gives_priority() {
        let first = || {
            rule(match_kind("var").build()).template(generate_node("first").build())
        };
        let second = || {
            rule(match_kind("var").build()).template(generate_node("second").build())
        };

        let node = Element::var("x");
        let out = Transducer::new(vec![first(), second()])
            .transform(&node)
            .unwrap();
        assert_eq!(out.kind, Kind::from("first"));

        let out = Transducer::new(vec![second(), first()])
            .transform(&node)
            .unwrap();
        assert_eq!(out.kind, Kind::from("second"));
    }

    #[test]
    fn test_failed_condition_falls_through_with_fresh_bindings() {
        // The first rule binds `$x` but its condition always fails; the
        // second rule must not see that binding.
        let rules = vec![
            rule(Pattern::Var("x".to_string()))
                .when(|_| false)
                .template(generate_var("x")),
            rule(match_kind("var").build()).template(generate_var("x")),
        ];
        let result = Transducer::new(rules).transform(&Element::var("a"));
        assert!(matches!(
            result,
            Err(TransducerError::UnboundTemplateVar(ref v)) if v == "x"
        ));
    }

    #[test]
    fn test_rename_def_and_params() {
        // def(add, [param(x), param(y)]) -> function(add, [argument(x), argument(y)])
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
            rule(match_kind("param").capture_name("pname").build()).template(
                generate_node("argument").name(var_ref("pname")).build(),
            ),
        ];
        let transducer = Transducer::new(rules);

        let input = Element::new(Kind::Def)
            .with_name("add")
            .with_child(Element::param("x"))
            .with_child(Element::param("y"));
        let expected = Element::new(Kind::from("function"))
            .with_name("add")
            .with_child(Element::new(Kind::from("argument")).with_name("x"))
            .with_child(Element::new(Kind::from("argument")).with_name("y"));

        assert_eq!(transducer.transform(&input).unwrap(), expected);
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
    fn test_arithmetic_identity_fixpoint() {
        // ((x + 0) * 1) + 0 converges to x in at most 3 applications
        let tree = Element::call(
            "+",
            vec![
                Element::call(
                    "*",
                    vec![
                        Element::call(
                            "+",
                            vec![Element::var("x"), Element::int_literal(0)],
                        ),
                        Element::int_literal(1),
                    ],
                ),
                Element::int_literal(0),
            ],
        );

        let (result, used) = arithmetic_identities().fixpoint(&tree, 10).unwrap();
        assert_eq!(result, Element::var("x"));
        assert!(used <= 3, "expected convergence in <= 3, took {}", used);
    }

    #[test]
    fn test_multiply_by_zero_annihilates() {
        let tree = Element::call(
            "*",
            vec![
                Element::int_literal(0),
                Element::call("+", vec![Element::var("x"), Element::var("y")]),
            ],
        );
        let (result, _) = arithmetic_identities().fixpoint_default(&tree).unwrap();
        assert_eq!(result, Element::int_literal(0));
    }

    #[test]
    fn test_condition_installs_folded_binding() {
        // Constant folding: the condition computes the sum and stashes it
        // for the template.
        let fold = match_binary_op("+")
            .when(|bindings| {
                match (bound_int(bindings, "left"), bound_int(bindings, "right")) {
                    (Some(l), Some(r)) => {
                        bind_str(bindings, "folded", (l + r).to_string());
                        true
                    }
                    _ => false,
                }
            })
            .template(make_literal("Int", var_ref("folded")));
        let transducer = Transducer::new(vec![fold]);

        // (1 + 2) + (3 + 4) needs two passes: inner sums, then the outer
        let tree = Element::call(
            "+",
            vec![
                Element::call(
                    "+",
                    vec![Element::int_literal(1), Element::int_literal(2)],
                ),
                Element::call(
                    "+",
                    vec![Element::int_literal(3), Element::int_literal(4)],
                ),
            ],
        );
        let (result, _) = transducer.fixpoint_default(&tree).unwrap();
        assert_eq!(result, Element::int_literal(10));
    }

    #[test]
    fn test_pipeline_of_transducers() {
        let to_function = Transducer::new(vec![rule(
            match_kind("def")
                .capture_name("n")
                .capture_children("kids")
                .build(),
        )
        .template(
            generate_node("function")
                .name(var_ref("n"))
                .child(generate_var("kids"))
                .build(),
        )]);
        let to_fn = Transducer::new(vec![rule(
            match_kind("function")
                .capture_name("n")
                .capture_children("kids")
                .build(),
        )
        .template(
            generate_node("fn")
                .name(var_ref("n"))
                .child(generate_var("kids"))
                .build(),
        )]);

        let input = Element::new(Kind::Def).with_name("f");
        let mid = to_function.transform(&input).unwrap();
        let out = to_fn.transform(&mid).unwrap();
        assert_eq!(out.kind, Kind::from("fn"));
        assert_eq!(out.name.as_deref(), Some("f"));
    }

    #[test]
    fn test_rewrite_descends_into_untouched_subtrees() {
        // Rule only rewrites vars, nested deep inside unrelated structure
        let rules = vec![rule(match_kind("var").capture_name("n").build())
            .template(generate_node("ident").name(var_ref("n")).build())];
        let tree = sample_tree();
        let out = Transducer::new(rules).transform(&tree).unwrap();

        let body = &out.children[2].children[0];
        assert_eq!(body.children[0].kind, Kind::from("ident"));
        assert_eq!(body.children[1].kind, Kind::from("ident"));
        // Everything else is untouched
        assert_eq!(out.kind, Kind::Def);
        assert_eq!(out.attr("x"), Some("Int"));
    }

    #[test]
    fn test_fixpoint_respects_cap() {
        // a -> b, b -> a: never converges, cap bounds the loop
        let rules = vec![
            rule(match_kind("a").build()).template(generate_node("b").build()),
            rule(match_kind("b").build()).template(generate_node("a").build()),
        ];
        let transducer = Transducer::new(rules);
        let (_, used) = transducer
            .fixpoint(&Element::new(Kind::from("a")), 7)
            .unwrap();
        assert_eq!(used, 7);
    }
}
