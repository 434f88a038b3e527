// ABOUTME: Builder helpers for writing transducer rules concisely

use crate::element::{Element, Kind};
use crate::transducer::pattern::{AttrPattern, Binding, Bindings, KindPattern, Pattern};
use crate::transducer::template::{Expr, NodeTemplate, Template};
use crate::transducer::Rule;

// ============================================================================
// Pattern builders
// ============================================================================

pub struct KindPatternBuilder {
    inner: KindPattern,
}

/// `match_kind("def")` - match on a node kind, refined by the chained calls.
pub fn match_kind(kind: &str) -> KindPatternBuilder {
    KindPatternBuilder {
        inner: KindPattern::new(Kind::from(kind)),
    }
}

impl KindPatternBuilder {
    /// Require a `name` and bind it as a string under `var`.
    pub fn capture_name(mut self, var: &str) -> Self {
        self.inner.name_var = Some(var.to_string());
        self
    }

    /// Bind the full child list under `var` (a trailing rest capture).
    pub fn capture_children(mut self, var: &str) -> Self {
        self.inner.children = Some(vec![Pattern::List {
            prefix: vec![],
            rest: var.to_string(),
        }]);
        self
    }

    /// Require attribute `key` to equal `value` exactly.
    pub fn attr_equals(mut self, key: &str, value: &str) -> Self {
        self.inner.attrs.push(AttrPattern {
            key: key.to_string(),
            expect: Some(value.to_string()),
            bind: None,
        });
        self
    }

    /// Require attribute `key` and bind its value as a string under `var`.
    pub fn attr_capture(mut self, key: &str, var: &str) -> Self {
        self.inner.attrs.push(AttrPattern {
            key: key.to_string(),
            expect: None,
            bind: Some(var.to_string()),
        });
        self
    }

    /// Match children positionally against `patterns`.
    pub fn children(mut self, patterns: Vec<Pattern>) -> Self {
        self.inner.children = Some(patterns);
        self
    }

    pub fn build(self) -> Pattern {
        Pattern::Kind(self.inner)
    }
}

/// `$v` - match anything, bind the node.
pub fn capture(var: &str) -> Pattern {
    Pattern::Var(var.to_string())
}

/// Match anything, bind nothing.
pub fn any() -> Pattern {
    Pattern::Any
}

/// Trailing rest capture for a child pattern list.
pub fn rest(var: &str) -> Pattern {
    Pattern::List {
        prefix: vec![],
        rest: var.to_string(),
    }
}

// ============================================================================
// Rule builders
// ============================================================================

pub struct RuleBuilder {
    pattern: Pattern,
    condition: Option<Box<dyn Fn(&mut Bindings) -> bool>>,
}

/// Start a rule from a pattern.
pub fn rule(pattern: Pattern) -> RuleBuilder {
    RuleBuilder {
        pattern,
        condition: None,
    }
}

/// `call` node with the given operator name and two children bound as
/// `$left` / `$right`.
pub fn match_binary_op(op: &str) -> RuleBuilder {
    let expected = op.to_string();
    rule(
        match_kind("call")
            .capture_name("op")
            .children(vec![capture("left"), capture("right")])
            .build(),
    )
    .when(move |bindings| {
        matches!(bindings.get("op"), Some(Binding::Str(name)) if *name == expected)
    })
}

/// `call` node with the given operator name and one child bound as `$operand`.
pub fn match_unary_op(op: &str) -> RuleBuilder {
    let expected = op.to_string();
    rule(
        match_kind("call")
            .capture_name("op")
            .children(vec![capture("operand")])
            .build(),
    )
    .when(move |bindings| {
        matches!(bindings.get("op"), Some(Binding::Str(name)) if *name == expected)
    })
}

impl RuleBuilder {
    /// AND-compose a predicate with any existing condition. Predicates may
    /// write derived bindings for the template to reference.
    pub fn when(mut self, pred: impl Fn(&mut Bindings) -> bool + 'static) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(prev) => Box::new(move |b: &mut Bindings| prev(b) && pred(b)),
            None => Box::new(pred),
        });
        self
    }

    /// Finish the rule with its output template.
    pub fn template(self, template: Template) -> Rule {
        Rule {
            pattern: self.pattern,
            condition: self.condition,
            template,
        }
    }
}

// ============================================================================
// Template builders
// ============================================================================

pub struct NodeTemplateBuilder {
    inner: NodeTemplate,
}

/// `generate_node("function")` - build a fresh node of the given kind.
pub fn generate_node(kind: &str) -> NodeTemplateBuilder {
    NodeTemplateBuilder {
        inner: NodeTemplate {
            kind: Kind::from(kind),
            name: None,
            attrs: Vec::new(),
            children: Vec::new(),
        },
    }
}

impl NodeTemplateBuilder {
    pub fn name(mut self, expr: Expr) -> Self {
        self.inner.name = Some(expr);
        self
    }

    pub fn attr(mut self, key: &str, expr: Expr) -> Self {
        self.inner.attrs.push((key.to_string(), expr));
        self
    }

    pub fn child(mut self, template: Template) -> Self {
        self.inner.children.push(template);
        self
    }

    pub fn build(self) -> Template {
        Template::Node(self.inner)
    }
}

/// Emit the binding under `var` (node as-is, list spliced, string wrapped).
pub fn generate_var(var: &str) -> Template {
    Template::Var(var.to_string())
}

/// Emit `literal(String, value)`.
pub fn generate_literal(value: &str) -> Template {
    Template::Literal(value.to_string())
}

/// A `literal` node template with fixed type and a value expression.
pub fn make_literal(ty: &str, value: Expr) -> Template {
    generate_node("literal")
        .attr("type", Expr::Literal(ty.to_string()))
        .attr("value", value)
        .build()
}

pub fn var_ref(var: &str) -> Expr {
    Expr::Var(var.to_string())
}

pub fn text(value: &str) -> Expr {
    Expr::Literal(value.to_string())
}

// ============================================================================
// Binding helpers for conditions
// ============================================================================

/// The node bound under `var`, if it is a node binding.
pub fn bound_node<'a>(bindings: &'a Bindings, var: &str) -> Option<&'a Element> {
    match bindings.get(var) {
        Some(Binding::Node(node)) => Some(node),
        _ => None,
    }
}

/// The integer value of a bound `literal(Int, ...)` node.
pub fn bound_int(bindings: &Bindings, var: &str) -> Option<i64> {
    let node = bound_node(bindings, var)?;
    if !node.is_literal(None) || node.attr("type") != Some("Int") {
        return None;
    }
    node.attr("value")?.parse().ok()
}

/// Install a computed string under `var` (for conditions that fold values).
pub fn bind_str(bindings: &mut Bindings, var: &str, value: impl Into<String>) {
    bindings.insert(var.to_string(), Binding::Str(value.into()));
}

/// Condition: the node bound under `var` is `literal(Int, value)`.
pub fn is_int_literal(var: &str, value: i64) -> impl Fn(&mut Bindings) -> bool {
    let var = var.to_string();
    move |bindings| bound_int(bindings, &var) == Some(value)
}
