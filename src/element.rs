// ABOUTME: The Element tree (ET) - the single uniform tree representation
// shared by every phase after parsing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source range metadata. Spans never affect semantics or equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

/// The closed vocabulary of node tags, plus an escape hatch for kinds a
/// transducer rewrite may introduce (e.g. renaming `def` to `function`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Kind {
    Def,
    Param,
    Let,
    Lambda,
    Block,
    Return,
    If,
    While,
    For,
    Condition,
    From,
    To,
    Macro,
    Call,
    Var,
    Literal,
    Custom(String),
}

impl Kind {
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Def => "def",
            Kind::Param => "param",
            Kind::Let => "let",
            Kind::Lambda => "lambda",
            Kind::Block => "block",
            Kind::Return => "return",
            Kind::If => "if",
            Kind::While => "while",
            Kind::For => "for",
            Kind::Condition => "condition",
            Kind::From => "from",
            Kind::To => "to",
            Kind::Macro => "macro",
            Kind::Call => "call",
            Kind::Var => "var",
            Kind::Literal => "literal",
            Kind::Custom(s) => s,
        }
    }
}

impl From<&str> for Kind {
    fn from(s: &str) -> Self {
        match s {
            "def" => Kind::Def,
            "param" => Kind::Param,
            "let" => Kind::Let,
            "lambda" => Kind::Lambda,
            "block" => Kind::Block,
            "return" => Kind::Return,
            "if" => Kind::If,
            "while" => Kind::While,
            "for" => Kind::For,
            "condition" => Kind::Condition,
            "from" => Kind::From,
            "to" => Kind::To,
            "macro" => Kind::Macro,
            "call" => Kind::Call,
            "var" => Kind::Var,
            "literal" => Kind::Literal,
            other => Kind::Custom(other.to_string()),
        }
    }
}

impl From<String> for Kind {
    fn from(s: String) -> Self {
        Kind::from(s.as_str())
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The sole tree node type. `attrs` is an ordered sequence, not a map: the
/// same key may appear more than once and order is observable (the transducer
/// matches attributes positionally within their declared order).
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Element {
    pub kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attrs: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Element>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub span: Option<Span>,
}

// Structural equality ignores spans.
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.attrs == other.attrs
            && self.children == other.children
    }
}

impl Element {
    pub fn new(kind: Kind) -> Self {
        Element {
            kind,
            name: None,
            attrs: Vec::new(),
            children: Vec::new(),
            span: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// First attribute value under `key`, if any.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // ===== Convenience constructors for the shapes the pipeline builds =====

    pub fn var(name: impl Into<String>) -> Self {
        Element::new(Kind::Var).with_name(name)
    }

    pub fn literal(ty: &str, value: impl Into<String>) -> Self {
        Element::new(Kind::Literal)
            .with_attr("type", ty)
            .with_attr("value", value)
    }

    pub fn int_literal(value: i64) -> Self {
        Element::literal("Int", value.to_string())
    }

    pub fn string_literal(value: impl Into<String>) -> Self {
        Element::literal("String", value)
    }

    pub fn bool_literal(value: bool) -> Self {
        Element::literal("Bool", if value { "true" } else { "false" })
    }

    pub fn call(name: impl Into<String>, children: Vec<Element>) -> Self {
        Element::new(Kind::Call).with_name(name).with_children(children)
    }

    pub fn block(children: Vec<Element>) -> Self {
        Element::new(Kind::Block).with_children(children)
    }

    pub fn condition(expr: Element) -> Self {
        Element::new(Kind::Condition).with_child(expr)
    }

    pub fn param(name: impl Into<String>) -> Self {
        Element::new(Kind::Param).with_name(name)
    }

    /// True for `literal` nodes; with `value` given, the value must match too.
    pub fn is_literal(&self, value: Option<&str>) -> bool {
        self.kind == Kind::Literal
            && match value {
                Some(v) => self.attr("value") == Some(v),
                None => true,
            }
    }

    /// True for `var` nodes; with `name` given, the name must match too.
    pub fn is_var(&self, name: Option<&str>) -> bool {
        self.kind == Kind::Var
            && match name {
                Some(n) => self.name.as_deref() == Some(n),
                None => true,
            }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            write!(f, "  ")?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }
        if !self.attrs.is_empty() {
            write!(f, " [")?;
            for (i, (k, v)) in self.attrs.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}={}", k, v)?;
            }
            write!(f, "]")?;
        }
        for child in &self.children {
            writeln!(f)?;
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_order_preserved() {
        let el = Element::new(Kind::Def)
            .with_attr("x", "Int")
            .with_attr("y", "String")
            .with_attr("returns", "Int");

        let keys: Vec<&str> = el.attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["x", "y", "returns"]);
    }

    #[test]
    fn test_attr_lookup_finds_first() {
        // `def` records parameter types under the parameter's own name, so a
        // key can repeat; lookup returns the first occurrence.
        let el = Element::new(Kind::Def)
            .with_attr("x", "Int")
            .with_attr("x", "String");
        assert_eq!(el.attr("x"), Some("Int"));
        assert_eq!(el.attr("missing"), None);
    }

    #[test]
    fn test_equality_ignores_span() {
        let span = Span {
            start: 0,
            end: 3,
            line: 1,
            column: 1,
        };
        let with_span = Element::var("x").with_span(span);
        let without = Element::var("x");
        assert_eq!(with_span, without);
    }

    #[test]
    fn test_equality_observes_structure() {
        assert_ne!(Element::var("x"), Element::var("y"));
        assert_ne!(
            Element::literal("Int", "1"),
            Element::literal("Int", "2")
        );
        assert_ne!(
            Element::block(vec![Element::var("x")]),
            Element::block(vec![])
        );
    }

    #[test]
    fn test_custom_kind_round_trip() {
        let kind = Kind::from("function");
        assert!(matches!(kind, Kind::Custom(ref s) if s == "function"));
        assert_eq!(kind.as_str(), "function");
        assert_eq!(Kind::from("call"), Kind::Call);
    }

    #[test]
    fn test_json_round_trip() {
        let el = Element::call(
            "+",
            vec![Element::var("x"), Element::int_literal(1)],
        );
        let json = serde_json::to_string(&el).unwrap();
        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(el, back);
    }

    #[test]
    fn test_json_skips_empty_fields() {
        let json = serde_json::to_string(&Element::var("x")).unwrap();
        assert!(!json.contains("attrs"));
        assert!(!json.contains("children"));
        assert!(!json.contains("span"));
    }

    #[test]
    fn test_display_outline() {
        let el = Element::new(Kind::If)
            .with_child(Element::condition(Element::var("c")))
            .with_child(Element::block(vec![]));
        let text = format!("{}", el);
        assert!(text.starts_with("if"));
        assert!(text.contains("\n  condition"));
        assert!(text.contains("\n    var c"));
    }
}
