// ABOUTME: Patterns and structural matching for the transducer

use crate::element::{Element, Kind};
use std::collections::HashMap;

/// A value captured during a single rule attempt. Conditions may read and
/// write these; on match failure the whole map is discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Node(Element),
    List(Vec<Element>),
    Str(String),
}

pub type Bindings = HashMap<String, Binding>;

#[derive(Debug, Clone)]
pub enum Pattern {
    /// Match on kind, optionally capturing name/attrs/children
    Kind(KindPattern),
    /// `$v` - match any node and bind it
    Var(String),
    /// Match any node, bind nothing
    Any,
    /// Fixed prefix followed by a rest capture of the remaining siblings.
    /// Only legal as the last child pattern.
    List { prefix: Vec<Pattern>, rest: String },
}

#[derive(Debug, Clone)]
pub struct KindPattern {
    pub kind: Kind,
    pub name_var: Option<String>,
    pub attrs: Vec<AttrPattern>,
    /// `None` leaves children unconstrained; `Some` matches positionally.
    pub children: Option<Vec<Pattern>>,
}

impl KindPattern {
    pub fn new(kind: impl Into<Kind>) -> Self {
        KindPattern {
            kind: kind.into(),
            name_var: None,
            attrs: Vec::new(),
            children: None,
        }
    }
}

/// `(key)` requires presence, `(key, literal)` requires exact value,
/// `(key -> var)` binds the value as a string. Absent key fails the match.
#[derive(Debug, Clone)]
pub struct AttrPattern {
    pub key: String,
    pub expect: Option<String>,
    pub bind: Option<String>,
}

impl Pattern {
    /// Match against one node, extending `bindings` on success. Partial
    /// bindings from a failed attempt are the caller's to discard.
    pub fn matches(&self, node: &Element, bindings: &mut Bindings) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Var(var) => {
                bindings.insert(var.clone(), Binding::Node(node.clone()));
                true
            }
            Pattern::Kind(kp) => kp.matches(node, bindings),
            // A rest capture makes no sense outside a sibling list
            Pattern::List { .. } => false,
        }
    }
}

impl KindPattern {
    fn matches(&self, node: &Element, bindings: &mut Bindings) -> bool {
        if node.kind != self.kind {
            return false;
        }

        if let Some(var) = &self.name_var {
            match &node.name {
                Some(name) => {
                    bindings.insert(var.clone(), Binding::Str(name.clone()));
                }
                None => return false,
            }
        }

        for attr in &self.attrs {
            match node.attr(&attr.key) {
                None => return false,
                Some(value) => {
                    if let Some(expect) = &attr.expect {
                        if value != expect {
                            return false;
                        }
                    }
                    if let Some(bind) = &attr.bind {
                        bindings.insert(bind.clone(), Binding::Str(value.to_string()));
                    }
                }
            }
        }

        match &self.children {
            None => true,
            Some(patterns) => match_children(patterns, &node.children, bindings),
        }
    }
}

/// Positional matching. With a trailing list pattern the prefix must match
/// one-to-one and the remainder binds as a list; otherwise arities must be
/// equal.
fn match_children(patterns: &[Pattern], children: &[Element], bindings: &mut Bindings) -> bool {
    if let Some(Pattern::List { prefix, rest }) = patterns.last() {
        let fixed: Vec<&Pattern> = patterns[..patterns.len() - 1]
            .iter()
            .chain(prefix.iter())
            .collect();
        if children.len() < fixed.len() {
            return false;
        }
        for (pattern, child) in fixed.iter().zip(children) {
            if !pattern.matches(child, bindings) {
                return false;
            }
        }
        bindings.insert(
            rest.clone(),
            Binding::List(children[fixed.len()..].to_vec()),
        );
        true
    } else {
        patterns.len() == children.len()
            && patterns
                .iter()
                .zip(children)
                .all(|(pattern, child)| pattern.matches(child, bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_pattern(kind: &str) -> KindPattern {
        KindPattern::new(Kind::from(kind))
    }

    #[test]
    fn test_kind_pattern_matches_kind() {
        let mut bindings = Bindings::new();
        assert!(Pattern::Kind(kind_pattern("var")).matches(&Element::var("x"), &mut bindings));
        assert!(!Pattern::Kind(kind_pattern("call")).matches(&Element::var("x"), &mut bindings));
    }

    #[test]
    fn test_name_capture_requires_name() {
        let mut pattern = kind_pattern("def");
        pattern.name_var = Some("fname".to_string());
        let pattern = Pattern::Kind(pattern);

        let mut bindings = Bindings::new();
        let named = Element::new(Kind::Def).with_name("add");
        assert!(pattern.matches(&named, &mut bindings));
        assert_eq!(
            bindings.get("fname"),
            Some(&Binding::Str("add".to_string()))
        );

        let anonymous = Element::new(Kind::Def);
        assert!(!pattern.matches(&anonymous, &mut Bindings::new()));
    }

    #[test]
    fn test_attr_pattern_literal_and_capture() {
        let mut pattern = kind_pattern("literal");
        pattern.attrs = vec![
            AttrPattern {
                key: "type".to_string(),
                expect: Some("Int".to_string()),
                bind: None,
            },
            AttrPattern {
                key: "value".to_string(),
                expect: None,
                bind: Some("v".to_string()),
            },
        ];
        let pattern = Pattern::Kind(pattern);

        let mut bindings = Bindings::new();
        assert!(pattern.matches(&Element::int_literal(7), &mut bindings));
        assert_eq!(bindings.get("v"), Some(&Binding::Str("7".to_string())));

        // Wrong literal value for the expected key
        assert!(!pattern.matches(&Element::string_literal("7"), &mut Bindings::new()));
        // Missing key fails
        assert!(!pattern.matches(&Element::var("x"), &mut Bindings::new()));
    }

    #[test]
    fn test_child_arity_must_match_without_rest() {
        let mut pattern = kind_pattern("call");
        pattern.children = Some(vec![
            Pattern::Var("a".to_string()),
            Pattern::Var("b".to_string()),
        ]);
        let pattern = Pattern::Kind(pattern);

        let two = Element::call("f", vec![Element::var("x"), Element::var("y")]);
        let three = Element::call(
            "f",
            vec![Element::var("x"), Element::var("y"), Element::var("z")],
        );
        assert!(pattern.matches(&two, &mut Bindings::new()));
        assert!(!pattern.matches(&three, &mut Bindings::new()));
    }

    #[test]
    fn test_rest_capture_binds_exact_tail() {
        let mut pattern = kind_pattern("call");
        pattern.children = Some(vec![
            Pattern::Var("first".to_string()),
            Pattern::List {
                prefix: vec![],
                rest: "rest".to_string(),
            },
        ]);
        let pattern = Pattern::Kind(pattern);

        let node = Element::call(
            "f",
            vec![Element::var("x"), Element::var("y"), Element::var("z")],
        );
        let mut bindings = Bindings::new();
        assert!(pattern.matches(&node, &mut bindings));
        assert_eq!(
            bindings.get("rest"),
            Some(&Binding::List(vec![
                Element::var("y"),
                Element::var("z")
            ]))
        );
    }

    #[test]
    fn test_rest_capture_may_be_empty() {
        let mut pattern = kind_pattern("block");
        pattern.children = Some(vec![Pattern::List {
            prefix: vec![],
            rest: "all".to_string(),
        }]);
        let pattern = Pattern::Kind(pattern);

        let mut bindings = Bindings::new();
        assert!(pattern.matches(&Element::block(vec![]), &mut bindings));
        assert_eq!(bindings.get("all"), Some(&Binding::List(vec![])));
    }

    #[test]
    fn test_unconstrained_children() {
        let pattern = Pattern::Kind(kind_pattern("block"));
        assert!(pattern.matches(
            &Element::block(vec![Element::var("x")]),
            &mut Bindings::new()
        ));
        assert!(pattern.matches(&Element::block(vec![]), &mut Bindings::new()));
    }

    #[test]
    fn test_any_and_var_patterns() {
        let mut bindings = Bindings::new();
        assert!(Pattern::Any.matches(&Element::var("x"), &mut bindings));
        assert!(bindings.is_empty());

        assert!(Pattern::Var("n".to_string()).matches(&Element::var("x"), &mut bindings));
        assert_eq!(bindings.get("n"), Some(&Binding::Node(Element::var("x"))));
    }
}
