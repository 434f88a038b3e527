// ABOUTME: Templates and output generation for the transducer

use crate::element::{Element, Kind};
use crate::error::TransducerError;
use crate::transducer::pattern::{Binding, Bindings};

/// String-valued expression usable in name and attribute positions.
#[derive(Debug, Clone)]
pub enum Expr {
    Var(String),
    Literal(String),
    Concat(Vec<Expr>),
}

impl Expr {
    pub fn eval(&self, bindings: &Bindings) -> Result<String, TransducerError> {
        match self {
            Expr::Literal(s) => Ok(s.clone()),
            Expr::Var(var) => match bindings.get(var) {
                Some(Binding::Str(s)) => Ok(s.clone()),
                Some(_) => Err(TransducerError::NonStringBinding(var.clone())),
                None => Err(TransducerError::UnboundTemplateVar(var.clone())),
            },
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&part.eval(bindings)?);
                }
                Ok(out)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Template {
    /// Build a fresh node
    Node(NodeTemplate),
    /// Emit a binding: a node as-is, a list spliced, a string wrapped
    /// into `literal(String, s)`
    Var(String),
    /// Emit `literal(String, value)`
    Literal(String),
    /// Splice several templates into the surrounding children list
    List(Vec<Template>),
}

#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub kind: Kind,
    pub name: Option<Expr>,
    pub attrs: Vec<(String, Expr)>,
    pub children: Vec<Template>,
}

/// What one template emitted: a single node, or a list to splice.
pub enum Generated {
    One(Element),
    Many(Vec<Element>),
}

impl Template {
    pub fn generate(&self, bindings: &Bindings) -> Result<Generated, TransducerError> {
        match self {
            Template::Literal(value) => {
                Ok(Generated::One(Element::literal("String", value.clone())))
            }

            Template::Var(var) => match bindings.get(var) {
                Some(Binding::Node(node)) => Ok(Generated::One(node.clone())),
                Some(Binding::List(nodes)) => Ok(Generated::Many(nodes.clone())),
                Some(Binding::Str(s)) => {
                    Ok(Generated::One(Element::literal("String", s.clone())))
                }
                None => Err(TransducerError::UnboundTemplateVar(var.clone())),
            },

            Template::List(templates) => {
                let mut out = Vec::new();
                for template in templates {
                    match template.generate(bindings)? {
                        Generated::One(node) => out.push(node),
                        Generated::Many(nodes) => out.extend(nodes),
                    }
                }
                Ok(Generated::Many(out))
            }

            Template::Node(node) => {
                let mut el = Element::new(node.kind.clone());
                if let Some(name) = &node.name {
                    el.name = Some(name.eval(bindings)?);
                }
                for (key, expr) in &node.attrs {
                    el.attrs.push((key.clone(), expr.eval(bindings)?));
                }
                for child in &node.children {
                    match child.generate(bindings)? {
                        Generated::One(node) => el.children.push(node),
                        Generated::Many(nodes) => el.children.extend(nodes),
                    }
                }
                Ok(Generated::One(el))
            }
        }
    }

    /// Generate where exactly one node is required (the root of a rewrite).
    pub fn generate_one(&self, bindings: &Bindings) -> Result<Element, TransducerError> {
        match self.generate(bindings)? {
            Generated::One(node) => Ok(node),
            Generated::Many(nodes) => Err(TransducerError::ListWhereNodeRequired {
                count: nodes.len(),
            }),
        }
    }
}
