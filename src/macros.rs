// ABOUTME: Macro registry and the bottom-up expander over the Element tree

use crate::config::EXPANSION_LIMIT;
use crate::element::{Element, Kind};
use crate::error::MacroError;
use std::collections::HashMap;

// ============================================================================
// Registry
// ============================================================================

/// How a registered macro produces its replacement tree.
enum Expansion {
    /// Built-in: a Rust function constructing the expansion directly.
    Native(fn(&MacroArgs) -> Result<Element, MacroError>),
    /// User-registered: a template block in which `$p` variables are
    /// replaced positionally by the call's arguments.
    Template { params: Vec<String>, body: Element },
}

/// Positional argument view handed to native expansions. Matching is name
/// capture only: `$vi` binds the i-th child of the call, surplus arguments
/// are ignored, and referencing a missing one is fatal.
pub struct MacroArgs<'a> {
    name: &'a str,
    args: &'a [Element],
}

impl<'a> MacroArgs<'a> {
    fn get(&self, index: usize, var: &str) -> Result<&'a Element, MacroError> {
        self.args.get(index).ok_or_else(|| MacroError::UnboundPatternVar {
            name: self.name.to_string(),
            var: var.to_string(),
        })
    }
}

pub struct MacroRegistry {
    macros: HashMap<String, Expansion>,
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroRegistry {
    /// A registry with the built-in macro catalog installed.
    pub fn new() -> Self {
        let mut macros: HashMap<String, Expansion> = HashMap::new();
        macros.insert("when".to_string(), Expansion::Native(expand_when));
        macros.insert("assert".to_string(), Expansion::Native(expand_assert));
        macros.insert("debug".to_string(), Expansion::Native(expand_debug));
        macros.insert("log".to_string(), Expansion::Native(expand_log));
        macros.insert("trace".to_string(), Expansion::Native(expand_trace));
        macros.insert("inc".to_string(), Expansion::Native(expand_inc));
        macros.insert("dec".to_string(), Expansion::Native(expand_dec));
        macros.insert("ifZero".to_string(), Expansion::Native(expand_if_zero));
        macros.insert(
            "ifPositive".to_string(),
            Expansion::Native(expand_if_positive),
        );
        macros.insert("until".to_string(), Expansion::Native(expand_until));
        MacroRegistry { macros }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Register a user macro from its `macro` definition node.
    pub fn register_definition(&mut self, def: &Element) -> Result<(), MacroError> {
        let name = def
            .name
            .clone()
            .ok_or_else(|| MacroError::MalformedDefinition {
                reason: "macro definition carries no name".to_string(),
            })?;
        let params = def
            .attrs
            .iter()
            .filter(|(k, _)| k == "param")
            .map(|(_, v)| v.trim_start_matches('$').to_string())
            .collect();
        let body = def
            .children
            .first()
            .filter(|c| c.kind == Kind::Block)
            .cloned()
            .ok_or_else(|| MacroError::MalformedDefinition {
                reason: format!("macro '{}' has no expand block", name),
            })?;
        self.macros.insert(name, Expansion::Template { params, body });
        Ok(())
    }

    /// Expand a whole program: `macro` definitions are registered and removed,
    /// every other statement is expanded.
    pub fn expand_program(&mut self, program: Vec<Element>) -> Result<Vec<Element>, MacroError> {
        let mut rest = Vec::new();
        for el in program {
            if el.kind == Kind::Macro {
                self.register_definition(&el)?;
            } else {
                rest.push(el);
            }
        }
        rest.iter().map(|el| self.expand(el)).collect()
    }

    /// Expand one tree bottom-up. The result of an expansion is itself
    /// re-expanded, so no registered call survives in the output.
    pub fn expand(&self, el: &Element) -> Result<Element, MacroError> {
        self.expand_depth(el, 0)
    }

    fn expand_depth(&self, el: &Element, depth: usize) -> Result<Element, MacroError> {
        if depth > EXPANSION_LIMIT {
            return Err(MacroError::ExpansionOverflow {
                limit: EXPANSION_LIMIT,
            });
        }

        // Children first (post-order)
        let mut out = el.clone();
        out.children = el
            .children
            .iter()
            .map(|c| self.expand_depth(c, depth))
            .collect::<Result<Vec<_>, _>>()?;

        if out.kind == Kind::Call {
            if let Some(expansion) = out.name.as_deref().and_then(|n| self.macros.get(n)) {
                let name = out.name.as_deref().unwrap_or_default();
                let replacement = match expansion {
                    Expansion::Native(f) => f(&MacroArgs {
                        name,
                        args: &out.children,
                    })?,
                    Expansion::Template { params, body } => {
                        apply_template(name, params, body, &out.children)?
                    }
                };
                return self.expand_depth(&replacement, depth + 1);
            }
        }

        Ok(out)
    }
}

// ============================================================================
// Template macros (user registration hook)
// ============================================================================

fn apply_template(
    name: &str,
    params: &[String],
    body: &Element,
    args: &[Element],
) -> Result<Element, MacroError> {
    let bindings: HashMap<&str, &Element> = params
        .iter()
        .map(String::as_str)
        .zip(args.iter())
        .collect();
    let expanded = substitute(name, body, &bindings)?;

    // A single-statement template splices as that statement; larger templates
    // stay wrapped so their statements evaluate in order.
    match expanded {
        Element {
            kind: Kind::Block,
            mut children,
            ..
        } if children.len() == 1 => Ok(children.remove(0)),
        other => Ok(other),
    }
}

fn substitute(
    name: &str,
    el: &Element,
    bindings: &HashMap<&str, &Element>,
) -> Result<Element, MacroError> {
    if el.kind == Kind::Var {
        if let Some(var) = el.name.as_deref().and_then(|n| n.strip_prefix('$')) {
            return match bindings.get(var) {
                Some(arg) => Ok((*arg).clone()),
                None => Err(MacroError::UnboundPatternVar {
                    name: name.to_string(),
                    var: var.to_string(),
                }),
            };
        }
    }
    let mut out = el.clone();
    out.children = el
        .children
        .iter()
        .map(|c| substitute(name, c, bindings))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(out)
}

// ============================================================================
// Built-in macro catalog
// ============================================================================

/// If `body` is a lambda whose only child is a block (the block-argument
/// desugaring), unwrap to that block; otherwise wrap the expression in one.
fn lift(body: &Element) -> Element {
    if body.kind == Kind::Lambda
        && body.children.len() == 1
        && body.children[0].kind == Kind::Block
    {
        body.children[0].clone()
    } else {
        Element::block(vec![body.clone()])
    }
}

/// `when($cond, $body)` -> `if [condition[cond], lift(body)]`
fn expand_when(args: &MacroArgs) -> Result<Element, MacroError> {
    let cond = args.get(0, "cond")?;
    let body = args.get(1, "body")?;
    Ok(Element::new(Kind::If)
        .with_child(Element::condition(cond.clone()))
        .with_child(lift(body)))
}

/// `assert($cond)` -> `if [condition[!cond], block[error("Assertion failed")]]`
fn expand_assert(args: &MacroArgs) -> Result<Element, MacroError> {
    let cond = args.get(0, "cond")?;
    Ok(Element::new(Kind::If)
        .with_child(Element::condition(Element::call(
            "unary_!",
            vec![cond.clone()],
        )))
        .with_child(Element::block(vec![Element::call(
            "error",
            vec![Element::string_literal("Assertion failed")],
        )])))
}

/// `debug($expr)` -> `println("Debug: " + toString(expr))`
fn expand_debug(args: &MacroArgs) -> Result<Element, MacroError> {
    let expr = args.get(0, "expr")?;
    Ok(Element::call(
        "println",
        vec![Element::call(
            "+",
            vec![
                Element::string_literal("Debug: "),
                Element::call("toString", vec![expr.clone()]),
            ],
        )],
    ))
}

/// `log($msg)` -> `println("[LOG] " + msg)`
fn expand_log(args: &MacroArgs) -> Result<Element, MacroError> {
    let msg = args.get(0, "msg")?;
    Ok(Element::call(
        "println",
        vec![Element::call(
            "+",
            vec![Element::string_literal("[LOG] "), msg.clone()],
        )],
    ))
}

/// `trace($expr)` -> a block that names the result, prints it, and yields it.
/// The generated binding uses the reserved `__` prefix, which the lexer
/// rejects in user code, so it cannot capture anything.
fn expand_trace(args: &MacroArgs) -> Result<Element, MacroError> {
    let expr = args.get(0, "expr")?;
    Ok(Element::block(vec![
        Element::new(Kind::Let)
            .with_name("__trace_result")
            .with_child(expr.clone()),
        Element::call(
            "println",
            vec![Element::call(
                "+",
                vec![
                    Element::string_literal("Trace: "),
                    Element::call("toString", vec![Element::var("__trace_result")]),
                ],
            )],
        ),
        Element::var("__trace_result"),
    ]))
}

/// `inc($x)` -> `x = x + 1`
fn expand_inc(args: &MacroArgs) -> Result<Element, MacroError> {
    let x = args.get(0, "x")?;
    Ok(Element::call(
        "=",
        vec![
            x.clone(),
            Element::call("+", vec![x.clone(), Element::literal("Int", "1")]),
        ],
    ))
}

/// `dec($x)` -> `x = x - 1`
fn expand_dec(args: &MacroArgs) -> Result<Element, MacroError> {
    let x = args.get(0, "x")?;
    Ok(Element::call(
        "=",
        vec![
            x.clone(),
            Element::call("-", vec![x.clone(), Element::literal("Int", "1")]),
        ],
    ))
}

/// `ifZero($x, $body)` -> `if [condition[x == 0], lift(body)]`
fn expand_if_zero(args: &MacroArgs) -> Result<Element, MacroError> {
    let x = args.get(0, "x")?;
    let body = args.get(1, "body")?;
    Ok(Element::new(Kind::If)
        .with_child(Element::condition(Element::call(
            "==",
            vec![x.clone(), Element::literal("Int", "0")],
        )))
        .with_child(lift(body)))
}

/// `ifPositive($x, $body)` -> `if [condition[x > 0], lift(body)]`
fn expand_if_positive(args: &MacroArgs) -> Result<Element, MacroError> {
    let x = args.get(0, "x")?;
    let body = args.get(1, "body")?;
    Ok(Element::new(Kind::If)
        .with_child(Element::condition(Element::call(
            ">",
            vec![x.clone(), Element::literal("Int", "0")],
        )))
        .with_child(lift(body)))
}

/// `until($cond, $body)` -> `while [condition[!cond], lift(body)]`
fn expand_until(args: &MacroArgs) -> Result<Element, MacroError> {
    let cond = args.get(0, "cond")?;
    let body = args.get(1, "body")?;
    Ok(Element::new(Kind::While)
        .with_child(Element::condition(Element::call(
            "unary_!",
            vec![cond.clone()],
        )))
        .with_child(lift(body)))
}
