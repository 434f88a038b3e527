// ABOUTME: Lowers the CST into the uniform Element tree (ET)

use crate::element::{Element, Kind};
use crate::error::NormalizeError;
use crate::parser::{Cst, CstNode};

/// Lower a whole program, one Element per top-level statement.
pub fn normalize_program(program: &[Cst]) -> Result<Vec<Element>, NormalizeError> {
    program.iter().map(normalize).collect()
}

fn normalize_block(statements: &[Cst]) -> Result<Element, NormalizeError> {
    let children = statements
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Element::block(children))
}

/// Lower one CST node. Every lowering is local except the block-argument
/// desugaring on calls: `f(a) { B }` gains a trailing zero-parameter lambda
/// argument whose body is the block.
pub fn normalize(cst: &Cst) -> Result<Element, NormalizeError> {
    let element = match &cst.node {
        CstNode::Def {
            name,
            params,
            returns,
            body,
        } => {
            let mut el = Element::new(Kind::Def).with_name(name);
            // Declared parameter types are recorded twice: as top-level attrs
            // keyed by the parameter's own name, and on the param child.
            for param in params {
                if let Some(ty) = &param.ty {
                    el = el.with_attr(&param.name, ty);
                }
            }
            if let Some(ret) = returns {
                el = el.with_attr("returns", ret);
            }
            for param in params {
                let mut p = Element::param(&param.name);
                if let Some(ty) = &param.ty {
                    p = p.with_attr("type", ty);
                }
                el = el.with_child(p);
            }
            el.with_child(normalize_block(body)?)
        }

        CstNode::Let { name, ty, value } => {
            let mut el = Element::new(Kind::Let).with_name(name);
            if let Some(ty) = ty {
                el = el.with_attr("type", ty);
            }
            el.with_child(normalize(value)?)
        }

        CstNode::If {
            cond,
            then_body,
            else_body,
        } => {
            let mut el = Element::new(Kind::If)
                .with_child(Element::condition(normalize(cond)?))
                .with_child(normalize_block(then_body)?);
            if let Some(else_body) = else_body {
                el = el.with_child(normalize_block(else_body)?);
            }
            el
        }

        CstNode::While { cond, body } => Element::new(Kind::While)
            .with_child(Element::condition(normalize(cond)?))
            .with_child(normalize_block(body)?),

        CstNode::For {
            var,
            from,
            to,
            body,
        } => Element::new(Kind::For)
            .with_attr("var", var)
            .with_child(Element::new(Kind::From).with_child(normalize(from)?))
            .with_child(Element::new(Kind::To).with_child(normalize(to)?))
            .with_child(normalize_block(body)?),

        CstNode::Return(value) => {
            let mut el = Element::new(Kind::Return);
            if let Some(value) = value {
                el = el.with_child(normalize(value)?);
            }
            el
        }

        CstNode::Lambda { params, body } => {
            let mut el = Element::new(Kind::Lambda);
            for param in params {
                el = el.with_child(Element::param(param));
            }
            el.with_child(normalize_block(body)?)
        }

        CstNode::MacroDef { name, params, body } => {
            let mut el = Element::new(Kind::Macro).with_name(name);
            for param in params {
                el = el.with_attr("param", format!("${}", param));
            }
            el.with_child(normalize_block(body)?)
        }

        CstNode::Binary { op, lhs, rhs } => {
            if op == "=" && !matches!(lhs.node, CstNode::Var(_)) {
                return Err(NormalizeError::BadAssignTarget {
                    found: describe(&lhs.node),
                });
            }
            Element::call(op, vec![normalize(lhs)?, normalize(rhs)?])
        }

        CstNode::Unary { op, expr } => {
            Element::call(format!("unary_{}", op), vec![normalize(expr)?])
        }

        CstNode::Call {
            callee,
            args,
            block,
        } => {
            let mut children = args
                .iter()
                .map(normalize)
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(block) = block {
                children.push(Element::new(Kind::Lambda).with_child(normalize_block(block)?));
            }
            Element::call(callee, children)
        }

        CstNode::Var(name) => Element::var(name),
        CstNode::MacroVar(name) => Element::var(format!("${}", name)),
        CstNode::Int(n) => Element::literal("Int", n.to_string()),
        CstNode::Str(s) => Element::literal("String", s),
        CstNode::Bool(b) => Element::bool_literal(*b),
    };

    Ok(element.with_span(cst.span))
}

fn describe(node: &CstNode) -> String {
    match node {
        CstNode::Call { callee, .. } => format!("call to '{}'", callee),
        CstNode::Int(_) | CstNode::Str(_) | CstNode::Bool(_) => "a literal".to_string(),
        CstNode::Binary { op, .. } => format!("'{}' expression", op),
        _ => "a non-variable expression".to_string(),
    }
}
