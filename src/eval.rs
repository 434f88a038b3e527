// ABOUTME: Tree-walking interpreter executing the Element tree

use crate::builtins;
use crate::element::{Element, Kind};
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::value::Value;
use std::rc::Rc;

/// Result of executing one node: a plain value, or a latched `return` that
/// unwinds to the enclosing call.
enum Flow {
    Value(Value),
    Return(Value),
}

impl Flow {
    fn into_value(self) -> Value {
        match self {
            Flow::Value(v) | Flow::Return(v) => v,
        }
    }
}

/// Execute a program: evaluate top-level statements in order, then invoke a
/// nullary `main` if one was defined. The result is `main`'s value, or the
/// last statement's value.
pub fn run_program(program: &[Element]) -> Result<Value, RuntimeError> {
    let env = Environment::new();
    builtins::register(&env);

    let mut last = Value::Unit;
    for statement in program {
        last = eval(statement, env.clone())?;
    }

    match env.lookup("main", None) {
        Ok(main @ Value::Closure { .. }) => apply(main, vec![]),
        _ => Ok(last),
    }
}

/// Evaluate one node to a value. A `return` escaping to the top level
/// simply yields its value.
pub fn eval(el: &Element, env: Rc<Environment>) -> Result<Value, RuntimeError> {
    Ok(exec(el, env)?.into_value())
}

fn exec(el: &Element, env: Rc<Environment>) -> Result<Flow, RuntimeError> {
    match el.kind {
        Kind::Literal => Ok(Flow::Value(literal_value(el)?)),

        Kind::Var => {
            let name = el.name.as_deref().unwrap_or_default();
            Ok(Flow::Value(env.lookup(name, el.span)?))
        }

        Kind::Block => {
            let block_env = Environment::with_parent(env);
            let mut last = Value::Unit;
            for statement in &el.children {
                match exec(statement, block_env.clone())? {
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Value(value) => last = value,
                }
            }
            Ok(Flow::Value(last))
        }

        Kind::Return => {
            let value = match el.children.first() {
                Some(expr) => eval(expr, env)?,
                None => Value::Unit,
            };
            Ok(Flow::Return(value))
        }

        Kind::Let => {
            let name = el.name.clone().unwrap_or_default();
            let value = match el.children.first() {
                Some(expr) => eval(expr, env.clone())?,
                None => Value::Unit,
            };
            env.define(name, value);
            Ok(Flow::Value(Value::Unit))
        }

        Kind::Def => {
            let name = el.name.clone().unwrap_or_default();
            let closure = close_over(el, env.clone());
            env.define(name, closure);
            Ok(Flow::Value(Value::Unit))
        }

        Kind::Lambda => Ok(Flow::Value(close_over(el, env))),

        Kind::If => {
            let scrutinee = eval(condition_expr(el)?, env.clone())?;
            match scrutinee {
                Value::Bool(true) => match el.children.get(1) {
                    Some(branch) => exec(branch, env),
                    None => Ok(Flow::Value(Value::Unit)),
                },
                Value::Bool(false) => match el.children.get(2) {
                    Some(branch) => exec(branch, env),
                    None => Ok(Flow::Value(Value::Unit)),
                },
                other => Err(RuntimeError::type_mismatch("if", "Bool", other.type_name())),
            }
        }

        Kind::While => {
            loop {
                match eval(condition_expr(el)?, env.clone())? {
                    Value::Bool(true) => {}
                    Value::Bool(false) => break,
                    other => {
                        return Err(RuntimeError::type_mismatch(
                            "while",
                            "Bool",
                            other.type_name(),
                        ))
                    }
                }
                if let Some(body) = el.children.get(1) {
                    if let Flow::Return(value) = exec(body, env.clone())? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Ok(Flow::Value(Value::Unit))
        }

        Kind::For => {
            let var = el.attr("var").unwrap_or_default().to_string();
            let from = int_bound(el, 0, env.clone())?;
            let to = int_bound(el, 1, env.clone())?;

            let loop_env = Environment::with_parent(env);
            for i in from..=to {
                loop_env.define(var.clone(), Value::Int(i));
                if let Some(body) = el.children.get(2) {
                    if let Flow::Return(value) = exec(body, loop_env.clone())? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Ok(Flow::Value(Value::Unit))
        }

        Kind::Call => Ok(Flow::Value(eval_call(el, env)?)),

        Kind::Condition | Kind::From | Kind::To => match el.children.first() {
            Some(inner) => exec(inner, env),
            None => Ok(Flow::Value(Value::Unit)),
        },

        Kind::Param => Ok(Flow::Value(Value::Unit)),

        Kind::Macro | Kind::Custom(_) => Err(RuntimeError::Explicit(format!(
            "cannot evaluate node kind '{}'",
            el.kind
        ))),
    }
}

fn eval_call(el: &Element, env: Rc<Environment>) -> Result<Value, RuntimeError> {
    let name = el.name.as_deref().unwrap_or_default();

    // Short-circuit logic and assignment are evaluation-order forms, not
    // ordinary functions.
    match name {
        "&&" => {
            return match eval_bool(el, 0, "&&", env.clone())? {
                false => Ok(Value::Bool(false)),
                true => Ok(Value::Bool(eval_bool(el, 1, "&&", env)?)),
            }
        }
        "||" => {
            return match eval_bool(el, 0, "||", env.clone())? {
                true => Ok(Value::Bool(true)),
                false => Ok(Value::Bool(eval_bool(el, 1, "||", env)?)),
            }
        }
        "=" => return eval_assign(el, env),
        _ => {}
    }

    let callee = env.lookup(name, el.span)?;

    let args = el
        .children
        .iter()
        .map(|arg| eval(arg, env.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    apply(callee, args)
}

/// Apply a closure or builtin to already-evaluated arguments.
pub fn apply(callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match callee {
        Value::Builtin(f) => f(&args),
        Value::Closure { params, body, env } => {
            if params.len() != args.len() {
                return Err(RuntimeError::arity(
                    "closure",
                    params.len().to_string(),
                    args.len(),
                ));
            }
            let call_env = Environment::with_parent(env);
            for (param, arg) in params.iter().zip(args) {
                call_env.define(param.clone(), arg);
            }
            Ok(exec(&body, call_env)?.into_value())
        }
        other => Err(RuntimeError::NotCallable(other.type_name())),
    }
}

fn eval_assign(el: &Element, env: Rc<Environment>) -> Result<Value, RuntimeError> {
    let target = el.children.first().ok_or_else(|| {
        RuntimeError::Explicit("assignment without a target".to_string())
    })?;
    let target_span = target.span;
    let name = match (&target.kind, &target.name) {
        (Kind::Var, Some(name)) => name.clone(),
        _ => {
            return Err(RuntimeError::type_mismatch(
                "=",
                "variable",
                target.kind.to_string(),
            ))
        }
    };
    let value = match el.children.get(1) {
        Some(expr) => eval(expr, env.clone())?,
        None => Value::Unit,
    };
    env.assign(&name, value.clone(), target_span)?;
    Ok(value)
}

fn eval_bool(
    el: &Element,
    index: usize,
    op: &str,
    env: Rc<Environment>,
) -> Result<bool, RuntimeError> {
    let operand = el
        .children
        .get(index)
        .ok_or_else(|| RuntimeError::arity(op, "2", el.children.len()))?;
    match eval(operand, env)? {
        Value::Bool(b) => Ok(b),
        other => Err(RuntimeError::type_mismatch(op, "Bool", other.type_name())),
    }
}

/// Build a closure from a `def` or `lambda` node: leading `param` children
/// are the parameters, the trailing block is the body.
fn close_over(el: &Element, env: Rc<Environment>) -> Value {
    let params = el
        .children
        .iter()
        .filter(|c| c.kind == Kind::Param)
        .filter_map(|c| c.name.clone())
        .collect();
    let body = el
        .children
        .last()
        .filter(|c| c.kind == Kind::Block)
        .cloned()
        .unwrap_or_else(|| Element::block(vec![]));
    Value::Closure { params, body, env }
}

fn literal_value(el: &Element) -> Result<Value, RuntimeError> {
    let ty = el.attr("type").unwrap_or_default();
    let raw = el.attr("value").unwrap_or_default();
    match ty {
        "Int" => raw.parse().map(Value::Int).map_err(|_| {
            RuntimeError::Explicit(format!("malformed Int literal '{}'", raw))
        }),
        "String" => Ok(Value::Str(raw.to_string())),
        "Bool" => Ok(Value::Bool(raw == "true")),
        other => Err(RuntimeError::Explicit(format!(
            "unknown literal type '{}'",
            other
        ))),
    }
}

fn condition_expr(el: &Element) -> Result<&Element, RuntimeError> {
    el.children
        .first()
        .filter(|c| c.kind == Kind::Condition)
        .and_then(|c| c.children.first())
        .ok_or_else(|| {
            RuntimeError::Explicit(format!("{} node without a condition", el.kind))
        })
}

fn int_bound(el: &Element, index: usize, env: Rc<Environment>) -> Result<i64, RuntimeError> {
    let bound = el
        .children
        .get(index)
        .and_then(|c| c.children.first())
        .ok_or_else(|| RuntimeError::Explicit("for loop missing a bound".to_string()))?;
    match eval(bound, env)? {
        Value::Int(n) => Ok(n),
        other => Err(RuntimeError::type_mismatch(
            "for",
            "Int",
            other.type_name(),
        )),
    }
}
