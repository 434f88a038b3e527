//! Runtime built-in functions, organized by concern:
//!
//! - **arithmetic**: +, -, *, /, % (/ is floor division; + concatenates
//!   when either operand is a string)
//! - **comparison**: <, >, <=, >=, ==, !=
//! - **logic**: unary_! (&& and || short-circuit in the evaluator instead)
//! - **console**: print, println
//! - **conversion and errors**: toString, error
//!
//! `register` installs all of them into an environment under the names call
//! nodes carry, operators included.

use crate::env::Environment;
use crate::error::RuntimeError;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Output Capture for Tests
// ============================================================================

thread_local! {
    static CAPTURE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Run `f` with console output redirected into a buffer; returns the result
/// and everything printed.
pub fn capture<F, T>(f: F) -> (T, String)
where
    F: FnOnce() -> T,
{
    CAPTURE.with(|c| *c.borrow_mut() = Some(String::new()));
    let result = f();
    let captured = CAPTURE.with(|c| c.borrow_mut().take()).unwrap_or_default();
    (result, captured)
}

fn emit(text: &str) {
    let buffered = CAPTURE.with(|c| {
        if let Some(buffer) = c.borrow_mut().as_mut() {
            buffer.push_str(text);
            true
        } else {
            false
        }
    });
    if !buffered {
        print!("{}", text);
    }
}

// ============================================================================
// Console
// ============================================================================

/// Prints values to stdout with a trailing newline. Returns unit.
pub fn builtin_println(args: &[Value]) -> Result<Value, RuntimeError> {
    builtin_print(args)?;
    emit("\n");
    Ok(Value::Unit)
}

/// Prints values to stdout without a newline. Returns unit.
pub fn builtin_print(args: &[Value]) -> Result<Value, RuntimeError> {
    let mut text = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&arg.to_string());
    }
    emit(&text);
    Ok(Value::Unit)
}

// ============================================================================
// Conversion and Errors
// ============================================================================

/// Renders any value as a string.
pub fn builtin_to_string(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [value] => Ok(Value::Str(value.to_string())),
        _ => Err(RuntimeError::arity("toString", "1", args.len())),
    }
}

/// Raises a runtime failure carrying the given message.
pub fn builtin_error(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [message] => Err(RuntimeError::Explicit(message.to_string())),
        _ => Err(RuntimeError::arity("error", "1", args.len())),
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

fn int_operand(op: &str, value: &Value, position: usize) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(RuntimeError::TypeMismatch {
            context: format!("{} (argument {})", op, position),
            expected: "Int".to_string(),
            actual: other.type_name(),
        }),
    }
}

/// Integer addition, with the string-concatenation overload: if either
/// operand is a string, both render to text and concatenate. The type
/// system does not admit this overload; it exists for runtime callers
/// going through `toString`.
pub fn builtin_add(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [Value::Str(l), r] => Ok(Value::Str(format!("{}{}", l, r))),
        [l, Value::Str(r)] => Ok(Value::Str(format!("{}{}", l, r))),
        [l, r] => Ok(Value::Int(
            int_operand("+", l, 1)? + int_operand("+", r, 2)?,
        )),
        _ => Err(RuntimeError::arity("+", "2", args.len())),
    }
}

pub fn builtin_sub(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [l, r] => Ok(Value::Int(
            int_operand("-", l, 1)? - int_operand("-", r, 2)?,
        )),
        _ => Err(RuntimeError::arity("-", "2", args.len())),
    }
}

pub fn builtin_mul(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [l, r] => Ok(Value::Int(
            int_operand("*", l, 1)? * int_operand("*", r, 2)?,
        )),
        _ => Err(RuntimeError::arity("*", "2", args.len())),
    }
}

/// Floor of the mathematical quotient, not truncation toward zero.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

pub fn builtin_div(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [l, r] => {
            let l = int_operand("/", l, 1)?;
            let r = int_operand("/", r, 2)?;
            if r == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(Value::Int(floor_div(l, r)))
        }
        _ => Err(RuntimeError::arity("/", "2", args.len())),
    }
}

pub fn builtin_rem(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [l, r] => {
            let l = int_operand("%", l, 1)?;
            let r = int_operand("%", r, 2)?;
            if r == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(Value::Int(l % r))
        }
        _ => Err(RuntimeError::arity("%", "2", args.len())),
    }
}

pub fn builtin_negate(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [v] => Ok(Value::Int(-int_operand("unary_-", v, 1)?)),
        _ => Err(RuntimeError::arity("unary_-", "1", args.len())),
    }
}

// ============================================================================
// Comparison and Logic
// ============================================================================

pub fn builtin_lt(args: &[Value]) -> Result<Value, RuntimeError> {
    compare_ints("<", args, |l, r| l < r)
}

pub fn builtin_gt(args: &[Value]) -> Result<Value, RuntimeError> {
    compare_ints(">", args, |l, r| l > r)
}

pub fn builtin_le(args: &[Value]) -> Result<Value, RuntimeError> {
    compare_ints("<=", args, |l, r| l <= r)
}

pub fn builtin_ge(args: &[Value]) -> Result<Value, RuntimeError> {
    compare_ints(">=", args, |l, r| l >= r)
}

fn compare_ints(
    op: &str,
    args: &[Value],
    test: impl Fn(i64, i64) -> bool,
) -> Result<Value, RuntimeError> {
    match args {
        [l, r] => Ok(Value::Bool(test(
            int_operand(op, l, 1)?,
            int_operand(op, r, 2)?,
        ))),
        _ => Err(RuntimeError::arity(op, "2", args.len())),
    }
}

fn values_equal(l: &Value, r: &Value) -> Result<bool, RuntimeError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Unit, Value::Unit) => Ok(true),
        _ => Err(RuntimeError::TypeMismatch {
            context: "==".to_string(),
            expected: l.type_name(),
            actual: r.type_name(),
        }),
    }
}

pub fn builtin_eq(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [l, r] => Ok(Value::Bool(values_equal(l, r)?)),
        _ => Err(RuntimeError::arity("==", "2", args.len())),
    }
}

pub fn builtin_ne(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [l, r] => Ok(Value::Bool(!values_equal(l, r)?)),
        _ => Err(RuntimeError::arity("!=", "2", args.len())),
    }
}

pub fn builtin_not(args: &[Value]) -> Result<Value, RuntimeError> {
    match args {
        [Value::Bool(b)] => Ok(Value::Bool(!b)),
        [other] => Err(RuntimeError::type_mismatch(
            "unary_!",
            "Bool",
            other.type_name(),
        )),
        _ => Err(RuntimeError::arity("unary_!", "1", args.len())),
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Register every built-in in the environment. Operator names double as
/// ordinary identifiers here because call nodes carry the operator as `name`.
pub fn register(env: &Rc<Environment>) {
    let table: [(&str, fn(&[Value]) -> Result<Value, RuntimeError>); 17] = [
        ("+", builtin_add),
        ("-", builtin_sub),
        ("*", builtin_mul),
        ("/", builtin_div),
        ("%", builtin_rem),
        ("<", builtin_lt),
        (">", builtin_gt),
        ("<=", builtin_le),
        (">=", builtin_ge),
        ("==", builtin_eq),
        ("!=", builtin_ne),
        ("unary_!", builtin_not),
        ("unary_-", builtin_negate),
        ("println", builtin_println),
        ("print", builtin_print),
        ("toString", builtin_to_string),
        ("error", builtin_error),
    ];
    for (name, f) in table {
        env.define(name, Value::Builtin(f));
    }
}
