// ABOUTME: Runtime values produced by the tree-walking interpreter

use crate::element::Element;
use crate::env::Environment;
use crate::error::RuntimeError;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    Unit,
    Closure {
        params: Vec<String>,
        body: Element,
        env: Rc<Environment>,
    },
    Builtin(fn(&[Value]) -> Result<Value, RuntimeError>),
}

impl Value {
    pub fn type_name(&self) -> String {
        match self {
            Value::Int(_) => "Int",
            Value::Str(_) => "String",
            Value::Bool(_) => "Bool",
            Value::Unit => "Unit",
            Value::Closure { .. } => "closure",
            Value::Builtin(_) => "builtin",
        }
        .to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Unit => write!(f, "()"),
            Value::Closure { .. } => write!(f, "#<closure>"),
            Value::Builtin(_) => write!(f, "#<builtin>"),
        }
    }
}
