// ABOUTME: Scope chain for runtime bindings, with position-carrying lookup errors

use crate::element::Span;
use crate::error::RuntimeError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One scope level. Resolution walks the chain outward; the span of the
/// referencing node, when known, is threaded into any unbound-name error so
/// runtime diagnostics carry a line number like every other stage's.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// The root scope
    pub fn new() -> Rc<Self> {
        Rc::new(Environment::default())
    }

    /// A child scope resolving through `parent`
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Bind a name in this scope, shadowing any outer binding of it
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Resolve a name against the chain, innermost scope first
    pub fn lookup(&self, name: &str, span: Option<Span>) -> Result<Value, RuntimeError> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.bindings.borrow().get(name) {
                return Ok(value.clone());
            }
            match &scope.parent {
                Some(parent) => scope = parent.as_ref(),
                None => return Err(RuntimeError::unbound(name, span)),
            }
        }
    }

    /// Overwrite the nearest binding of `name` (assignment). Defining and
    /// assigning are distinct: assignment never creates a binding.
    pub fn assign(&self, name: &str, value: Value, span: Option<Span>) -> Result<(), RuntimeError> {
        let mut scope = self;
        loop {
            if let Some(slot) = scope.bindings.borrow_mut().get_mut(name) {
                *slot = value;
                return Ok(());
            }
            match &scope.parent {
                Some(parent) => scope = parent.as_ref(),
                None => return Err(RuntimeError::unbound(name, span)),
            }
        }
    }
}
