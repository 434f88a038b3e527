// ABOUTME: Types, type schemes, and the type environment for inference

use std::collections::HashMap;
use std::fmt;

/// A monotype. Constructors carry argument slots but unify atomically by
/// name; the language surface never instantiates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Var(String),
    Con { name: String, args: Vec<Type> },
    Fun { from: Box<Type>, to: Box<Type> },
}

impl Type {
    pub fn con(name: impl Into<String>) -> Type {
        Type::Con {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn int() -> Type {
        Type::con("Int")
    }

    pub fn string() -> Type {
        Type::con("String")
    }

    pub fn bool() -> Type {
        Type::con("Bool")
    }

    pub fn unit() -> Type {
        Type::con("Unit")
    }

    pub fn fun(from: Type, to: Type) -> Type {
        Type::Fun {
            from: Box::new(from),
            to: Box::new(to),
        }
    }

    /// Right-associated function type from parameter types to a result.
    pub fn curried(params: Vec<Type>, result: Type) -> Type {
        params
            .into_iter()
            .rev()
            .fold(result, |acc, p| Type::fun(p, acc))
    }

    /// Free variables in first-occurrence order.
    pub fn free_vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_free_vars(&mut out);
        out
    }

    fn collect_free_vars(&self, out: &mut Vec<String>) {
        match self {
            Type::Var(name) => {
                if !out.iter().any(|v| v == name) {
                    out.push(name.clone());
                }
            }
            Type::Con { args, .. } => {
                for arg in args {
                    arg.collect_free_vars(out);
                }
            }
            Type::Fun { from, to } => {
                from.collect_free_vars(out);
                to.collect_free_vars(out);
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(name) => write!(f, "{}", name),
            Type::Con { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "[")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            Type::Fun { from, to } => {
                // Function domains parenthesize to keep -> right-associated
                match **from {
                    Type::Fun { .. } => write!(f, "({}) -> {}", from, to),
                    _ => write!(f, "{} -> {}", from, to),
                }
            }
        }
    }
}

/// A type with its quantified variables. Instantiation replaces each
/// quantified variable with a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub vars: Vec<String>,
    pub ty: Type,
}

impl Scheme {
    /// A scheme quantifying nothing.
    pub fn mono(ty: Type) -> Self {
        Scheme {
            vars: Vec::new(),
            ty,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.vars.is_empty() {
            write!(f, "forall")?;
            for var in &self.vars {
                write!(f, " {}", var)?;
            }
            write!(f, ". ")?;
        }
        write!(f, "{}", self.ty)
    }
}

/// Identifier -> scheme. Scopes are modeled by cloning: a nested scope works
/// on its own copy, so shadowing is observable and unwinds for free.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    bindings: HashMap<String, Scheme>,
}

impl TypeEnv {
    pub fn new() -> Self {
        TypeEnv::default()
    }

    pub fn get(&self, name: &str) -> Option<&Scheme> {
        self.bindings.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, scheme: Scheme) {
        self.bindings.insert(name.into(), scheme);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scheme)> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curried_right_associates() {
        let ty = Type::curried(vec![Type::int(), Type::int()], Type::bool());
        assert_eq!(
            ty,
            Type::fun(Type::int(), Type::fun(Type::int(), Type::bool()))
        );
    }

    #[test]
    fn test_display_arrows() {
        let ty = Type::curried(vec![Type::int(), Type::int()], Type::int());
        assert_eq!(ty.to_string(), "Int -> Int -> Int");

        let higher = Type::fun(Type::fun(Type::int(), Type::int()), Type::bool());
        assert_eq!(higher.to_string(), "(Int -> Int) -> Bool");
    }

    #[test]
    fn test_free_vars_first_occurrence_order() {
        let ty = Type::fun(
            Type::Var("b".to_string()),
            Type::fun(Type::Var("a".to_string()), Type::Var("b".to_string())),
        );
        assert_eq!(ty.free_vars(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_scheme_display() {
        let scheme = Scheme {
            vars: vec!["a".to_string()],
            ty: Type::fun(Type::Var("a".to_string()), Type::unit()),
        };
        assert_eq!(scheme.to_string(), "forall a. a -> Unit");
    }

    #[test]
    fn test_env_shadowing_via_clone() {
        let mut outer = TypeEnv::new();
        outer.insert("x", Scheme::mono(Type::int()));

        let mut inner = outer.clone();
        inner.insert("x", Scheme::mono(Type::string()));

        assert_eq!(inner.get("x").unwrap().ty, Type::string());
        assert_eq!(outer.get("x").unwrap().ty, Type::int());
    }
}
