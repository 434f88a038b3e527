// ABOUTME: Hindley-Milner type inference over the post-expansion Element tree

use crate::element::{Element, Kind};
use crate::error::TypeError;
use crate::types::{Scheme, Type, TypeEnv};
use std::collections::HashMap;

/// The signatures seeded into every inference run. `+` is seeded monomorphic
/// over Int; the runtime's string-concatenation overload is admitted per call
/// site in `infer_call` when a String operand is visible.
pub fn prelude() -> TypeEnv {
    let mut env = TypeEnv::new();

    for op in ["+", "-", "*", "/", "%"] {
        env.insert(
            op,
            Scheme::mono(Type::curried(vec![Type::int(), Type::int()], Type::int())),
        );
    }
    for op in ["<", ">", "<=", ">=", "==", "!="] {
        env.insert(
            op,
            Scheme::mono(Type::curried(vec![Type::int(), Type::int()], Type::bool())),
        );
    }
    for op in ["&&", "||"] {
        env.insert(
            op,
            Scheme::mono(Type::curried(
                vec![Type::bool(), Type::bool()],
                Type::bool(),
            )),
        );
    }
    env.insert(
        "unary_!",
        Scheme::mono(Type::fun(Type::bool(), Type::bool())),
    );
    env.insert("unary_-", Scheme::mono(Type::fun(Type::int(), Type::int())));

    let a = || Type::Var("a".to_string());
    env.insert(
        "println",
        Scheme {
            vars: vec!["a".to_string()],
            ty: Type::fun(a(), Type::unit()),
        },
    );
    env.insert(
        "print",
        Scheme {
            vars: vec!["a".to_string()],
            ty: Type::fun(a(), Type::unit()),
        },
    );
    env.insert(
        "toString",
        Scheme {
            vars: vec!["a".to_string()],
            ty: Type::fun(a(), Type::string()),
        },
    );
    env.insert(
        "error",
        Scheme {
            vars: vec!["a".to_string()],
            ty: Type::fun(Type::string(), a()),
        },
    );
    // Assignment unifies its sides and yields the assigned value
    env.insert(
        "=",
        Scheme {
            vars: vec!["a".to_string()],
            ty: Type::curried(vec![a(), a()], a()),
        },
    );

    env
}

/// The inference engine: a fresh-variable counter and a substitution
/// accumulated monotonically across one run.
#[derive(Debug, Default)]
pub struct Inferencer {
    counter: usize,
    subst: HashMap<String, Type>,
}

impl Inferencer {
    pub fn new() -> Self {
        Inferencer::default()
    }

    fn fresh(&mut self) -> Type {
        let name = format!("t{}", self.counter);
        self.counter += 1;
        Type::Var(name)
    }

    /// Substitute every bound variable in `t` to its current image.
    pub fn apply(&self, t: &Type) -> Type {
        match t {
            Type::Var(name) => match self.subst.get(name) {
                Some(bound) => self.apply(bound),
                None => t.clone(),
            },
            Type::Con { name, args } => Type::Con {
                name: name.clone(),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            Type::Fun { from, to } => Type::fun(self.apply(from), self.apply(to)),
        }
    }

    fn occurs(&self, var: &str, t: &Type) -> bool {
        match t {
            Type::Var(name) => name == var,
            Type::Con { args, .. } => args.iter().any(|a| self.occurs(var, a)),
            Type::Fun { from, to } => self.occurs(var, from) || self.occurs(var, to),
        }
    }

    fn bind(&mut self, var: &str, t: &Type) -> Result<(), TypeError> {
        if matches!(t, Type::Var(name) if name == var) {
            return Ok(());
        }
        if self.occurs(var, t) {
            return Err(TypeError::OccursCheck {
                var: var.to_string(),
                ty: t.to_string(),
            });
        }
        self.subst.insert(var.to_string(), t.clone());
        Ok(())
    }

    /// Reconcile two types or fail. Constructors unify atomically by name.
    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<(), TypeError> {
        let a = self.apply(a);
        let b = self.apply(b);
        match (&a, &b) {
            (Type::Var(v), _) => self.bind(v, &b),
            (_, Type::Var(v)) => self.bind(v, &a),
            (Type::Con { name: n1, .. }, Type::Con { name: n2, .. }) if n1 == n2 => Ok(()),
            (
                Type::Fun { from: f1, to: t1 },
                Type::Fun { from: f2, to: t2 },
            ) => {
                self.unify(f1, f2)?;
                self.unify(t1, t2)
            }
            _ => Err(TypeError::UnificationFailure {
                left: a.to_string(),
                right: b.to_string(),
            }),
        }
    }

    /// Quantify the variables free in `t` but not free in `env`.
    pub fn generalize(&self, env: &TypeEnv, t: &Type) -> Scheme {
        let t = self.apply(t);
        let mut env_free = Vec::new();
        for (_, scheme) in env.iter() {
            for var in self.apply(&scheme.ty).free_vars() {
                if !scheme.vars.contains(&var) {
                    env_free.push(var);
                }
            }
        }
        let vars: Vec<String> = t
            .free_vars()
            .into_iter()
            .filter(|v| !env_free.contains(v))
            .collect();
        Scheme { vars, ty: t }
    }

    /// Replace each quantified variable with a fresh one.
    pub fn instantiate(&mut self, scheme: &Scheme) -> Type {
        let mapping: HashMap<&str, Type> = scheme
            .vars
            .iter()
            .map(|v| (v.as_str(), self.fresh()))
            .collect();
        rename(&scheme.ty, &mapping)
    }

    /// Infer every top-level statement, binding `def`/`let` schemes into `env`.
    pub fn infer_program(
        &mut self,
        env: &mut TypeEnv,
        program: &[Element],
    ) -> Result<(), TypeError> {
        for statement in program {
            self.infer(env, statement)?;
        }
        Ok(())
    }

    /// Infer one node's type in `env`, extending `env` for binding forms.
    pub fn infer(&mut self, env: &mut TypeEnv, el: &Element) -> Result<Type, TypeError> {
        match el.kind {
            Kind::Literal => {
                let ty = el.attr("type").ok_or_else(|| {
                    TypeError::Malformed("literal without a type attribute".to_string())
                })?;
                Ok(Type::con(ty))
            }

            Kind::Var => {
                let name = el
                    .name
                    .as_deref()
                    .ok_or_else(|| TypeError::Malformed("var without a name".to_string()))?;
                let scheme = env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TypeError::UnboundIdentifier(name.to_string()))?;
                Ok(self.instantiate(&scheme))
            }

            Kind::Call => self.infer_call(env, el),

            Kind::Lambda => {
                let (params, body) = split_lambda(el)?;
                let mut body_env = env.clone();
                let mut param_types = Vec::new();
                for param in params {
                    let ty = self.param_type(param);
                    body_env.insert(param_name(param)?, Scheme::mono(ty.clone()));
                    param_types.push(ty);
                }
                let body_ty = self.infer(&mut body_env, body)?;
                Ok(self.apply(&Type::curried(param_types, body_ty)))
            }

            Kind::Def => {
                let name = el
                    .name
                    .as_deref()
                    .ok_or_else(|| TypeError::Malformed("def without a name".to_string()))?;
                let (params, body) = split_lambda(el)?;

                // Seed a monomorphic self-binding so recursion unifies
                // against it; generalization happens against the outer env.
                let self_ty = self.fresh();
                let mut body_env = env.clone();
                body_env.insert(name, Scheme::mono(self_ty.clone()));

                let mut param_types = Vec::new();
                for param in params {
                    let ty = self.param_type(param);
                    body_env.insert(param_name(param)?, Scheme::mono(ty.clone()));
                    param_types.push(ty);
                }

                let body_ty = self.infer(&mut body_env, body)?;
                if let Some(ret) = el.attr("returns") {
                    self.unify(&body_ty, &Type::con(ret))?;
                }
                let fn_ty = Type::curried(param_types, body_ty);
                self.unify(&self_ty, &fn_ty)?;

                let scheme = self.generalize(env, &fn_ty);
                env.insert(name, scheme);
                Ok(Type::unit())
            }

            Kind::Let => {
                let name = el
                    .name
                    .as_deref()
                    .ok_or_else(|| TypeError::Malformed("let without a name".to_string()))?;
                let value = el.children.first().ok_or_else(|| {
                    TypeError::Malformed("let without a value".to_string())
                })?;
                let value_ty = self.infer(env, value)?;
                if let Some(ty) = el.attr("type") {
                    self.unify(&value_ty, &Type::con(ty))?;
                }
                let scheme = self.generalize(env, &value_ty);
                env.insert(name, scheme);
                Ok(Type::unit())
            }

            Kind::If => {
                let cond = condition_expr(el)?;
                let cond_ty = self.infer(env, cond)?;
                self.unify(&cond_ty, &Type::bool())?;

                let then_ty = self.infer_child(env, el, 1)?;
                if let Some(else_branch) = el.children.get(2) {
                    let else_ty = self.infer(env, else_branch)?;
                    self.unify(&then_ty, &else_ty)?;
                    Ok(self.apply(&then_ty))
                } else {
                    Ok(Type::unit())
                }
            }

            Kind::Block => {
                let mut block_env = env.clone();
                let mut ty = Type::unit();
                for statement in &el.children {
                    ty = self.infer(&mut block_env, statement)?;
                }
                Ok(ty)
            }

            Kind::Return => match el.children.first() {
                Some(value) => self.infer(env, value),
                None => Ok(Type::unit()),
            },

            Kind::While => {
                let cond = condition_expr(el)?;
                let cond_ty = self.infer(env, cond)?;
                self.unify(&cond_ty, &Type::bool())?;
                self.infer_child(env, el, 1)?;
                Ok(Type::unit())
            }

            Kind::For => {
                let from = wrapper_expr(el, 0, "from")?;
                let to = wrapper_expr(el, 1, "to")?;
                let from_ty = self.infer(env, from)?;
                self.unify(&from_ty, &Type::int())?;
                let to_ty = self.infer(env, to)?;
                self.unify(&to_ty, &Type::int())?;

                let mut body_env = env.clone();
                if let Some(var) = el.attr("var") {
                    body_env.insert(var, Scheme::mono(Type::int()));
                }
                self.infer_child(&mut body_env, el, 2)?;
                Ok(Type::unit())
            }

            Kind::Condition | Kind::From | Kind::To => match el.children.first() {
                Some(inner) => self.infer(env, inner),
                None => Ok(Type::unit()),
            },

            Kind::Param | Kind::Macro => Ok(Type::unit()),

            Kind::Custom(ref kind) => Err(TypeError::Malformed(format!(
                "unknown node kind '{}'",
                kind
            ))),
        }
    }

    /// `call(f, a1..an)`: instantiate f's scheme, then fold each argument
    /// through a fresh result variable. An arity overflow surfaces as a
    /// unification failure against a non-function type.
    fn infer_call(&mut self, env: &mut TypeEnv, el: &Element) -> Result<Type, TypeError> {
        let name = el
            .name
            .as_deref()
            .ok_or_else(|| TypeError::Malformed("call without a name".to_string()))?;

        // Ad-hoc escape hatch for the one runtime overload: `+` concatenates
        // when a String operand is visible to the checker. With no String in
        // sight it stays the seeded Int -> Int -> Int.
        if name == "+" && el.children.len() == 2 {
            let lhs = self.infer(env, &el.children[0])?;
            let rhs = self.infer(env, &el.children[1])?;
            if self.apply(&lhs) == Type::string() || self.apply(&rhs) == Type::string() {
                self.unify(&lhs, &Type::string())?;
                self.unify(&rhs, &Type::string())?;
                return Ok(Type::string());
            }
            self.unify(&lhs, &Type::int())?;
            self.unify(&rhs, &Type::int())?;
            return Ok(Type::int());
        }

        let scheme = env
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::UnboundIdentifier(name.to_string()))?;
        let mut fn_ty = self.instantiate(&scheme);

        for arg in &el.children {
            let arg_ty = self.infer(env, arg)?;
            let result = self.fresh();
            self.unify(&fn_ty, &Type::fun(arg_ty, result.clone()))?;
            fn_ty = self.apply(&result);
        }
        Ok(fn_ty)
    }

    fn infer_child(
        &mut self,
        env: &mut TypeEnv,
        el: &Element,
        index: usize,
    ) -> Result<Type, TypeError> {
        let child = el.children.get(index).ok_or_else(|| {
            TypeError::Malformed(format!("{} node missing child {}", el.kind, index))
        })?;
        self.infer(env, child)
    }

    fn param_type(&mut self, param: &Element) -> Type {
        match param.attr("type") {
            Some(ty) => Type::con(ty),
            None => self.fresh(),
        }
    }
}

fn rename(t: &Type, mapping: &HashMap<&str, Type>) -> Type {
    match t {
        Type::Var(name) => mapping.get(name.as_str()).cloned().unwrap_or_else(|| t.clone()),
        Type::Con { name, args } => Type::Con {
            name: name.clone(),
            args: args.iter().map(|a| rename(a, mapping)).collect(),
        },
        Type::Fun { from, to } => Type::fun(rename(from, mapping), rename(to, mapping)),
    }
}

fn param_name(param: &Element) -> Result<&str, TypeError> {
    param
        .name
        .as_deref()
        .ok_or_else(|| TypeError::Malformed("param without a name".to_string()))
}

/// Split a `lambda` or `def` node into its params and trailing block.
fn split_lambda(el: &Element) -> Result<(&[Element], &Element), TypeError> {
    let body = el
        .children
        .last()
        .filter(|c| c.kind == Kind::Block)
        .ok_or_else(|| {
            TypeError::Malformed(format!("{} node without a body block", el.kind))
        })?;
    Ok((&el.children[..el.children.len() - 1], body))
}

fn condition_expr(el: &Element) -> Result<&Element, TypeError> {
    el.children
        .first()
        .filter(|c| c.kind == Kind::Condition)
        .and_then(|c| c.children.first())
        .ok_or_else(|| {
            TypeError::Malformed(format!("{} node without a condition", el.kind))
        })
}

fn wrapper_expr<'a>(el: &'a Element, index: usize, expected: &str) -> Result<&'a Element, TypeError> {
    el.children
        .get(index)
        .and_then(|c| c.children.first())
        .ok_or_else(|| {
            TypeError::Malformed(format!("{} node missing {} bound", el.kind, expected))
        })
}
