// ABOUTME: Library module exposing the TreeP pipeline and its components

pub mod builtins;
pub mod config;
pub mod element;
pub mod env;
pub mod error;
pub mod eval;
pub mod infer;
pub mod lexer;
pub mod macros;
pub mod normalizer;
pub mod parser;
pub mod transducer;
pub mod types;
pub mod value;

use element::Element;
use error::TreepError;
use infer::Inferencer;
use macros::MacroRegistry;
use types::TypeEnv;
use value::Value;

/// Lex, parse, and normalize a source string into ET statements.
pub fn to_elements(source: &str) -> Result<Vec<Element>, TreepError> {
    let tokens = lexer::lex(source)?;
    let program = parser::parse(tokens)?;
    Ok(normalizer::normalize_program(&program)?)
}

/// `to_elements` plus macro expansion. User `macro` definitions are
/// registered and consumed along the way.
pub fn expand_source(source: &str) -> Result<Vec<Element>, TreepError> {
    let program = to_elements(source)?;
    let mut registry = MacroRegistry::new();
    Ok(registry.expand_program(program)?)
}

/// Expand and type-check, returning the expanded program and the type
/// environment holding every top-level scheme.
pub fn infer_source(source: &str) -> Result<(Vec<Element>, TypeEnv), TreepError> {
    let program = expand_source(source)?;
    let mut env = infer::prelude();
    let mut inferencer = Inferencer::new();
    inferencer.infer_program(&mut env, &program)?;
    Ok((program, env))
}

/// The whole pipeline: expand, type-check, then interpret. The result is
/// `main`'s return value, or the last top-level statement's value.
pub fn run_source(source: &str) -> Result<Value, TreepError> {
    let (program, _) = infer_source(source)?;
    Ok(eval::run_program(&program)?)
}

/// Run without the type-checking stage (still expanded).
pub fn run_unchecked(source: &str) -> Result<Value, TreepError> {
    let program = expand_source(source)?;
    Ok(eval::run_program(&program)?)
}
