// ABOUTME: Error types for every pipeline stage, plus the top-level wrapper

use crate::element::Span;
use thiserror::Error;

/// Identifiers beginning with this prefix are reserved for generated names.
pub const RESERVED_PREFIX: &str = "__";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: u32, column: u32 },

    #[error("unterminated string literal starting at line {line}")]
    UnterminatedString { line: u32 },

    #[error("unterminated block comment starting at line {line}")]
    UnterminatedComment { line: u32 },

    #[error("reserved identifier '{name}' at line {line} ('{RESERVED_PREFIX}' prefix is reserved)")]
    ReservedIdentifier { name: String, line: u32 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {found} at line {line}, expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: u32,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("assignment target must be a variable, got {found}")]
    BadAssignTarget { found: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MacroError {
    #[error("macro '{name}': expansion references unbound pattern variable '${var}'")]
    UnboundPatternVar { name: String, var: String },

    #[error("macro expansion exceeded {limit} rounds (possible self-expanding macro)")]
    ExpansionOverflow { limit: usize },

    #[error("malformed macro definition: {reason}")]
    MalformedDefinition { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    #[error("cannot unify {left} with {right}")]
    UnificationFailure { left: String, right: String },

    #[error("occurs check failed: {var} appears in {ty}")]
    OccursCheck { var: String, ty: String },

    #[error("unbound identifier '{0}'")]
    UnboundIdentifier(String),

    #[error("malformed node reached inference: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("{0}")]
    Explicit(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unbound identifier '{name}'{}", .line.as_ref().map(|l| format!(" at line {}", l)).unwrap_or_default())]
    UnboundIdentifier { name: String, line: Option<u32> },

    #[error("{context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("{function}: expected {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("value is not callable: {0}")]
    NotCallable(String),
}

impl RuntimeError {
    /// Create an unbound-name error carrying the referencing node's line
    /// when a span is known
    pub fn unbound(name: impl Into<String>, span: Option<Span>) -> Self {
        RuntimeError::UnboundIdentifier {
            name: name.into(),
            line: span.map(|s| s.line),
        }
    }

    /// Create a type mismatch error with context
    pub fn type_mismatch(context: &str, expected: &str, actual: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            actual: actual.into(),
        }
    }

    /// Create an arity error with expected and actual counts
    pub fn arity(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        RuntimeError::Arity {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransducerError {
    #[error("template references unbound variable '${0}'")]
    UnboundTemplateVar(String),

    #[error("list template produced {count} nodes where a single node is required")]
    ListWhereNodeRequired { count: usize },

    #[error("name expression referenced '${0}', which is not bound to a string")]
    NonStringBinding(String),
}

/// Any failure a pipeline run can surface, tagged by the stage that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreepError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("macro error: {0}")]
    Macro(#[from] MacroError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("transducer error: {0}")]
    Transducer(#[from] TransducerError),
}
