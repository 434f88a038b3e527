// ABOUTME: Tokenizer for TreeP source using nom recognizers and a fixed keyword table

use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_until, take_while},
    character::complete::{char, digit1, multispace1, none_of, one_of},
    combinator::value,
    multi::many0,
    IResult, Parser,
};

use crate::element::Span;
use crate::error::{LexError, RESERVED_PREFIX};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Str(String),

    // Keywords
    Def,
    Let,
    If,
    Else,
    While,
    For,
    Return,
    Macro,
    Pattern,
    Expand,
    Returns,
    True,
    False,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dollar,
    Arrow,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Assign,
}

/// The fixed keyword table. Identifiers are checked against this after
/// recognition; everything else lexes as a plain identifier.
const KEYWORDS: [(&str, TokenKind); 13] = [
    ("def", TokenKind::Def),
    ("let", TokenKind::Let),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("return", TokenKind::Return),
    ("macro", TokenKind::Macro),
    ("pattern", TokenKind::Pattern),
    ("expand", TokenKind::Expand),
    ("returns", TokenKind::Returns),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
];

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Int(n) => write!(f, "integer {}", n),
            TokenKind::Str(s) => write!(f, "string \"{}\"", s),
            other => {
                let text = match other {
                    TokenKind::Def => "def",
                    TokenKind::Let => "let",
                    TokenKind::If => "if",
                    TokenKind::Else => "else",
                    TokenKind::While => "while",
                    TokenKind::For => "for",
                    TokenKind::Return => "return",
                    TokenKind::Macro => "macro",
                    TokenKind::Pattern => "pattern",
                    TokenKind::Expand => "expand",
                    TokenKind::Returns => "returns",
                    TokenKind::True => "true",
                    TokenKind::False => "false",
                    TokenKind::LParen => "(",
                    TokenKind::RParen => ")",
                    TokenKind::LBrace => "{",
                    TokenKind::RBrace => "}",
                    TokenKind::Comma => ",",
                    TokenKind::Colon => ":",
                    TokenKind::Dollar => "$",
                    TokenKind::Arrow => "->",
                    TokenKind::Plus => "+",
                    TokenKind::Minus => "-",
                    TokenKind::Star => "*",
                    TokenKind::Slash => "/",
                    TokenKind::Percent => "%",
                    TokenKind::Lt => "<",
                    TokenKind::Gt => ">",
                    TokenKind::Le => "<=",
                    TokenKind::Ge => ">=",
                    TokenKind::EqEq => "==",
                    TokenKind::NotEq => "!=",
                    TokenKind::AndAnd => "&&",
                    TokenKind::OrOr => "||",
                    TokenKind::Bang => "!",
                    TokenKind::Assign => "=",
                    _ => unreachable!(),
                };
                write!(f, "'{}'", text)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// ============================================================================
// Token Recognizers
// ============================================================================

/// Skip whitespace, line comments (//) and block comments (/* ... */).
/// An unterminated block comment is left unconsumed for the driver to report.
fn ws_and_comments(input: &str) -> IResult<&str, ()> {
    many0(alt((
        value((), multispace1),
        value((), (tag("//"), take_while(|c| c != '\n'))),
        value((), (tag("/*"), take_until("*/"), tag("*/"))),
    )))
    .map(|_| ())
    .parse(input)
}

fn lex_int(input: &str) -> IResult<&str, TokenKind> {
    digit1
        .map(|digits: &str| {
            // digit1 bounds the literal; overflow saturates rather than panics
            TokenKind::Int(digits.parse::<i64>().unwrap_or(i64::MAX))
        })
        .parse(input)
}

/// Parse a double-quoted string with \", \\, \n, \t escapes.
fn lex_string(input: &str) -> IResult<&str, TokenKind> {
    let (input, _) = char('"')(input)?;

    // Empty string short-circuit
    if let Ok((input, _)) = char::<_, nom::error::Error<_>>('"')(input) {
        return Ok((input, TokenKind::Str(String::new())));
    }

    let (input, content) = escaped(none_of("\"\\"), '\\', one_of("\"\\nt"))(input)?;
    let (input, _) = char('"')(input)?;

    let mut result = String::new();
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    Ok((input, TokenKind::Str(result)))
}

fn lex_ident(input: &str) -> IResult<&str, TokenKind> {
    let (input, first) = one_of("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_")(input)?;
    let (input, rest) = take_while::<_, _, nom::error::Error<_>>(|c: char| {
        c.is_alphanumeric() || c == '_'
    })(input)?;

    let mut word = String::new();
    word.push(first);
    word.push_str(rest);

    for (text, kind) in &KEYWORDS {
        if *text == word {
            return Ok((input, kind.clone()));
        }
    }
    Ok((input, TokenKind::Ident(word)))
}

/// Multi-character operators must be tried before their prefixes.
fn lex_operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        alt((
            value(TokenKind::Arrow, tag("->")),
            value(TokenKind::Le, tag("<=")),
            value(TokenKind::Ge, tag(">=")),
            value(TokenKind::EqEq, tag("==")),
            value(TokenKind::NotEq, tag("!=")),
            value(TokenKind::AndAnd, tag("&&")),
            value(TokenKind::OrOr, tag("||")),
        )),
        alt((
            value(TokenKind::Plus, char('+')),
            value(TokenKind::Minus, char('-')),
            value(TokenKind::Star, char('*')),
            value(TokenKind::Slash, char('/')),
            value(TokenKind::Percent, char('%')),
            value(TokenKind::Lt, char('<')),
            value(TokenKind::Gt, char('>')),
            value(TokenKind::Bang, char('!')),
            value(TokenKind::Assign, char('=')),
            value(TokenKind::LParen, char('(')),
            value(TokenKind::RParen, char(')')),
            value(TokenKind::LBrace, char('{')),
            value(TokenKind::RBrace, char('}')),
            value(TokenKind::Comma, char(',')),
            value(TokenKind::Colon, char(':')),
            value(TokenKind::Dollar, char('$')),
        )),
    ))
    .parse(input)
}

fn lex_token(input: &str) -> IResult<&str, TokenKind> {
    alt((lex_string, lex_ident, lex_int, lex_operator)).parse(input)
}

// ============================================================================
// Driver
// ============================================================================

/// Walk `consumed` updating line/column counters.
fn advance_position(consumed: &str, line: &mut u32, column: &mut u32) {
    for c in consumed.chars() {
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    }
}

/// Tokenize an entire source string.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut offset = 0usize;
    let mut line = 1u32;
    let mut column = 1u32;

    loop {
        // Whitespace and comments carry no tokens but move the cursor
        if let Ok((after, ())) = ws_and_comments(rest) {
            let consumed = &rest[..rest.len() - after.len()];
            advance_position(consumed, &mut line, &mut column);
            offset += consumed.len();
            rest = after;
        }

        if rest.is_empty() {
            return Ok(tokens);
        }

        // ws_and_comments consumes terminated block comments only
        if rest.starts_with("/*") {
            return Err(LexError::UnterminatedComment { line });
        }

        match lex_token(rest) {
            Ok((after, kind)) => {
                let len = rest.len() - after.len();

                if let TokenKind::Ident(name) = &kind {
                    if name.starts_with(RESERVED_PREFIX) {
                        return Err(LexError::ReservedIdentifier {
                            name: name.clone(),
                            line,
                        });
                    }
                }

                let span = Span {
                    start: offset,
                    end: offset + len,
                    line,
                    column,
                };
                tokens.push(Token { kind, span });

                advance_position(&rest[..len], &mut line, &mut column);
                offset += len;
                rest = after;
            }
            Err(_) => {
                if rest.starts_with('"') {
                    return Err(LexError::UnterminatedString { line });
                }
                let ch = rest.chars().next().unwrap_or('\0');
                return Err(LexError::UnexpectedChar { ch, line, column });
            }
        }
    }
}
