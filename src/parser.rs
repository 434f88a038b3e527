// ABOUTME: Recursive-descent parser producing the concrete syntax tree (CST)

use crate::element::Span;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

/// A parameter declaration in a `def`, with an optional type annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: Option<String>,
}

/// Concrete syntax node. Mirrors source structure; the normalizer lowers
/// this into the uniform Element tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Cst {
    pub node: CstNode,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CstNode {
    Def {
        name: String,
        params: Vec<ParamDecl>,
        returns: Option<String>,
        body: Vec<Cst>,
    },
    Let {
        name: String,
        ty: Option<String>,
        value: Box<Cst>,
    },
    If {
        cond: Box<Cst>,
        then_body: Vec<Cst>,
        else_body: Option<Vec<Cst>>,
    },
    While {
        cond: Box<Cst>,
        body: Vec<Cst>,
    },
    For {
        var: String,
        from: Box<Cst>,
        to: Box<Cst>,
        body: Vec<Cst>,
    },
    Return(Option<Box<Cst>>),
    Lambda {
        params: Vec<String>,
        body: Vec<Cst>,
    },
    MacroDef {
        name: String,
        params: Vec<String>,
        body: Vec<Cst>,
    },
    Binary {
        op: String,
        lhs: Box<Cst>,
        rhs: Box<Cst>,
    },
    Unary {
        op: String,
        expr: Box<Cst>,
    },
    Call {
        callee: String,
        args: Vec<Cst>,
        block: Option<Vec<Cst>>,
    },
    Var(String),
    /// `$x` - a macro pattern variable, only meaningful inside `expand` bodies
    MacroVar(String),
    Int(i64),
    Str(String),
    Bool(bool),
}

/// Parse a token stream into top-level statements.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Cst>, ParseError> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    // ===== Token access =====

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or(Span {
                start: 0,
                end: 0,
                line: 1,
                column: 1,
            })
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        match self.tokens.get(self.pos) {
            Some(token) if token.kind == *kind => {
                self.pos += 1;
                Ok(token.clone())
            }
            Some(token) => Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
                line: token.span.line,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(String, Span), ParseError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token {
                kind: TokenKind::Ident(name),
                span,
            }) => {
                self.pos += 1;
                Ok((name, span))
            }
            Some(token) => Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.to_string(),
                line: token.span.line,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
    }

    /// Span from a construct's first token to the last token consumed.
    fn closed_span(&self, start: Span) -> Span {
        let end = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span.end)
            .unwrap_or(start.end);
        Span {
            start: start.start,
            end,
            line: start.line,
            column: start.column,
        }
    }

    // ===== Statements =====

    fn parse_program(mut self) -> Result<Vec<Cst>, ParseError> {
        let mut statements = Vec::new();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Cst, ParseError> {
        match self.peek() {
            Some(TokenKind::Def) => self.parse_def(),
            Some(TokenKind::Let) => self.parse_let(),
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::While) => self.parse_while(),
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::Macro) => self.parse_macro_def(),
            _ => self.parse_expr(),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Cst>, ParseError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof {
                    expected: "'}'".to_string(),
                });
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(statements)
    }

    /// `def F(p1: T1, ...) returns: R { body }` - annotations optional
    fn parse_def(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::Def, "'def'")?;
        let (name, _) = self.expect_ident("function name")?;

        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let (pname, _) = self.expect_ident("parameter name")?;
                let ty = if self.eat(&TokenKind::Colon) {
                    Some(self.expect_ident("parameter type")?.0)
                } else {
                    None
                };
                params.push(ParamDecl { name: pname, ty });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;

        let returns = if self.eat(&TokenKind::Returns) {
            self.expect(&TokenKind::Colon, "':'")?;
            Some(self.expect_ident("return type")?.0)
        } else {
            None
        };

        let body = self.parse_block()?;
        Ok(Cst {
            node: CstNode::Def {
                name,
                params,
                returns,
                body,
            },
            span: self.closed_span(start),
        })
    }

    fn parse_let(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::Let, "'let'")?;
        let (name, _) = self.expect_ident("variable name")?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.expect_ident("type")?.0)
        } else {
            None
        };
        self.expect(&TokenKind::Assign, "'='")?;
        let value = self.parse_expr()?;
        Ok(Cst {
            node: CstNode::Let {
                name,
                ty,
                value: Box::new(value),
            },
            span: self.closed_span(start),
        })
    }

    fn parse_if(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::If, "'if'")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let then_body = self.parse_block()?;

        let else_body = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                // `else if` chains nest as a single-statement else block
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Cst {
            node: CstNode::If {
                cond: Box::new(cond),
                then_body,
                else_body,
            },
            span: self.closed_span(start),
        })
    }

    fn parse_while(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::While, "'while'")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Cst {
            node: CstNode::While {
                cond: Box::new(cond),
                body,
            },
            span: self.closed_span(start),
        })
    }

    /// `for (i = a, b) { body }` - iterates i from a to b inclusive
    fn parse_for(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::For, "'for'")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let (var, _) = self.expect_ident("loop variable")?;
        self.expect(&TokenKind::Assign, "'='")?;
        let from = self.parse_expr()?;
        self.expect(&TokenKind::Comma, "','")?;
        let to = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Ok(Cst {
            node: CstNode::For {
                var,
                from: Box::new(from),
                to: Box::new(to),
                body,
            },
            span: self.closed_span(start),
        })
    }

    fn parse_return(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::Return, "'return'")?;

        // A bare `return` ends at a closing brace or the next statement keyword
        let has_value = match self.peek() {
            None | Some(TokenKind::RBrace) => false,
            Some(kind) => !starts_statement_keyword(kind),
        };
        let value = if has_value {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        Ok(Cst {
            node: CstNode::Return(value),
            span: self.closed_span(start),
        })
    }

    /// `macro NAME pattern($p1, ..., $pk) expand { body }`
    fn parse_macro_def(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::Macro, "'macro'")?;
        let (name, _) = self.expect_ident("macro name")?;
        self.expect(&TokenKind::Pattern, "'pattern'")?;
        self.expect(&TokenKind::LParen, "'('")?;

        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                self.expect(&TokenKind::Dollar, "'$'")?;
                params.push(self.expect_ident("pattern variable")?.0);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::Expand, "'expand'")?;
        let body = self.parse_block()?;

        Ok(Cst {
            node: CstNode::MacroDef { name, params, body },
            span: self.closed_span(start),
        })
    }

    // ===== Expressions (precedence climbing, low to high) =====

    fn parse_expr(&mut self) -> Result<Cst, ParseError> {
        self.parse_assign()
    }

    /// Assignment is right-associative and lowest precedence.
    fn parse_assign(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        let lhs = self.parse_or()?;
        if self.eat(&TokenKind::Assign) {
            let rhs = self.parse_assign()?;
            return Ok(Cst {
                node: CstNode::Binary {
                    op: "=".to_string(),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span: self.closed_span(start),
            });
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Cst, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.at(&TokenKind::OrOr) {
            let start = lhs.span;
            self.advance();
            let rhs = self.parse_and()?;
            lhs = self.binary("||", lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Cst, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.at(&TokenKind::AndAnd) {
            let start = lhs.span;
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = self.binary("&&", lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Cst, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::EqEq) => "==",
                Some(TokenKind::NotEq) => "!=",
                _ => break,
            };
            let start = lhs.span;
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = self.binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Cst, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Lt) => "<",
                Some(TokenKind::Gt) => ">",
                Some(TokenKind::Le) => "<=",
                Some(TokenKind::Ge) => ">=",
                _ => break,
            };
            let start = lhs.span;
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = self.binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Cst, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => "+",
                Some(TokenKind::Minus) => "-",
                _ => break,
            };
            let start = lhs.span;
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = self.binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Cst, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => "*",
                Some(TokenKind::Slash) => "/",
                Some(TokenKind::Percent) => "%",
                _ => break,
            };
            let start = lhs.span;
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = self.binary(op, lhs, rhs, start);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        let op = match self.peek() {
            Some(TokenKind::Bang) => Some("!"),
            Some(TokenKind::Minus) => Some("-"),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Cst {
                node: CstNode::Unary {
                    op: op.to_string(),
                    expr: Box::new(expr),
                },
                span: self.closed_span(start),
            });
        }
        self.parse_call()
    }

    /// `primary ("(" args? ")" ("{" block "}")?)?` - calls form on plain
    /// names only. A '(' after anything else starts the next statement, so
    /// applying the result of another expression is not supported.
    fn parse_call(&mut self) -> Result<Cst, ParseError> {
        let primary = self.parse_primary()?;

        let callee = match &primary.node {
            CstNode::Var(name) if self.at(&TokenKind::LParen) => name.clone(),
            _ => return Ok(primary),
        };
        let start = primary.span;
        self.advance(); // (

        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;

        // Trailing brace block becomes an extra argument during normalization
        let block = if self.at(&TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Cst {
            node: CstNode::Call {
                callee,
                args,
                block,
            },
            span: self.closed_span(start),
        })
    }

    fn parse_primary(&mut self) -> Result<Cst, ParseError> {
        let span = self.current_span();
        match self.peek().cloned() {
            Some(TokenKind::Int(n)) => {
                self.advance();
                Ok(Cst {
                    node: CstNode::Int(n),
                    span,
                })
            }
            Some(TokenKind::Str(s)) => {
                self.advance();
                Ok(Cst {
                    node: CstNode::Str(s),
                    span,
                })
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Cst {
                    node: CstNode::Bool(true),
                    span,
                })
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Cst {
                    node: CstNode::Bool(false),
                    span,
                })
            }
            Some(TokenKind::Ident(name)) => {
                self.advance();
                Ok(Cst {
                    node: CstNode::Var(name),
                    span,
                })
            }
            Some(TokenKind::Dollar) => {
                self.advance();
                let (name, _) = self.expect_ident("pattern variable")?;
                Ok(Cst {
                    node: CstNode::MacroVar(name),
                    span: self.closed_span(span),
                })
            }
            // `if` is expression-valued (its type is the branches' type)
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::LParen) => {
                if self.lambda_ahead() {
                    self.parse_lambda()
                } else {
                    self.advance();
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::RParen, "')'")?;
                    Ok(expr)
                }
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found: other.to_string(),
                line: span.line,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: "expression".to_string(),
            }),
        }
    }

    /// Lookahead from a '(' for the shape `(p1, ..., pn) ->` without consuming.
    fn lambda_ahead(&self) -> bool {
        let mut n = 1;
        if self.peek_at(n) == Some(&TokenKind::RParen) {
            return self.peek_at(n + 1) == Some(&TokenKind::Arrow);
        }
        loop {
            match self.peek_at(n) {
                Some(TokenKind::Ident(_)) => n += 1,
                _ => return false,
            }
            match self.peek_at(n) {
                Some(TokenKind::Comma) => n += 1,
                Some(TokenKind::RParen) => {
                    return self.peek_at(n + 1) == Some(&TokenKind::Arrow);
                }
                _ => return false,
            }
        }
    }

    /// `(p...) -> { body }`
    fn parse_lambda(&mut self) -> Result<Cst, ParseError> {
        let start = self.current_span();
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident("parameter name")?.0);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::Arrow, "'->'")?;
        let body = self.parse_block()?;
        Ok(Cst {
            node: CstNode::Lambda { params, body },
            span: self.closed_span(start),
        })
    }

    fn binary(&self, op: &str, lhs: Cst, rhs: Cst, start: Span) -> Cst {
        Cst {
            node: CstNode::Binary {
                op: op.to_string(),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span: self.closed_span(start),
        }
    }
}

fn starts_statement_keyword(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Def
            | TokenKind::Let
            | TokenKind::If
            | TokenKind::While
            | TokenKind::For
            | TokenKind::Return
            | TokenKind::Macro
            | TokenKind::Else
    )
}
