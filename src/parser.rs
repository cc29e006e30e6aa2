//! Parser for Helios
//!
//! Recursive descent with operator-precedence climbing for binary
//! expressions. The parser pulls tokens from the lexer through a small
//! push-back buffer (three tokens of lookahead suffice for every
//! disambiguation in the grammar).
//!
//! Failures are unrecoverable for the current unit: any malformed construct
//! aborts with a descriptive error and no partial AST is returned. There is
//! no resynchronization.

use crate::ast::{Expr, File, Function, Prototype};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};
use std::collections::HashMap;
use thiserror::Error;

/// Name given to the anonymous function wrapping a single top-level
/// expression in the incremental (interactive) entry point.
pub const ANON_SYMBOL: &str = "__anon_expr";

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {found:?}: expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("invalid number literal: {text:?}")]
    BadNumber { text: String, span: Span },

    #[error("{0}")]
    Lexical(String),
}

/// Parse result
pub type ParseResult<T> = Result<T, ParseError>;

/// Classification of the next top-level construct, for incremental drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToplevelKind {
    Def,
    Extern,
    Expression,
}

/// The parser for Helios. One parser per source unit; not reusable.
pub struct Parser<'src> {
    /// Unit name, used only for diagnostics and the resulting `File`
    name: String,
    lexer: Lexer<'src>,
    /// Push-back buffer; the most recently pushed token is consumed first
    lookahead: Vec<Token>,
    /// Binary operator precedence; higher binds tighter
    binop_prec: HashMap<char, i32>,
}

impl<'src> Parser<'src> {
    /// Create a new parser for one source unit
    pub fn new(name: impl Into<String>, source: &'src str) -> Self {
        let mut binop_prec = HashMap::new();
        binop_prec.insert('<', 10);
        binop_prec.insert('+', 20);
        binop_prec.insert('-', 20);
        binop_prec.insert('*', 40);

        Self {
            name: name.into(),
            lexer: Lexer::new(source),
            lookahead: Vec::new(),
            binop_prec,
        }
    }

    /// Register a user-declared binary operator with its precedence.
    ///
    /// Updates both the lexer's fixity table and this parser's precedence
    /// table; must happen before the operator is scanned.
    pub fn register_binary_operator(&mut self, op: char, precedence: i32) {
        self.lexer.register_binary(op);
        self.binop_prec.insert(op, precedence);
    }

    /// Register a user-declared unary operator character.
    pub fn register_unary_operator(&mut self, op: char) {
        self.lexer.register_unary(op);
    }

    // ============ Token plumbing ============

    fn next(&mut self) -> Token {
        match self.lookahead.pop() {
            Some(token) => token,
            None => self.lexer.next_token(),
        }
    }

    /// Re-examine an already-consumed token
    fn push_back(&mut self, token: Token) {
        debug_assert!(self.lookahead.len() < 3);
        self.lookahead.push(token);
    }

    fn peek(&mut self) -> &Token {
        if self.lookahead.is_empty() {
            let token = self.lexer.next_token();
            self.lookahead.push(token);
        }
        self.lookahead.last().unwrap()
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    /// Build the error for a token that does not fit the grammar here.
    /// A lexical error token surfaces its own diagnostic instead.
    fn unexpected(&mut self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.kind == TokenKind::Error {
            return ParseError::Lexical(token.text.clone());
        }
        let found = if token.text.is_empty() {
            token.kind.to_string()
        } else {
            token.text.clone()
        };
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found,
            span: token.span,
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.peek_kind() == kind {
            Ok(self.next())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Precedence of a binary operator character; -1 if not a binary op
    fn token_precedence(&self, op: char) -> i32 {
        self.binop_prec.get(&op).copied().unwrap_or(-1)
    }

    // ============ Top-level parsing ============

    /// Classify the next top-level construct without committing to it
    pub fn toplevel_kind(&mut self) -> ToplevelKind {
        let token = self.next();
        let kind = match token.kind {
            TokenKind::Def => ToplevelKind::Def,
            TokenKind::Extern => ToplevelKind::Extern,
            _ => ToplevelKind::Expression,
        };
        self.push_back(token);
        kind
    }

    /// Parse a whole source unit
    pub fn parse_file(&mut self) -> ParseResult<File> {
        let mut file = File::new(self.name.clone());
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Def => file.defs.push(self.parse_definition()?),
                TokenKind::Extern => file.externs.push(self.parse_extern()?),
                TokenKind::Semi => {
                    // separator, ignored
                    self.next();
                }
                TokenKind::Error => return Err(self.unexpected("top-level construct")),
                _ => file.exprs.push(self.parse_expression()?),
            }
        }
        Ok(file)
    }

    /// Parse a function definition: `def prototype expr`
    pub fn parse_definition(&mut self) -> ParseResult<Function> {
        self.expect(TokenKind::Def, "'def'")?;
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function { prototype, body })
    }

    /// Parse an external declaration: `extern prototype`
    pub fn parse_extern(&mut self) -> ParseResult<Prototype> {
        self.expect(TokenKind::Extern, "'extern'")?;
        self.parse_prototype()
    }

    /// Parse a single top-level expression wrapped into an anonymous
    /// zero-argument function, for immediate lowering
    pub fn parse_top_level_expr(&mut self) -> ParseResult<Function> {
        let body = self.parse_expression()?;
        Ok(Function {
            prototype: Prototype {
                name: ANON_SYMBOL.to_string(),
                args: Vec::new(),
            },
            body,
        })
    }

    fn parse_prototype(&mut self) -> ParseResult<Prototype> {
        let name = self.expect(TokenKind::Ident, "function name")?.text;
        self.expect(TokenKind::LParen, "'('")?;

        let mut args = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                let arg = self.expect(TokenKind::Ident, "parameter name")?;
                args.push(arg.text);

                if self.peek_kind() == TokenKind::RParen {
                    break;
                }
                self.expect(TokenKind::Comma, "','")?;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        Ok(Prototype { name, args })
    }

    // ============ Expression parsing ============

    /// Parse a full expression
    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_primary()?;
        self.parse_binop_rhs(0, lhs)
    }

    /// Precedence climbing: absorb binary operators binding at least as
    /// tightly as `expr_prec` into `lhs`.
    fn parse_binop_rhs(&mut self, expr_prec: i32, mut lhs: Expr) -> ParseResult<Expr> {
        loop {
            let op = match self.peek().op_char() {
                Some(op) => op,
                None => return Ok(lhs),
            };
            let prec = self.token_precedence(op);
            if prec < expr_prec {
                return Ok(lhs);
            }
            // consume the operator
            self.next();

            let mut rhs = self.parse_primary()?;

            // If the operator after rhs binds tighter, let it take rhs
            // as its lhs first.
            let next_op = self.peek().op_char();
            let next_prec = match next_op {
                Some(c) => self.token_precedence(c),
                None => -1,
            };
            if prec < next_prec {
                rhs = self.parse_binop_rhs(prec + 1, rhs)?;
            }

            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.peek_kind() {
            TokenKind::Number => self.parse_number(),
            TokenKind::Ident => self.parse_identifier(),
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::If => self.parse_if_expr(),
            TokenKind::For => self.parse_for_expr(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_number(&mut self) -> ParseResult<Expr> {
        let token = self.next();
        match token.text.parse::<f64>() {
            Ok(value) => Ok(Expr::Number(value)),
            Err(_) => Err(ParseError::BadNumber {
                text: token.text,
                span: token.span,
            }),
        }
    }

    /// A bare variable, or a call if the identifier is followed by `(`
    fn parse_identifier(&mut self) -> ParseResult<Expr> {
        let name = self.next().text;

        if self.peek_kind() != TokenKind::LParen {
            return Ok(Expr::Variable(name));
        }
        // consume '('
        self.next();

        let mut args = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                args.push(self.parse_expression()?);
                if self.peek_kind() == TokenKind::RParen {
                    break;
                }
                self.expect(TokenKind::Comma, "','")?;
            }
        }
        // consume ')'
        self.next();

        Ok(Expr::Call { callee: name, args })
    }

    fn parse_paren_expr(&mut self) -> ParseResult<Expr> {
        // consume '('
        self.next();
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_if_expr(&mut self) -> ParseResult<Expr> {
        // consume 'if'
        self.next();
        let cond = self.parse_expression()?;

        self.expect(TokenKind::Then, "'then'")?;
        let then = self.parse_expression()?;

        self.expect(TokenKind::Else, "'else'")?;
        let els = self.parse_expression()?;

        Ok(Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
        })
    }

    /// `for name = start , end [, step] in body`
    fn parse_for_expr(&mut self) -> ParseResult<Expr> {
        // consume 'for'
        self.next();

        let var = self.expect(TokenKind::Ident, "identifier after 'for'")?.text;
        self.expect(TokenKind::Eq, "'=' after for-loop variable")?;
        let start = self.parse_expression()?;

        self.expect(TokenKind::Comma, "',' after for-loop start value")?;
        let end = self.parse_expression()?;

        let step = if self.peek_kind() == TokenKind::Comma {
            self.next();
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        self.expect(TokenKind::In, "'in' after for-loop header")?;
        let body = self.parse_expression()?;

        Ok(Expr::For {
            var,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body: Box::new(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(op: char, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[test]
    fn test_precedence_mul_right() {
        let mut p = Parser::new("test", "1 + 2 * 3");
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            binary(
                '+',
                Expr::Number(1.0),
                binary('*', Expr::Number(2.0), Expr::Number(3.0)),
            )
        );
    }

    #[test]
    fn test_precedence_mul_left() {
        let mut p = Parser::new("test", "1 * 2 + 3");
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            binary(
                '+',
                binary('*', Expr::Number(1.0), Expr::Number(2.0)),
                Expr::Number(3.0),
            )
        );
    }

    #[test]
    fn test_left_associativity() {
        let mut p = Parser::new("test", "1 - 2 - 3");
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            binary(
                '-',
                binary('-', Expr::Number(1.0), Expr::Number(2.0)),
                Expr::Number(3.0),
            )
        );
    }

    #[test]
    fn test_paren_grouping() {
        let mut p = Parser::new("test", "(1 + 2) * 3");
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            binary(
                '*',
                binary('+', Expr::Number(1.0), Expr::Number(2.0)),
                Expr::Number(3.0),
            )
        );
    }

    #[test]
    fn test_parse_extern() {
        let mut p = Parser::new("test", "extern pow(x, y)");
        let proto = p.parse_extern().unwrap();
        assert_eq!(
            proto,
            Prototype {
                name: "pow".to_string(),
                args: vec!["x".to_string(), "y".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_definition() {
        let mut p = Parser::new("test", "def add(x, y) x + y");
        let func = p.parse_definition().unwrap();
        assert_eq!(func.prototype.name, "add");
        assert_eq!(func.prototype.args, vec!["x", "y"]);
        assert_eq!(
            func.body,
            binary(
                '+',
                Expr::Variable("x".to_string()),
                Expr::Variable("y".to_string()),
            )
        );
    }

    #[test]
    fn test_parse_empty_call() {
        let mut p = Parser::new("test", "f()\n");
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                callee: "f".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_parse_if() {
        let mut p = Parser::new("test", "if 2 < 3 then 1 else 2");
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            Expr::If {
                cond: Box::new(binary('<', Expr::Number(2.0), Expr::Number(3.0))),
                then: Box::new(Expr::Number(1.0)),
                els: Box::new(Expr::Number(2.0)),
            }
        );
    }

    #[test]
    fn test_parse_for_with_step() {
        let mut p = Parser::new("test", "for i = 1, i < n, 1.0 in i");
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            Expr::For {
                var: "i".to_string(),
                start: Box::new(Expr::Number(1.0)),
                end: Box::new(binary(
                    '<',
                    Expr::Variable("i".to_string()),
                    Expr::Variable("n".to_string()),
                )),
                step: Some(Box::new(Expr::Number(1.0))),
                body: Box::new(Expr::Variable("i".to_string())),
            }
        );
    }

    #[test]
    fn test_parse_for_default_step() {
        let mut p = Parser::new("test", "for i = 1, i < 10 in f(i)");
        match p.parse_expression().unwrap() {
            Expr::For { step, .. } => assert_eq!(step, None),
            other => panic!("expected for expression, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_file() {
        let source = "extern sin(x); def f(a) a + 1; f(2); sin(3)";
        let mut p = Parser::new("unit", source);
        let file = p.parse_file().unwrap();
        assert_eq!(file.name, "unit");
        assert_eq!(file.externs.len(), 1);
        assert_eq!(file.defs.len(), 1);
        assert_eq!(file.exprs.len(), 2);
    }

    #[test]
    fn test_toplevel_kind_pushes_back() {
        let mut p = Parser::new("test", "def f(x) x");
        assert_eq!(p.toplevel_kind(), ToplevelKind::Def);
        // Classification must not consume anything.
        assert!(p.parse_definition().is_ok());
    }

    #[test]
    fn test_toplevel_expr_wrapper() {
        let mut p = Parser::new("test", "1 + 2");
        let func = p.parse_top_level_expr().unwrap();
        assert_eq!(func.prototype.name, ANON_SYMBOL);
        assert!(func.prototype.args.is_empty());
    }

    #[test]
    fn test_missing_then() {
        let mut p = Parser::new("test", "if 1 1 else 2");
        let err = p.parse_expression().unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
        assert!(err.to_string().contains("'then'"));
    }

    #[test]
    fn test_missing_rparen() {
        let mut p = Parser::new("test", "(1 + 2");
        let err = p.parse_expression().unwrap_err();
        assert!(err.to_string().contains("')'"));
    }

    #[test]
    fn test_missing_for_eq() {
        let mut p = Parser::new("test", "for i 1, 10 in i");
        let err = p.parse_expression().unwrap_err();
        assert!(err.to_string().contains("'='"));
    }

    #[test]
    fn test_non_identifier_parameter() {
        let mut p = Parser::new("test", "def f(1) 1");
        let err = p.parse_definition().unwrap_err();
        assert!(err.to_string().contains("parameter name"));
    }

    #[test]
    fn test_lexical_error_propagates() {
        let mut p = Parser::new("test", "1 + 123.4asd");
        let err = p.parse_expression().unwrap_err();
        assert_eq!(
            err,
            ParseError::Lexical(r#"bad number syntax: "123.4a""#.to_string())
        );
    }

    #[test]
    fn test_hex_literal_rejected_as_number() {
        // 0x1F lexes as one number token but is not a valid f64 literal.
        let mut p = Parser::new("test", "0x1F");
        let err = p.parse_expression().unwrap_err();
        assert!(matches!(err, ParseError::BadNumber { .. }));
    }

    #[test]
    fn test_user_binary_operator() {
        let mut p = Parser::new("test", "a | b | c");
        p.register_binary_operator('|', 5);
        let expr = p.parse_expression().unwrap();
        assert_eq!(
            expr,
            binary(
                '|',
                binary(
                    '|',
                    Expr::Variable("a".to_string()),
                    Expr::Variable("b".to_string()),
                ),
                Expr::Variable("c".to_string()),
            )
        );
    }

    #[test]
    fn test_slash_is_not_a_binary_operator() {
        // '/' tokenizes but carries no precedence, so the expression stops
        // after the first primary and the file loop then trips over it.
        let mut p = Parser::new("test", "4 / 2");
        let err = p.parse_file().unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }
}
