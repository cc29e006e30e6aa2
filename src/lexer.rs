//! Lexer for Helios
//!
//! The lexer converts source text into a stream of tokens, pulled one at a
//! time by the parser. The static token classes are scanned by `logos`; this
//! wrapper adds what the derive cannot express:
//!
//! - the mutable table of user-declared operator characters, which reclassify
//!   both otherwise-unrecognized characters and the fixed operator set;
//! - the rule that a number run immediately followed by an identifier
//!   character is malformed;
//! - error delivery as a token of kind `Error` carrying the diagnostic, after
//!   which the scan stops permanently.

use crate::span::Span;
use crate::token::{Token, TokenKind};
use logos::Logos;
use std::collections::HashMap;

/// Fixity of a user-declared operator character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Unary,
    Binary,
}

/// The lexer for Helios
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    peeked: Option<Token>,
    user_operators: HashMap<char, Fixity>,
    /// Set once EOF or an error token has been produced
    done: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source text
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
            peeked: None,
            user_operators: HashMap::new(),
            done: false,
        }
    }

    /// Get the source text
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Register a character as a user-declared unary operator.
    ///
    /// Must happen before the character is scanned; already-produced tokens
    /// are not reclassified.
    pub fn register_unary(&mut self, op: char) {
        self.user_operators.insert(op, Fixity::Unary);
    }

    /// Register a character as a user-declared binary operator.
    pub fn register_binary(&mut self, op: char) {
        self.user_operators.insert(op, Fixity::Binary);
    }

    /// Peek at the next token without consuming it
    pub fn peek(&mut self) -> &Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan());
        }
        self.peeked.as_ref().unwrap()
    }

    /// Get the next token. After EOF or a lexical error this keeps
    /// returning `Eof`.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.peeked.take() {
            return token;
        }
        self.scan()
    }

    fn scan(&mut self) -> Token {
        if self.done {
            return self.eof_token();
        }
        match self.inner.next() {
            Some(Ok(kind)) => {
                let span = self.inner.span();
                let span = Span::new(span.start, span.end);
                let text = self.inner.slice();

                match kind {
                    TokenKind::Number => self.check_number(text, span),
                    // A fixed operator character may have been re-declared
                    // as a user operator; the user table takes precedence.
                    TokenKind::Eq
                    | TokenKind::Plus
                    | TokenKind::Minus
                    | TokenKind::Star
                    | TokenKind::Slash
                    | TokenKind::Lt => {
                        let ch = text.chars().next().unwrap();
                        let kind = match self.user_operators.get(&ch) {
                            Some(Fixity::Unary) => TokenKind::UserUnaryOp,
                            Some(Fixity::Binary) => TokenKind::UserBinaryOp,
                            None => kind,
                        };
                        Token::new(kind, text, span)
                    }
                    _ => Token::new(kind, text, span),
                }
            }
            Some(Err(())) => {
                let span = self.inner.span();
                let span = Span::new(span.start, span.end);
                let ch = self.source[span.start..]
                    .chars()
                    .next()
                    .unwrap_or('\u{FFFD}');
                match self.user_operators.get(&ch) {
                    Some(Fixity::Unary) => {
                        Token::new(TokenKind::UserUnaryOp, ch.to_string(), span)
                    }
                    Some(Fixity::Binary) => {
                        Token::new(TokenKind::UserBinaryOp, ch.to_string(), span)
                    }
                    None => self.error(format!("unrecognized character: {:?}", ch), span),
                }
            }
            None => {
                self.done = true;
                self.eof_token()
            }
        }
    }

    /// Reject a number run glued to an identifier character, e.g. `123.4asd`.
    fn check_number(&mut self, text: &str, span: Span) -> Token {
        if let Some(next) = self.source[span.end..].chars().next() {
            if next.is_alphanumeric() || next == '_' {
                let offending = format!("{}{}", text, next);
                return self.error(format!("bad number syntax: {:?}", offending), span);
            }
        }
        Token::new(TokenKind::Number, text, span)
    }

    fn error(&mut self, message: String, span: Span) -> Token {
        self.done = true;
        Token::new(TokenKind::Error, message, span)
    }

    fn eof_token(&self) -> Token {
        let pos = self.source.len();
        Token::new(TokenKind::Eof, "", Span::new(pos, pos))
    }

    /// Collect all tokens into a vector, ending with `Eof` (or an `Error`
    /// token followed by `Eof`).
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let kind = token.kind;
            tokens.push(token);
            if kind == TokenKind::Eof {
                break;
            }
        }
        tokens
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

/// Helper function to lex source text
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}
