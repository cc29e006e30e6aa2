//! Token definitions for Helios
//!
//! The static token classes (keywords, literals, punctuation, the fixed
//! operator characters) are described with a `logos` derive. User-declared
//! operator characters are not known at compile time; the lexer reclassifies
//! them from its fixity table after the raw scan.

use crate::span::Span;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer.
///
/// `text` is an owned copy of the matched source text. For `Error` tokens it
/// carries the diagnostic message instead; for `Eof` it is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// First character of the token text, if any.
    ///
    /// Binary operators are single characters, so this is how the parser
    /// reads the operator out of an operator token.
    pub fn op_char(&self) -> Option<char> {
        self.text.chars().next()
    }
}

/// All possible token types in Helios
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
pub enum TokenKind {
    // ============ Keywords ============
    #[token("def")]
    Def,
    #[token("extern")]
    Extern,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,

    // ============ Literals ============
    /// Number literal: 42, 1.5, .5, 1e10, 2.5e-3, 0x1F
    ///
    /// The grammar is deliberately loose (a lone `.` or a dangling exponent
    /// still scans as a number); the parser rejects anything that fails f64
    /// conversion, and the lexer rejects a number run immediately followed
    /// by an identifier character.
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]*)?")]
    #[regex(r"\.[0-9]*")]
    #[regex(r"0[xX][0-9a-fA-F]*(\.[0-9a-fA-F]*)?")]
    Number,

    /// Identifier: foo, _bar, if1
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ============ Punctuation ============
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // ============ Fixed operators ============
    #[token("=")]
    Eq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("<")]
    Lt,

    // ============ Special ============
    /// A character registered as a user-defined unary operator
    UserUnaryOp,
    /// A character registered as a user-defined binary operator
    UserBinaryOp,

    /// Lexical error; the token text carries the diagnostic
    Error,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Check if this token is a reserved keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Def
                | TokenKind::Extern
                | TokenKind::If
                | TokenKind::Then
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::In
        )
    }

    /// Check if this token is an operator (fixed or user-declared)
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Lt
                | TokenKind::UserUnaryOp
                | TokenKind::UserBinaryOp
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Def => "def",
            TokenKind::Extern => "extern",
            TokenKind::If => "if",
            TokenKind::Then => "then",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Number => "number",
            TokenKind::Ident => "identifier",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Eq => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Lt => "<",
            TokenKind::UserUnaryOp => "unary operator",
            TokenKind::UserBinaryOp => "binary operator",
            TokenKind::Error => "lexical error",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", s)
    }
}
