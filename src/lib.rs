//! Helios compiler front end
//!
//! Helios is a small expression language in which every value is an f64.
//! This crate covers the pipeline from source text to a verified SSA
//! module; machine code generation is left to an external backend
//! consuming the [`ir::Module`] produced here.
//!
//! ```text
//!   source text
//!        |
//!      lexer      tokens (with user-operator table)
//!        |
//!      parser     AST (precedence climbing)
//!        |
//!      lower      SSA IR (basic blocks, phi nodes)
//!        |
//!      verify     structural checks
//! ```

pub mod ast;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use lexer::{Fixity, Lexer};
pub use parser::{ParseError, Parser};
pub use span::Span;
pub use token::{Token, TokenKind};

/// Crate version, as reported by `helioc --version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Canonical source file extension
pub const FILE_EXTENSION: &str = "hel";
