//! AST for Helios
//!
//! A passive data model of the language constructs. Nodes own their
//! children exclusively (a strict tree) and are immutable once built.

/// The reserved entry-point symbol; all top-level expressions of a file are
/// wrapped into one function of this name.
pub const MAIN_SYMBOL: &str = "__helios_main";

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// Variable reference
    Variable(String),
    /// Binary operation; operators are single characters
    Binary {
        op: char,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Function call
    Call { callee: String, args: Vec<Expr> },
    /// Expression sequence; the value is that of the last expression.
    /// Never produced by the grammar, only synthesized for the entry point.
    Block(Vec<Expr>),
    /// Conditional with mandatory branches; the value is the branch taken
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    /// Bounded loop: `for var = start, end [, step] in body`.
    /// `step` defaults to 1.0 at lowering time; the loop continues while
    /// `end` evaluates non-zero. Evaluates to 0.0.
    For {
        var: String,
        start: Box<Expr>,
        end: Box<Expr>,
        step: Option<Box<Expr>>,
        body: Box<Expr>,
    },
}

/// A function's name and parameter list, without a body.
///
/// Used both for `extern` declarations and as part of a definition.
/// Parameter-name uniqueness is not enforced here.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<String>,
}

/// A full function definition
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expr,
}

/// A parsed source unit
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Unit name, used only for diagnostics and the module name
    pub name: String,
    pub externs: Vec<Prototype>,
    pub defs: Vec<Function>,
    /// Standalone top-level expressions, in source order
    pub exprs: Vec<Expr>,
}

impl File {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            externs: Vec::new(),
            defs: Vec::new(),
            exprs: Vec::new(),
        }
    }

    /// Synthesize the entry-point function wrapping all top-level
    /// expressions into one block body.
    pub fn create_main(&self) -> Function {
        Function {
            prototype: Prototype {
                name: MAIN_SYMBOL.to_string(),
                args: Vec::new(),
            },
            body: Expr::Block(self.exprs.clone()),
        }
    }
}
