//! IR value, block, function and module types
//!
//! The Helios IR has exactly one source-level type (f64), so no type
//! lattice is carried here; the verifier distinguishes f64 values from i1
//! comparison results by instruction shape alone.

use super::instr::{Instruction, Terminator};
use std::fmt;

/// A virtual register (SSA value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A basic block label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A module accumulates the functions lowered from one source unit.
/// This is the value handed to the external backend.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Look up a function by name
    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A function in the IR. All parameters and the return value are f64.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Parameter names with their SSA registers
    pub params: Vec<(String, VReg)>,
    pub blocks: Vec<BasicBlock>,
    /// Declaration only (extern); carries no blocks
    pub is_external: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<(String, VReg)>) -> Self {
        Self {
            name: name.into(),
            params,
            blocks: Vec::new(),
            is_external: false,
        }
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

/// A straight-line sequence of instructions with a single terminator
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            terminator: None,
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kw = if self.is_external { "declare" } else { "define" };
        write!(f, "{} f64 @{}(", kw, self.name)?;
        for (i, (name, vreg)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, vreg)?;
        }
        if self.is_external {
            return writeln!(f, ")");
        }
        writeln!(f, ") {{")?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.id)?;
        for instr in &self.instructions {
            writeln!(f, "  {}", instr)?;
        }
        match &self.terminator {
            Some(term) => writeln!(f, "  {}", term),
            None => writeln!(f, "  <no terminator>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_newtypes() {
        assert_eq!(VReg(3).to_string(), "%3");
        assert_eq!(BlockId(0).to_string(), "bb0");
    }

    #[test]
    fn test_module_lookup() {
        let mut module = Module::new("m");
        module.functions.push(Function::new("f", vec![]));
        assert!(module.get_function("f").is_some());
        assert!(module.get_function("g").is_none());
    }
}
