//! IR instruction definitions
//!
//! The instruction set is the minimal one the language needs: f64
//! constants and arithmetic, the unordered-less-than compare, the i1→f64
//! conversion that turns a comparison back into a language value, calls,
//! and phi nodes for SSA merges.

use super::types::{BlockId, VReg};
use std::fmt;

/// An instruction in the IR
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Result register; every Helios instruction produces a value
    pub result: VReg,
    /// The instruction kind
    pub kind: InstrKind,
}

impl Instruction {
    pub fn new(result: VReg, kind: InstrKind) -> Self {
        Self { result, kind }
    }
}

/// Kinds of instructions
#[derive(Debug, Clone)]
pub enum InstrKind {
    /// f64 constant
    Const(f64),
    /// Float addition
    FAdd(VReg, VReg),
    /// Float subtraction
    FSub(VReg, VReg),
    /// Float multiplication
    FMul(VReg, VReg),
    /// Float comparison; result is i1
    FCmp(CmpOp, VReg, VReg),
    /// Convert an i1 comparison result to 0.0 / 1.0
    UiToFp(VReg),
    /// Call a function; all arguments and the result are f64
    Call { func: String, args: Vec<VReg> },
    /// Phi node: selects a value by predecessor block
    Phi(Vec<(VReg, BlockId)>),
}

/// Float comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Unordered less than (true if either operand is NaN)
    Ult,
    /// Ordered not equal
    One,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Ult => write!(f, "ult"),
            CmpOp::One => write!(f, "one"),
        }
    }
}

/// Block terminators
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Return the function's f64 value
    Ret(VReg),
    /// Unconditional branch
    Br(BlockId),
    /// Conditional branch on an i1 value
    CondBr {
        cond: VReg,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.result)?;
        match &self.kind {
            InstrKind::Const(v) => write!(f, "const {}", v),
            InstrKind::FAdd(a, b) => write!(f, "fadd {}, {}", a, b),
            InstrKind::FSub(a, b) => write!(f, "fsub {}, {}", a, b),
            InstrKind::FMul(a, b) => write!(f, "fmul {}, {}", a, b),
            InstrKind::FCmp(op, a, b) => write!(f, "fcmp {} {}, {}", op, a, b),
            InstrKind::UiToFp(v) => write!(f, "uitofp {}", v),
            InstrKind::Call { func, args } => {
                write!(f, "call @{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            InstrKind::Phi(incoming) => {
                write!(f, "phi ")?;
                for (i, (val, block)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}, {}]", val, block)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(v) => write!(f, "ret {}", v),
            Terminator::Br(block) => write!(f, "br {}", block),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {}, {}, {}", cond, then_block, else_block),
        }
    }
}
