//! SSA intermediate representation
//!
//! The IR is a flat list of functions, each a list of basic blocks over
//! virtual registers. [`IrBuilder`] owns register and block numbering,
//! [`Lowerer`] drives it from the AST, and [`verify_function`] checks the
//! result before it is installed in the module.

pub mod builder;
pub mod instr;
pub mod lower;
pub mod types;
pub mod verify;

pub use builder::IrBuilder;
pub use instr::{CmpOp, InstrKind, Instruction, Terminator};
pub use lower::{LowerError, Lowerer};
pub use types::{BasicBlock, BlockId, Function, Module, VReg};
pub use verify::{verify_function, VerifyError};
