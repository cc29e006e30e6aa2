//! Structural verification of emitted functions
//!
//! Stands in for a backend verifier: a function that fails these checks
//! is discarded by the lowering pass rather than handed to the backend.
//!
//! The IR has two runtime value kinds, f64 and the i1 produced by `fcmp`;
//! the checks below enforce that every operand has the kind its
//! instruction expects, that every block is terminated and reachable, and
//! that every referenced register and block exists.

use super::instr::{InstrKind, Terminator};
use super::types::{BlockId, Function, VReg};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Verification failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("function has no basic blocks")]
    NoBlocks,

    #[error("block {0} has no terminator")]
    MissingTerminator(BlockId),

    #[error("branch to unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("block {0} is unreachable from the entry block")]
    UnreachableBlock(BlockId),

    #[error("use of undefined value {0}")]
    UndefinedValue(VReg),

    #[error("value {value} has kind {found}, expected {expected}")]
    KindMismatch {
        value: VReg,
        expected: &'static str,
        found: &'static str,
    },
}

/// The two runtime value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Double,
    Bool,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Double => "f64",
            Kind::Bool => "i1",
        }
    }
}

/// Verify one non-external function
pub fn verify_function(func: &Function) -> Result<(), VerifyError> {
    if func.is_external {
        return Ok(());
    }
    if func.blocks.is_empty() {
        return Err(VerifyError::NoBlocks);
    }

    let block_ids: HashSet<BlockId> = func.blocks.iter().map(|b| b.id).collect();

    // Pass 1: collect the kind of every defined register. Phi operands may
    // be defined later in the function (the loop back edge), so uses are
    // only checked once all definitions are known.
    let mut kinds: HashMap<VReg, Kind> = HashMap::new();
    for (_, vreg) in &func.params {
        kinds.insert(*vreg, Kind::Double);
    }
    for block in &func.blocks {
        for instr in &block.instructions {
            let kind = match instr.kind {
                InstrKind::FCmp(..) => Kind::Bool,
                _ => Kind::Double,
            };
            kinds.insert(instr.result, kind);
        }
    }

    let check = |vreg: VReg, expected: Kind| -> Result<(), VerifyError> {
        match kinds.get(&vreg) {
            None => Err(VerifyError::UndefinedValue(vreg)),
            Some(found) if *found != expected => Err(VerifyError::KindMismatch {
                value: vreg,
                expected: expected.name(),
                found: found.name(),
            }),
            Some(_) => Ok(()),
        }
    };

    // Pass 2: terminators, branch targets, operand kinds.
    for block in &func.blocks {
        for instr in &block.instructions {
            match &instr.kind {
                InstrKind::Const(_) => {}
                InstrKind::FAdd(a, b) | InstrKind::FSub(a, b) | InstrKind::FMul(a, b) => {
                    check(*a, Kind::Double)?;
                    check(*b, Kind::Double)?;
                }
                InstrKind::FCmp(_, a, b) => {
                    check(*a, Kind::Double)?;
                    check(*b, Kind::Double)?;
                }
                InstrKind::UiToFp(v) => check(*v, Kind::Bool)?,
                InstrKind::Call { args, .. } => {
                    for arg in args {
                        check(*arg, Kind::Double)?;
                    }
                }
                InstrKind::Phi(incoming) => {
                    for (value, pred) in incoming {
                        check(*value, Kind::Double)?;
                        if !block_ids.contains(pred) {
                            return Err(VerifyError::UnknownBlock(*pred));
                        }
                    }
                }
            }
        }

        match &block.terminator {
            None => return Err(VerifyError::MissingTerminator(block.id)),
            Some(Terminator::Ret(v)) => check(*v, Kind::Double)?,
            Some(Terminator::Br(target)) => {
                if !block_ids.contains(target) {
                    return Err(VerifyError::UnknownBlock(*target));
                }
            }
            Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            }) => {
                check(*cond, Kind::Bool)?;
                for target in [then_block, else_block] {
                    if !block_ids.contains(target) {
                        return Err(VerifyError::UnknownBlock(*target));
                    }
                }
            }
        }
    }

    // Pass 3: every block reachable from the entry block.
    let entry = func.blocks[0].id;
    let mut reachable = HashSet::new();
    let mut work = vec![entry];
    while let Some(id) = work.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(block) = func.get_block(id) {
            match &block.terminator {
                Some(Terminator::Br(t)) => work.push(*t),
                Some(Terminator::CondBr {
                    then_block,
                    else_block,
                    ..
                }) => {
                    work.push(*then_block);
                    work.push(*else_block);
                }
                _ => {}
            }
        }
    }
    for block in &func.blocks {
        if !reachable.contains(&block.id) {
            return Err(VerifyError::UnreachableBlock(block.id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::IrBuilder;
    use crate::ir::instr::CmpOp;

    #[test]
    fn test_verify_ok() {
        let mut b = IrBuilder::new("test");
        let params = b.start_function("f", &["x".to_string()]);
        let one = b.const_float(1.0);
        let sum = b.fadd(params[0], one);
        b.ret(sum);
        let func = b.take_function();
        assert_eq!(verify_function(&func), Ok(()));
    }

    #[test]
    fn test_missing_terminator() {
        let mut b = IrBuilder::new("test");
        let params = b.start_function("f", &["x".to_string()]);
        let _ = params;
        let func = b.take_function();
        assert!(matches!(
            verify_function(&func),
            Err(VerifyError::MissingTerminator(_))
        ));
    }

    #[test]
    fn test_cond_br_needs_bool() {
        let mut b = IrBuilder::new("test");
        let params = b.start_function("f", &["x".to_string()]);
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        // branch on an f64 value, which is a kind error
        b.cond_br(params[0], then_bb, else_bb);
        let ret = params[0];
        b.start_block(then_bb);
        b.ret(ret);
        b.start_block(else_bb);
        b.ret(ret);
        let func = b.take_function();
        assert!(matches!(
            verify_function(&func),
            Err(VerifyError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_unreachable_block() {
        let mut b = IrBuilder::new("test");
        let params = b.start_function("f", &["x".to_string()]);
        b.ret(params[0]);
        let orphan = b.create_block();
        b.start_block(orphan);
        b.ret(params[0]);
        let func = b.take_function();
        assert_eq!(
            verify_function(&func),
            Err(VerifyError::UnreachableBlock(orphan))
        );
    }

    #[test]
    fn test_uitofp_needs_bool() {
        let mut b = IrBuilder::new("test");
        let params = b.start_function("f", &["x".to_string()]);
        let cmp = b.fcmp(CmpOp::Ult, params[0], params[0]);
        let as_float = b.uitofp(cmp);
        b.ret(as_float);
        let func = b.take_function();
        assert_eq!(verify_function(&func), Ok(()));
    }
}
