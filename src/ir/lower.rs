//! AST to IR lowering
//!
//! Translates parsed source into SSA form one symbol at a time. Control
//! flow becomes explicit basic blocks: an `if` lowers to a diamond whose
//! arms meet at a phi, and a `for` loop lowers to a preheader, a loop
//! block carrying the induction phi, and an exit block.
//!
//! A function that fails to lower, or that fails verification afterwards,
//! is erased from the module entirely so later symbols never resolve
//! against a half-built definition.

use super::builder::IrBuilder;
use super::instr::CmpOp;
use super::types::{Module, VReg};
use super::verify::{verify_function, VerifyError};
use crate::ast::{Expr, File, Function, Prototype};
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while lowering an AST to IR
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LowerError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("wrong number of arguments to {name}: expected {expected}, got {given}")]
    ArityMismatch {
        name: String,
        expected: usize,
        given: usize,
    },

    #[error("invalid binary operator {0:?}")]
    InvalidOperator(char),

    #[error("empty expression block")]
    EmptyBlock,

    #[error("function {name} failed verification: {source}")]
    Verification { name: String, source: VerifyError },
}

/// Lowers a whole source unit into one IR module.
///
/// Scoping is dynamic within a single function: `values` maps every
/// currently visible name to its register, and loop variables shadow by
/// saving and restoring the previous entry.
pub struct Lowerer {
    builder: IrBuilder,
    values: HashMap<String, VReg>,
}

impl Lowerer {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            builder: IrBuilder::new(module_name),
            values: HashMap::new(),
        }
    }

    /// Lower a parsed file: externs first, then definitions, then the
    /// synthesized entry point wrapping any top-level expressions.
    /// Stops at the first failing symbol.
    pub fn lower_file(&mut self, file: &File) -> Result<(), LowerError> {
        for proto in &file.externs {
            self.lower_prototype(proto);
        }
        for def in &file.defs {
            self.lower_function(def)?;
        }
        if !file.exprs.is_empty() {
            self.lower_function(&file.create_main())?;
        }
        Ok(())
    }

    /// Consume the lowerer and hand out the finished module.
    pub fn finish(self) -> Module {
        self.builder.finish()
    }

    /// Declare an external function. Redeclaring an existing name is a
    /// no-op, so repeated `extern` lines for the same symbol are allowed.
    pub fn lower_prototype(&mut self, proto: &Prototype) {
        self.builder.declare_function(&proto.name, &proto.args);
    }

    /// Lower one function definition.
    ///
    /// If the name was already declared, the declared parameter list wins
    /// over the one written at the definition. On any failure the symbol
    /// is removed from the module, including a prior declaration.
    pub fn lower_function(&mut self, func: &Function) -> Result<(), LowerError> {
        let params = match self.builder.find_function(&func.prototype.name) {
            Some(existing) => existing
                .params
                .iter()
                .map(|(name, _)| name.clone())
                .collect(),
            None => func.prototype.args.clone(),
        };

        let param_regs = self.builder.start_function(&func.prototype.name, &params);
        self.values.clear();
        for (name, vreg) in params.iter().zip(param_regs) {
            self.values.insert(name.clone(), vreg);
        }

        let result = match self.lower_expr(&func.body) {
            Ok(value) => value,
            Err(err) => {
                self.erase_current(&func.prototype.name);
                return Err(err);
            }
        };
        self.builder.ret(result);

        let finished = self.builder.take_function();
        if let Err(err) = verify_function(&finished) {
            self.builder.remove_function(&func.prototype.name);
            return Err(LowerError::Verification {
                name: func.prototype.name.clone(),
                source: err,
            });
        }
        self.builder.install_function(finished);
        Ok(())
    }

    fn erase_current(&mut self, name: &str) {
        self.builder.abort_function();
        self.builder.remove_function(name);
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<VReg, LowerError> {
        match expr {
            Expr::Number(value) => Ok(self.builder.const_float(*value)),
            Expr::Variable(name) => self
                .values
                .get(name)
                .copied()
                .ok_or_else(|| LowerError::UnknownVariable(name.clone())),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            Expr::Call { callee, args } => self.lower_call(callee, args),
            Expr::Block(exprs) => self.lower_block(exprs),
            Expr::If { cond, then, els } => self.lower_if(cond, then, els),
            Expr::For {
                var,
                start,
                end,
                step,
                body,
            } => self.lower_for(var, start, end, step.as_deref(), body),
        }
    }

    fn lower_binary(&mut self, op: char, lhs: &Expr, rhs: &Expr) -> Result<VReg, LowerError> {
        let lhs = self.lower_expr(lhs)?;
        let rhs = self.lower_expr(rhs)?;
        match op {
            '+' => Ok(self.builder.fadd(lhs, rhs)),
            '-' => Ok(self.builder.fsub(lhs, rhs)),
            '*' => Ok(self.builder.fmul(lhs, rhs)),
            '<' => {
                // comparison yields i1; widen back to f64 so every
                // expression has the same type
                let cmp = self.builder.fcmp(CmpOp::Ult, lhs, rhs);
                Ok(self.builder.uitofp(cmp))
            }
            other => Err(LowerError::InvalidOperator(other)),
        }
    }

    fn lower_call(&mut self, callee: &str, args: &[Expr]) -> Result<VReg, LowerError> {
        let expected = match self.builder.find_function(callee) {
            Some(func) => func.arity(),
            None => return Err(LowerError::UnknownFunction(callee.to_string())),
        };
        if expected != args.len() {
            return Err(LowerError::ArityMismatch {
                name: callee.to_string(),
                expected,
                given: args.len(),
            });
        }
        let mut arg_regs = Vec::with_capacity(args.len());
        for arg in args {
            arg_regs.push(self.lower_expr(arg)?);
        }
        Ok(self.builder.call(callee, arg_regs))
    }

    fn lower_block(&mut self, exprs: &[Expr]) -> Result<VReg, LowerError> {
        let mut last = None;
        for expr in exprs {
            last = Some(self.lower_expr(expr)?);
        }
        last.ok_or(LowerError::EmptyBlock)
    }

    fn lower_if(&mut self, cond: &Expr, then: &Expr, els: &Expr) -> Result<VReg, LowerError> {
        let cond = self.lower_expr(cond)?;
        let zero = self.builder.const_float(0.0);
        let cond = self.builder.fcmp(CmpOp::One, cond, zero);

        let then_bb = self.builder.create_block();
        let else_bb = self.builder.create_block();
        let merge_bb = self.builder.create_block();
        self.builder.cond_br(cond, then_bb, else_bb);

        // Each arm may itself emit blocks, so the block that actually
        // branches to the merge is the current one after lowering, not
        // necessarily the arm's first block.
        self.builder.start_block(then_bb);
        let then_value = self.lower_expr(then)?;
        let then_pred = self.builder.current_block_id().unwrap_or(then_bb);
        self.builder.br(merge_bb);

        self.builder.start_block(else_bb);
        let else_value = self.lower_expr(els)?;
        let else_pred = self.builder.current_block_id().unwrap_or(else_bb);
        self.builder.br(merge_bb);

        self.builder.start_block(merge_bb);
        Ok(self
            .builder
            .phi(vec![(then_value, then_pred), (else_value, else_pred)]))
    }

    fn lower_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Result<VReg, LowerError> {
        let start_value = self.lower_expr(start)?;
        let preheader = match self.builder.current_block_id() {
            Some(id) => id,
            None => return Err(LowerError::EmptyBlock),
        };

        let loop_bb = self.builder.create_block();
        self.builder.br(loop_bb);
        self.builder.start_block(loop_bb);

        // Induction variable: the back edge is patched in once the latch
        // block is known.
        let induction = self.builder.phi(vec![(start_value, preheader)]);
        let shadowed = self.values.insert(var.to_string(), induction);

        let latch = self.lower_loop_latch(induction, step, end, body);

        // restore the shadowed binding whether or not the body lowered
        match shadowed {
            Some(old) => {
                self.values.insert(var.to_string(), old);
            }
            None => {
                self.values.remove(var);
            }
        }
        let (next, cond) = latch?;

        let latch_bb = self.builder.current_block_id().unwrap_or(loop_bb);
        let after_bb = self.builder.create_block();
        self.builder.cond_br(cond, loop_bb, after_bb);
        self.builder.start_block(after_bb);
        self.builder.add_phi_incoming(induction, next, latch_bb);

        // loops always evaluate to 0.0
        Ok(self.builder.const_float(0.0))
    }

    /// Lower the loop body, the increment and the continue condition.
    /// Returns the next induction value and the i1 condition register.
    fn lower_loop_latch(
        &mut self,
        induction: VReg,
        step: Option<&Expr>,
        end: &Expr,
        body: &Expr,
    ) -> Result<(VReg, VReg), LowerError> {
        // the body's value is computed and discarded
        self.lower_expr(body)?;
        let step_value = match step {
            Some(expr) => self.lower_expr(expr)?,
            None => self.builder.const_float(1.0),
        };
        let next = self.builder.fadd(induction, step_value);
        let end_value = self.lower_expr(end)?;
        let zero = self.builder.const_float(0.0);
        let cond = self.builder.fcmp(CmpOp::One, end_value, zero);
        Ok((next, cond))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::MAIN_SYMBOL;
    use crate::ir::instr::InstrKind;
    use crate::parser::Parser;

    fn lower_source(source: &str) -> Result<Module, LowerError> {
        let file = Parser::new("test", source)
            .parse_file()
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        let mut lowerer = Lowerer::new(&file.name);
        lowerer.lower_file(&file)?;
        Ok(lowerer.finish())
    }

    #[test]
    fn test_lower_definition() {
        let module = lower_source("def add(x, y) x + y;").unwrap();
        let func = module.get_function("add").unwrap();
        assert_eq!(func.arity(), 2);
        assert!(!func.is_external);
        assert_eq!(func.blocks.len(), 1);
        let entry = func.entry_block().unwrap();
        assert!(matches!(entry.instructions[0].kind, InstrKind::FAdd(..)));
    }

    #[test]
    fn test_lower_extern_then_call() {
        let module = lower_source("extern cos(x); def f(a) cos(a) * cos(a);").unwrap();
        assert!(module.get_function("cos").unwrap().is_external);
        let func = module.get_function("f").unwrap();
        let entry = func.entry_block().unwrap();
        let calls = entry
            .instructions
            .iter()
            .filter(|i| matches!(i.kind, InstrKind::Call { .. }))
            .count();
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = lower_source("extern cos(x); cos(1, 2);").unwrap_err();
        assert_eq!(
            err,
            LowerError::ArityMismatch {
                name: "cos".to_string(),
                expected: 1,
                given: 2,
            }
        );
    }

    #[test]
    fn test_unknown_variable() {
        let err = lower_source("def f(x) y;").unwrap_err();
        assert_eq!(err, LowerError::UnknownVariable("y".to_string()));
    }

    #[test]
    fn test_unknown_function() {
        let err = lower_source("sin(1);").unwrap_err();
        assert_eq!(err, LowerError::UnknownFunction("sin".to_string()));
    }

    #[test]
    fn test_failed_function_is_erased() {
        let mut lowerer = Lowerer::new("test");
        let file = Parser::new("test", "def f(x) y;")
            .parse_file()
            .expect("parse");
        assert!(lowerer.lower_file(&file).is_err());
        let module = lowerer.finish();
        assert!(module.get_function("f").is_none());
    }

    #[test]
    fn test_redefinition_uses_declared_params() {
        // the earlier declaration pins the parameter names, so the body
        // of the definition resolves against them
        let module = lower_source("extern f(a); def f(x) a;").unwrap();
        let func = module.get_function("f").unwrap();
        assert!(!func.is_external);
        assert_eq!(func.params[0].0, "a");
    }

    #[test]
    fn test_idempotent_redeclaration() {
        let module = lower_source("extern cos(x); extern cos(x);").unwrap();
        let count = module.functions.iter().filter(|f| f.name == "cos").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_if_merges_through_phi() {
        let module = lower_source("def f(x) if x then 1 else 2;").unwrap();
        let func = module.get_function("f").unwrap();
        assert_eq!(func.blocks.len(), 4);
        let merge = func.blocks.last().unwrap();
        match &merge.instructions[0].kind {
            InstrKind::Phi(incoming) => assert_eq!(incoming.len(), 2),
            other => panic!("expected phi in merge block, got {other:?}"),
        }
    }

    #[test]
    fn test_for_loop_induction_phi() {
        let module = lower_source("def count(n) for i = 0, i < n in i;").unwrap();
        let func = module.get_function("count").unwrap();
        assert_eq!(func.blocks.len(), 3);
        let loop_block = &func.blocks[1];
        match &loop_block.instructions[0].kind {
            InstrKind::Phi(incoming) => {
                // entry edge plus the patched back edge
                assert_eq!(incoming.len(), 2);
            }
            other => panic!("expected induction phi, got {other:?}"),
        }
    }

    #[test]
    fn test_loop_variable_shadowing_restored() {
        // `i` is a parameter shadowed by the loop variable; after the
        // loop the parameter is visible again
        let module = lower_source("def f(i) (for i = 0, i < 10 in i) + i;").unwrap();
        let func = module.get_function("f").unwrap();
        let last = func.blocks.last().unwrap();
        let add = last
            .instructions
            .iter()
            .rev()
            .find_map(|i| match i.kind {
                InstrKind::FAdd(_, rhs) => Some(rhs),
                _ => None,
            })
            .expect("trailing fadd");
        // the right operand is the parameter register, not the phi
        assert_eq!(add, func.params[0].1);
    }

    #[test]
    fn test_top_level_exprs_become_main() {
        let module = lower_source("1 + 2; 3 * 4;").unwrap();
        let main = module.get_function(MAIN_SYMBOL).unwrap();
        assert_eq!(main.arity(), 0);
        let entry = main.entry_block().unwrap();
        // both expressions lowered into the single entry block, in order
        assert!(matches!(entry.instructions[2].kind, InstrKind::FAdd(..)));
        assert!(matches!(entry.instructions[5].kind, InstrKind::FMul(..)));
    }

    #[test]
    fn test_no_main_without_exprs() {
        let module = lower_source("def f(x) x;").unwrap();
        assert!(module.get_function(MAIN_SYMBOL).is_none());
    }

    #[test]
    fn test_invalid_operator() {
        // a user-registered operator parses but has no lowering rule
        let mut parser = Parser::new("test", "def f(x) x % 2;");
        parser.register_binary_operator('%', 30);
        let file = parser.parse_file().expect("parse");
        let mut lowerer = Lowerer::new("test");
        let err = lowerer.lower_file(&file).unwrap_err();
        assert_eq!(err, LowerError::InvalidOperator('%'));
    }

    #[test]
    fn test_recursive_call_resolves() {
        let module = lower_source("def fib(n) if n < 2 then n else fib(n - 1) + fib(n - 2);");
        assert!(module.is_ok());
    }
}
