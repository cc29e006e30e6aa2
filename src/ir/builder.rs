//! IR builder
//!
//! Owns the module being built, the function in progress and the single
//! current insertion block. This is the minimal capability set the
//! lowering pass needs: create block, move the insertion point, emit
//! instructions and terminators, and patch phi nodes with late incoming
//! edges (the loop back edge is only known after the body is lowered).

use super::instr::{CmpOp, Instruction, InstrKind, Terminator};
use super::types::{BasicBlock, BlockId, Function, Module, VReg};

/// Builder for constructing IR
pub struct IrBuilder {
    /// Next virtual register ID
    next_vreg: u32,
    /// Next block ID
    next_block: u32,
    /// Module being built
    module: Module,
    /// Function being built
    current_fn: Option<Function>,
    /// Insertion point
    current_block: Option<BasicBlock>,
}

impl IrBuilder {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            next_vreg: 0,
            next_block: 0,
            module: Module::new(module_name),
            current_fn: None,
            current_block: None,
        }
    }

    /// Finish building and return the module. Any unfinished function is
    /// discarded.
    pub fn finish(mut self) -> Module {
        self.current_block = None;
        self.current_fn = None;
        self.module
    }

    /// Create a fresh virtual register
    pub fn fresh_vreg(&mut self) -> VReg {
        let vreg = VReg(self.next_vreg);
        self.next_vreg += 1;
        vreg
    }

    /// Create a fresh block ID
    pub fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    // ============ Function building ============

    /// Look up a function by name, including the one currently being built
    /// (so recursive calls resolve).
    pub fn find_function(&self, name: &str) -> Option<&Function> {
        if let Some(ref func) = self.current_fn {
            if func.name == name {
                return Some(func);
            }
        }
        self.module.get_function(name)
    }

    /// Declare an external function. Redeclaring an existing name is a
    /// no-op: the existing symbol is reused.
    pub fn declare_function(&mut self, name: &str, params: &[String]) {
        if self.find_function(name).is_some() {
            return;
        }
        let params = params
            .iter()
            .map(|p| (p.clone(), self.fresh_vreg()))
            .collect();
        let mut func = Function::new(name, params);
        func.is_external = true;
        self.module.functions.push(func);
    }

    /// Start building a function body: creates parameter registers and the
    /// entry block, and moves the insertion point there. Returns the
    /// parameter registers in declaration order.
    pub fn start_function(&mut self, name: &str, params: &[String]) -> Vec<VReg> {
        let params: Vec<(String, VReg)> = params
            .iter()
            .map(|p| (p.clone(), self.fresh_vreg()))
            .collect();
        let vregs = params.iter().map(|(_, v)| *v).collect();

        self.current_fn = Some(Function::new(name, params));
        let entry = self.fresh_block();
        self.current_block = Some(BasicBlock::new(entry));

        vregs
    }

    /// Finish the function in progress and hand it to the caller (for
    /// verification) without installing it in the module.
    pub fn take_function(&mut self) -> Function {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        self.current_fn
            .take()
            .unwrap_or_else(|| Function::new("<none>", Vec::new()))
    }

    /// Install a completed function, replacing any earlier declaration of
    /// the same name.
    pub fn install_function(&mut self, func: Function) {
        self.remove_function(&func.name);
        self.module.functions.push(func);
    }

    /// Discard the function in progress
    pub fn abort_function(&mut self) {
        self.current_block = None;
        self.current_fn = None;
    }

    /// Erase a function from the module by name
    pub fn remove_function(&mut self, name: &str) {
        self.module.functions.retain(|f| f.name != name);
    }

    // ============ Block building ============

    /// Create a new block label without moving the insertion point
    pub fn create_block(&mut self) -> BlockId {
        self.fresh_block()
    }

    /// Move the insertion point to a new block, sealing the previous one
    pub fn start_block(&mut self, id: BlockId) {
        if let Some(block) = self.current_block.take() {
            if let Some(ref mut func) = self.current_fn {
                func.blocks.push(block);
            }
        }
        self.current_block = Some(BasicBlock::new(id));
    }

    /// The block currently being inserted into
    pub fn current_block_id(&self) -> Option<BlockId> {
        self.current_block.as_ref().map(|b| b.id)
    }

    // ============ Instruction emission ============

    fn emit(&mut self, kind: InstrKind) -> VReg {
        let result = self.fresh_vreg();
        if let Some(ref mut block) = self.current_block {
            block.instructions.push(Instruction::new(result, kind));
        }
        result
    }

    /// Emit an f64 constant
    pub fn const_float(&mut self, value: f64) -> VReg {
        self.emit(InstrKind::Const(value))
    }

    pub fn fadd(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit(InstrKind::FAdd(a, b))
    }

    pub fn fsub(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit(InstrKind::FSub(a, b))
    }

    pub fn fmul(&mut self, a: VReg, b: VReg) -> VReg {
        self.emit(InstrKind::FMul(a, b))
    }

    pub fn fcmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.emit(InstrKind::FCmp(op, a, b))
    }

    /// Convert an i1 comparison result to 0.0 / 1.0
    pub fn uitofp(&mut self, v: VReg) -> VReg {
        self.emit(InstrKind::UiToFp(v))
    }

    pub fn call(&mut self, func: impl Into<String>, args: Vec<VReg>) -> VReg {
        self.emit(InstrKind::Call {
            func: func.into(),
            args,
        })
    }

    /// Emit a phi node with its initial incoming edges
    pub fn phi(&mut self, incoming: Vec<(VReg, BlockId)>) -> VReg {
        self.emit(InstrKind::Phi(incoming))
    }

    /// Add an incoming edge to an already-emitted phi node. Needed for the
    /// loop back edge, which is only known after the body has been lowered.
    pub fn add_phi_incoming(&mut self, phi: VReg, value: VReg, block: BlockId) {
        let find = |instrs: &mut Vec<Instruction>| {
            for instr in instrs.iter_mut() {
                if instr.result == phi {
                    if let InstrKind::Phi(ref mut incoming) = instr.kind {
                        incoming.push((value, block));
                        return true;
                    }
                }
            }
            false
        };

        if let Some(ref mut cur) = self.current_block {
            if find(&mut cur.instructions) {
                return;
            }
        }
        if let Some(ref mut func) = self.current_fn {
            for blk in func.blocks.iter_mut() {
                if find(&mut blk.instructions) {
                    return;
                }
            }
        }
    }

    // ============ Terminators ============

    pub fn ret(&mut self, value: VReg) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::Ret(value));
        }
    }

    pub fn br(&mut self, target: BlockId) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::Br(target));
        }
    }

    pub fn cond_br(&mut self, cond: VReg, then_block: BlockId, else_block: BlockId) {
        if let Some(ref mut block) = self.current_block {
            block.terminator = Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simple_function() {
        let mut b = IrBuilder::new("test");
        let params = b.start_function("add", &["x".to_string(), "y".to_string()]);
        let sum = b.fadd(params[0], params[1]);
        b.ret(sum);
        let func = b.take_function();
        b.install_function(func);

        let module = b.finish();
        let func = module.get_function("add").unwrap();
        assert_eq!(func.arity(), 2);
        assert_eq!(func.blocks.len(), 1);
        assert!(matches!(
            func.entry_block().unwrap().terminator,
            Some(Terminator::Ret(_))
        ));
    }

    #[test]
    fn test_declare_is_idempotent() {
        let mut b = IrBuilder::new("test");
        b.declare_function("cos", &["x".to_string()]);
        b.declare_function("cos", &["x".to_string()]);
        let module = b.finish();
        assert_eq!(module.functions.len(), 1);
        assert!(module.get_function("cos").unwrap().is_external);
    }

    #[test]
    fn test_install_replaces_declaration() {
        let mut b = IrBuilder::new("test");
        b.declare_function("f", &["x".to_string()]);
        let params = b.start_function("f", &["x".to_string()]);
        b.ret(params[0]);
        let func = b.take_function();
        b.install_function(func);

        let module = b.finish();
        assert_eq!(module.functions.len(), 1);
        assert!(!module.get_function("f").unwrap().is_external);
    }

    #[test]
    fn test_add_phi_incoming_in_sealed_block() {
        let mut b = IrBuilder::new("test");
        b.start_function("f", &[]);
        let start = b.const_float(1.0);
        let pre = b.current_block_id().unwrap();

        let loop_bb = b.create_block();
        b.br(loop_bb);
        b.start_block(loop_bb);
        let phi = b.phi(vec![(start, pre)]);

        let after = b.create_block();
        let step = b.const_float(1.0);
        let next = b.fadd(phi, step);
        let cond = b.fcmp(CmpOp::One, next, start);
        b.cond_br(cond, loop_bb, after);
        let loop_end = b.current_block_id().unwrap();

        b.start_block(after);
        // loop_bb is sealed by now; the patch must still find the phi
        b.add_phi_incoming(phi, next, loop_end);
        let zero = b.const_float(0.0);
        b.ret(zero);

        let func = b.take_function();
        let loop_block = func.get_block(loop_bb).unwrap();
        match &loop_block.instructions[0].kind {
            InstrKind::Phi(incoming) => assert_eq!(incoming.len(), 2),
            other => panic!("expected phi, got {:?}", other),
        }
    }
}
