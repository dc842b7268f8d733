//! IR Builder
//!
//! Owns the module under construction and an insertion point (current
//! function and block). Misuse, such as emitting into a terminated block,
//! is a bug in the caller and panics.

use super::instr::{BinOp, FloatPredicate, InstrKind, Instruction, IntPredicate, Terminator};
use super::types::{
    BasicBlock, BlockId, ExternalFunction, Function, Global, GlobalInit, IrType, Module, VReg,
    Value,
};

pub struct IrBuilder {
    module: Module,
    /// Function being built, moved into the module by `finish_function`.
    current_fn: Option<Function>,
    insert_block: Option<BlockId>,
    next_vreg: u32,
}

impl IrBuilder {
    pub fn new(module_name: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            module: Module::new(module_name, source_file),
            current_fn: None,
            insert_block: None,
            next_vreg: 0,
        }
    }

    /// Finish building and return the module.
    pub fn finish(mut self) -> Module {
        self.finish_function();
        self.module
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    fn fresh_vreg(&mut self) -> VReg {
        let vreg = VReg(self.next_vreg);
        self.next_vreg += 1;
        vreg
    }

    // ============ Module items ============

    /// Add a private string constant and return its address.
    pub fn add_string_constant(&mut self, name: &str, text: &str) -> Value {
        if self.module.global(name).is_none() {
            self.module.globals.push(Global {
                name: name.to_string(),
                init: GlobalInit::CString(text.to_string()),
            });
        }
        Value::Global(name.to_string())
    }

    /// Get or create a mutable `i32` global.
    pub fn get_or_add_i32_global(&mut self, name: &str, init: i32) -> Value {
        if self.module.global(name).is_none() {
            self.module.globals.push(Global {
                name: name.to_string(),
                init: GlobalInit::I32(init),
            });
        }
        Value::Global(name.to_string())
    }

    pub fn declare_external(&mut self, external: ExternalFunction) {
        if self.module.external(&external.name).is_none() {
            self.module.externals.push(external);
        }
    }

    // ============ Functions and blocks ============

    /// Start a new function and position at its `entry` block.
    pub fn start_function(&mut self, name: impl Into<String>, ret: IrType) -> BlockId {
        self.finish_function();
        self.current_fn = Some(Function::new(name, ret));
        self.next_vreg = 0;
        let entry = self.append_block("entry");
        self.position_at_end(entry);
        entry
    }

    pub fn finish_function(&mut self) {
        if let Some(function) = self.current_fn.take() {
            self.module.functions.push(function);
        }
        self.insert_block = None;
    }

    /// Append a block to the current function. Labels are made unique by a
    /// numeric suffix, so `if.then` may come back as `if.then1`.
    pub fn append_block(&mut self, name: &str) -> BlockId {
        let function = self.function_mut();
        let mut label = name.to_string();
        let mut suffix = 0;
        while function.find_block(&label).is_some() {
            suffix += 1;
            label = format!("{name}{suffix}");
        }
        let id = BlockId(function.blocks.len() as u32);
        function.blocks.push(BasicBlock::new(label));
        id
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        assert!(
            block.index() < self.function().blocks.len(),
            "block {block:?} does not belong to the current function"
        );
        self.insert_block = Some(block);
    }

    pub fn current_block(&self) -> BlockId {
        match self.insert_block {
            Some(block) => block,
            None => panic!("IR builder has no insertion point"),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.function().block(self.current_block()).is_terminated()
    }

    fn function(&self) -> &Function {
        match &self.current_fn {
            Some(function) => function,
            None => panic!("IR builder is not inside a function"),
        }
    }

    fn function_mut(&mut self) -> &mut Function {
        match &mut self.current_fn {
            Some(function) => function,
            None => panic!("IR builder is not inside a function"),
        }
    }

    fn block_mut(&mut self) -> &mut BasicBlock {
        let block = self.current_block();
        let block = &mut self.function_mut().blocks[block.index()];
        assert!(
            !block.is_terminated(),
            "cannot emit into terminated block '{}'",
            block.label
        );
        block
    }

    // ============ Instructions ============

    fn push(&mut self, kind: InstrKind) -> Value {
        let result = self.fresh_vreg();
        let instruction = Instruction::new(Some(result), kind);
        let ty = instruction.ty();
        self.block_mut().instructions.push(instruction);
        Value::Reg(result, ty)
    }

    pub fn build_binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        self.push(InstrKind::Binary { op, lhs, rhs })
    }

    pub fn build_sitofp(&mut self, value: Value) -> Value {
        self.push(InstrKind::SIToFP { value })
    }

    pub fn build_fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value {
        self.push(InstrKind::FCmp { pred, lhs, rhs })
    }

    pub fn build_icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        self.push(InstrKind::ICmp { pred, lhs, rhs })
    }

    pub fn build_zext(&mut self, value: Value, to: IrType) -> Value {
        self.push(InstrKind::ZExt { value, to })
    }

    pub fn build_load(&mut self, ty: IrType, ptr: Value) -> Value {
        self.push(InstrKind::Load { ty, ptr })
    }

    /// Create a phi with the given initial edges; more can be added with
    /// [`IrBuilder::add_incoming`].
    pub fn build_phi(&mut self, ty: IrType, incoming: Vec<(Value, BlockId)>) -> Value {
        self.push(InstrKind::Phi { ty, incoming })
    }

    pub fn add_incoming(&mut self, phi: &Value, value: Value, block: BlockId) {
        let Some(target) = phi.as_reg() else {
            panic!("{phi} is not a phi node");
        };
        let instruction = self
            .function_mut()
            .blocks
            .iter_mut()
            .flat_map(|block| block.instructions.iter_mut())
            .find(|instruction| instruction.result == Some(target));
        match instruction {
            Some(Instruction {
                kind: InstrKind::Phi { incoming, .. },
                ..
            }) => incoming.push((value, block)),
            _ => panic!("{phi} is not a phi node"),
        }
    }

    pub fn build_call(&mut self, callee: &ExternalFunction, args: Vec<Value>) -> Value {
        self.push(InstrKind::Call {
            callee: callee.name.clone(),
            ret: callee.ret,
            params: callee.params.clone(),
            variadic: callee.variadic,
            args,
        })
    }

    // ============ Terminators ============

    fn terminate(&mut self, terminator: Terminator) {
        self.block_mut().terminator = Some(terminator);
    }

    pub fn build_ret(&mut self, value: Option<Value>) {
        self.terminate(Terminator::Ret(value));
    }

    pub fn build_br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn build_cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_labels_are_unique() {
        let mut builder = IrBuilder::new("m", "m.wdt");
        builder.start_function("main", IrType::I32);
        let first = builder.append_block("if.then");
        let second = builder.append_block("if.then");
        let third = builder.append_block("if.then");
        builder.build_ret(Some(Value::Int(0)));
        for block in [first, second, third] {
            builder.position_at_end(block);
            builder.build_ret(Some(Value::Int(0)));
        }

        let module = builder.finish();
        let labels: Vec<_> = module.functions[0]
            .blocks
            .iter()
            .map(|block| block.label.as_str())
            .collect();
        assert_eq!(labels, vec!["entry", "if.then", "if.then1", "if.then2"]);
    }

    #[test]
    fn registers_carry_their_type() {
        let mut builder = IrBuilder::new("m", "m.wdt");
        builder.start_function("main", IrType::I32);
        let wide = builder.build_sitofp(Value::Int(3));
        let flag = builder.build_fcmp(FloatPredicate::Olt, wide.clone(), wide);
        assert_eq!(flag.ty(), IrType::I1);
        let back = builder.build_zext(flag, IrType::I32);
        assert_eq!(back.ty(), IrType::I32);
        assert_eq!(back.to_string(), "%t2");
    }

    #[test]
    fn phi_edges_can_be_added_later() {
        let mut builder = IrBuilder::new("m", "m.wdt");
        let entry = builder.start_function("main", IrType::I32);
        let body = builder.append_block("loop");
        builder.build_br(body);
        builder.position_at_end(body);
        let phi = builder.build_phi(IrType::I32, vec![(Value::Int(0), entry)]);
        let next = builder.build_binary(BinOp::Add, phi.clone(), Value::Int(1));
        builder.add_incoming(&phi, next.clone(), body);
        builder.build_ret(Some(next));

        let module = builder.finish();
        let ir = module.to_string();
        assert!(ir.contains("%t0 = phi i32 [ 0, %entry ], [ %t1, %loop ]"), "{ir}");
    }

    #[test]
    #[should_panic(expected = "terminated block")]
    fn emitting_after_terminator_panics() {
        let mut builder = IrBuilder::new("m", "m.wdt");
        builder.start_function("main", IrType::I32);
        builder.build_ret(Some(Value::Int(0)));
        builder.build_binary(BinOp::Add, Value::Int(1), Value::Int(1));
    }

    #[test]
    fn globals_are_declared_once() {
        let mut builder = IrBuilder::new("m", "m.wdt");
        builder.get_or_add_i32_global("var.x", 0);
        builder.get_or_add_i32_global("var.x", 0);
        assert_eq!(builder.module().globals.len(), 1);
    }
}
