//! IR instructions and block terminators.

use std::fmt;

use super::types::{BlockId, IrType, VReg, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Result register (None for instructions without a value).
    pub result: Option<VReg>,
    pub kind: InstrKind,
}

impl Instruction {
    pub fn new(result: Option<VReg>, kind: InstrKind) -> Self {
        Self { result, kind }
    }

    /// Type of the produced value.
    pub fn ty(&self) -> IrType {
        match &self.kind {
            InstrKind::Binary { lhs, .. } => lhs.ty(),
            InstrKind::SIToFP { .. } => IrType::F64,
            InstrKind::FCmp { .. } | InstrKind::ICmp { .. } => IrType::I1,
            InstrKind::ZExt { to, .. } => *to,
            InstrKind::Phi { ty, .. } | InstrKind::Load { ty, .. } => *ty,
            InstrKind::Call { ret, .. } => *ret,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::SRem => "srem",
        })
    }
}

/// Signed integer predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Ne,
    Sle,
}

impl fmt::Display for IntPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntPredicate::Ne => "ne",
            IntPredicate::Sle => "sle",
        })
    }
}

/// Ordered floating point predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl fmt::Display for FloatPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrKind {
    /// Integer arithmetic; both operands share a type.
    Binary { op: BinOp, lhs: Value, rhs: Value },
    /// Signed integer to `double`.
    SIToFP { value: Value },
    FCmp {
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    ZExt { value: Value, to: IrType },
    /// Incoming edges may be added after the phi is created.
    Phi {
        ty: IrType,
        incoming: Vec<(Value, BlockId)>,
    },
    Load { ty: IrType, ptr: Value },
    /// `params` and `variadic` describe the callee's signature, which LLVM
    /// needs spelled out for variadic calls.
    Call {
        callee: String,
        ret: IrType,
        params: Vec<IrType>,
        variadic: bool,
        args: Vec<Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// `None` returns void.
    Ret(Option<Value>),
    Br(BlockId),
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Ret(_) => Vec::new(),
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
        }
    }
}
