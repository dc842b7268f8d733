//! Values, types and containers of the IR.

use std::fmt;

use super::instr::{Instruction, Terminator};

/// A virtual register (SSA value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VReg(pub u32);

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}", self.0)
    }
}

/// Index of a basic block inside its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrType {
    I1,
    I32,
    F64,
    /// Opaque pointer.
    Ptr,
    /// `[N x i8]`, used for string constants.
    ByteArray(u32),
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::I1 => f.write_str("i1"),
            IrType::I32 => f.write_str("i32"),
            IrType::F64 => f.write_str("double"),
            IrType::Ptr => f.write_str("ptr"),
            IrType::ByteArray(len) => write!(f, "[{len} x i8]"),
        }
    }
}

/// Operand of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// 32-bit integer constant.
    Int(i32),
    Reg(VReg, IrType),
    /// Address of a module global, without the `@` sigil.
    Global(String),
}

impl Value {
    pub fn ty(&self) -> IrType {
        match self {
            Value::Int(_) => IrType::I32,
            Value::Reg(_, ty) => *ty,
            Value::Global(_) => IrType::Ptr,
        }
    }

    pub fn as_const(&self) -> Option<i32> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_reg(&self) -> Option<VReg> {
        match self {
            Value::Reg(reg, _) => Some(*reg),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Reg(reg, _) => write!(f, "{reg}"),
            Value::Global(name) => write!(f, "@{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalInit {
    /// Private NUL-terminated string constant.
    CString(String),
    /// Mutable `i32` with an initial value.
    I32(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub init: GlobalInit,
}

/// Function defined outside the module, e.g. `printf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFunction {
    pub name: String,
    pub params: Vec<IrType>,
    pub ret: IrType,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// Function defined in the module. The first block is the entry block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub ret: IrType,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn new(name: impl Into<String>, ret: IrType) -> Self {
        Self {
            name: name.into(),
            ret,
            blocks: Vec::new(),
        }
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn find_block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub source_file: String,
    pub globals: Vec<Global>,
    pub externals: Vec<ExternalFunction>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_file: source_file.into(),
            globals: Vec::new(),
            externals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|global| global.name == name)
    }

    pub fn external(&self, name: &str) -> Option<&ExternalFunction> {
        self.externals.iter().find(|external| external.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }
}
