//! Printing the IR as LLVM textual IR.

use std::fmt::{self, Write as _};

use super::instr::{InstrKind, Instruction, Terminator};
use super::types::{BasicBlock, BlockId, ExternalFunction, Function, Global, GlobalInit, IrType, Module};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(
            f,
            "source_filename = \"{}\"",
            escape_bytes(self.source_file.as_bytes())
        )?;

        if !self.globals.is_empty() {
            writeln!(f)?;
            for global in &self.globals {
                writeln!(f, "{global}")?;
            }
        }

        if !self.externals.is_empty() {
            writeln!(f)?;
            for external in &self.externals {
                writeln!(f, "{external}")?;
            }
        }

        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.init {
            GlobalInit::CString(text) => write!(
                f,
                "@{} = private unnamed_addr constant {} c\"{}\\00\"",
                self.name,
                IrType::ByteArray(text.len() as u32 + 1),
                escape_bytes(text.as_bytes())
            ),
            GlobalInit::I32(value) => write!(f, "@{} = global i32 {value}", self.name),
        }
    }
}

impl fmt::Display for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "declare {} @{}({})",
            self.ret,
            self.name,
            signature(&self.params, self.variadic)
        )
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "define {} @{}() {{", self.ret, self.name)?;
        for (index, block) in self.blocks.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            self.write_block(f, block)?;
        }
        writeln!(f, "}}")
    }
}

impl Function {
    fn label(&self, id: BlockId) -> &str {
        &self.block(id).label
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, block: &BasicBlock) -> fmt::Result {
        writeln!(f, "{}:", block.label)?;
        for instruction in &block.instructions {
            f.write_str("  ")?;
            self.write_instruction(f, instruction)?;
            writeln!(f)?;
        }
        if let Some(terminator) = &block.terminator {
            f.write_str("  ")?;
            self.write_terminator(f, terminator)?;
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_instruction(&self, f: &mut fmt::Formatter<'_>, instruction: &Instruction) -> fmt::Result {
        if let Some(result) = instruction.result {
            write!(f, "{result} = ")?;
        }
        match &instruction.kind {
            InstrKind::Binary { op, lhs, rhs } => write!(f, "{op} {} {lhs}, {rhs}", lhs.ty()),
            InstrKind::SIToFP { value } => {
                write!(f, "sitofp {} {value} to {}", value.ty(), IrType::F64)
            }
            InstrKind::FCmp { pred, lhs, rhs } => {
                write!(f, "fcmp {pred} {} {lhs}, {rhs}", IrType::F64)
            }
            InstrKind::ICmp { pred, lhs, rhs } => {
                write!(f, "icmp {pred} {} {lhs}, {rhs}", lhs.ty())
            }
            InstrKind::ZExt { value, to } => write!(f, "zext {} {value} to {to}", value.ty()),
            InstrKind::Phi { ty, incoming } => {
                write!(f, "phi {ty} ")?;
                for (index, (value, block)) in incoming.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "[ {value}, %{} ]", self.label(*block))?;
                }
                Ok(())
            }
            InstrKind::Load { ty, ptr } => write!(f, "load {ty}, {} {ptr}", ptr.ty()),
            InstrKind::Call {
                callee,
                ret,
                params,
                variadic,
                args,
            } => {
                if *variadic {
                    write!(f, "call {ret} ({}) @{callee}(", signature(params, true))?;
                } else {
                    write!(f, "call {ret} @{callee}(")?;
                }
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {arg}", arg.ty())?;
                }
                f.write_str(")")
            }
        }
    }

    fn write_terminator(&self, f: &mut fmt::Formatter<'_>, terminator: &Terminator) -> fmt::Result {
        match terminator {
            Terminator::Ret(Some(value)) => write!(f, "ret {} {value}", value.ty()),
            Terminator::Ret(None) => f.write_str("ret void"),
            Terminator::Br(target) => write!(f, "br label %{}", self.label(*target)),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(
                f,
                "br {} {cond}, label %{}, label %{}",
                cond.ty(),
                self.label(*then_block),
                self.label(*else_block)
            ),
        }
    }
}

fn signature(params: &[IrType], variadic: bool) -> String {
    let mut parts: Vec<String> = params.iter().map(ToString::to_string).collect();
    if variadic {
        parts.push("...".to_string());
    }
    parts.join(", ")
}

/// Printable ASCII stays as is; everything else, plus `"` and `\`, becomes
/// a `\XX` hex escape.
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if (0x20..0x7f).contains(&byte) && byte != b'"' && byte != b'\\' {
            out.push(byte as char);
        } else {
            // Writing into a String cannot fail.
            let _ = write!(out, "\\{byte:02X}");
        }
    }
    out
}
