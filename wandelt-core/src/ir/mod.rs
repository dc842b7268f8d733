//! Wandelt intermediate representation.
//!
//! A small block-structured SSA IR. It models only what the code generator
//! emits and prints itself as LLVM textual IR, so the output can be handed
//! straight to `clang`.

mod builder;
mod instr;
mod text;
mod types;

pub use builder::*;
pub use instr::*;
pub use types::*;
