//! Core compiler pipeline for the Wandelt language.
//!
//! The pipeline is strictly sequential:
//!
//!   source .wdt
//!     -> lexer        (tokens)
//!     -> parser       (arena AST + syntax diagnostics)
//!     -> codegen_llvm (SSA IR, printed as LLVM textual IR)
//!
//! Higher-level tools (the CLI, tests) should depend on this crate rather
//! than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------

pub mod builtins;

// ---------------------------------------------------------------------
// Back-end: IR, code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod ir;
pub mod codegen_llvm;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use codegen_llvm::{generate_ir, write_ir};
pub use compiler::{
    CompilationArtifact, CompilerOptions, Verbosity, compile, emit_llvm_ir, read_source,
};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
pub use error::CoreError;
