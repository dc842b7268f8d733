use std::fs;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::codegen_llvm::generate_ir;
use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::CoreError;
use crate::ir::Module;
use crate::lexer::lex;
use crate::parser::parse;

/// Which intermediate results are dumped at `debug` level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbosity {
    pub lexer: bool,
    pub parser: bool,
    pub codegen: bool,
}

impl Verbosity {
    pub fn all() -> Self {
        Self {
            lexer: true,
            parser: true,
            codegen: true,
        }
    }

    pub fn any(self) -> bool {
        self.lexer || self.parser || self.codegen
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Name used in diagnostics and as the module's `source_filename`.
    pub file_name: String,
    pub verbosity: Verbosity,
    pub module_name: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            file_name: "<stdin>".to_string(),
            verbosity: Verbosity::default(),
            module_name: "wandelt".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CompilationArtifact {
    pub module: Module,
    /// Textual LLVM IR of `module`.
    pub ir: String,
}

/// Read a source file.
pub fn read_source(path: impl AsRef<Path>) -> Result<String, CoreError> {
    Ok(fs::read_to_string(path)?)
}

/// Run lexer, parser and code generator over `source`.
///
/// Diagnostics of every phase that ran are forwarded to `sink` before an
/// error is returned. A phase only runs if the previous one was clean.
pub fn compile(
    source: &str,
    options: &CompilerOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<CompilationArtifact, CoreError> {
    let started = Instant::now();
    let lexed = lex(&options.file_name, source);
    debug!(
        tokens = lexed.tokens.len(),
        elapsed = ?started.elapsed(),
        "lexing finished"
    );
    if options.verbosity.lexer {
        for token in &lexed.tokens {
            debug!("{token}");
        }
    }
    if !lexed.is_valid() {
        forward(sink, &lexed.diagnostics);
        return Err(CoreError::LexFailed {
            errors: lexed.diagnostics.len(),
        });
    }

    let started = Instant::now();
    let parsed = parse(&lexed.tokens);
    debug!(
        statements = parsed.statements.len(),
        nodes = parsed.ast.len(),
        elapsed = ?started.elapsed(),
        "parsing finished"
    );
    if options.verbosity.parser {
        debug!("syntax tree:\n{}", parsed.ast.dump_statements(&parsed.statements));
    }
    if !parsed.is_valid() {
        forward(sink, &parsed.diagnostics);
        return Err(CoreError::ParseFailed {
            errors: parsed.diagnostics.len(),
        });
    }

    let started = Instant::now();
    let module = generate_ir(&parsed.ast, &parsed.statements, options);
    let ir = module.to_string();
    debug!(elapsed = ?started.elapsed(), "code generation finished");
    if options.verbosity.codegen {
        debug!("generated IR:\n{ir}");
    }

    info!(file = %options.file_name, "compiled");
    Ok(CompilationArtifact { module, ir })
}

/// Compile `source` and return only the textual IR.
pub fn emit_llvm_ir(
    source: &str,
    options: &CompilerOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<String, CoreError> {
    compile(source, options, sink).map(|artifact| artifact.ir)
}

fn forward(sink: &mut dyn DiagnosticSink, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        sink.report(diagnostic);
    }
}
