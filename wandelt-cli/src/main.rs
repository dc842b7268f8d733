mod toolchain;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};
use wandelt_core::{CompilerOptions, TracingSink, Verbosity, compile, write_ir};

/// Compile Wandelt source to LLVM IR or a native executable.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file; standard input is read when omitted
    #[arg(short, long)]
    input: Option<String>,

    #[arg(short, long)]
    output: String,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "exe",
        help = "Output format: exe, llvm"
    )]
    emit: String,

    #[arg(
        long,
        value_name = "PATH",
        default_value = "output.ll",
        help = "Where the IR is written before the native toolchain runs"
    )]
    ir: String,

    #[arg(long, value_name = "COMMAND", default_value = "clang")]
    cc: String,

    #[arg(long, help = "Dump the token stream")]
    verbose_lexer: bool,
    #[arg(long, help = "Dump the syntax tree")]
    verbose_parser: bool,
    #[arg(long, help = "Dump the generated IR")]
    verbose_codegen: bool,
    #[arg(short, long, help = "Enable every dump")]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose", help = "Only log warnings and errors")]
    quiet: bool,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.verbose {
            return Verbosity::all();
        }
        Verbosity {
            lexer: self.verbose_lexer,
            parser: self.verbose_parser,
            codegen: self.verbose_codegen,
        }
    }

    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::WARN
        } else if self.verbosity().any() {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());
    execute(cli)
}

/// `[LEVEL] message` lines on stderr, without time or target.
fn init_logging(filter: LevelFilter) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .with_filter(filter);

    Registry::default().with(layer).init();
}

fn execute(cli: Cli) -> Result<()> {
    let options = CompilerOptions {
        file_name: cli.input.clone().unwrap_or_else(|| "<stdin>".to_string()),
        verbosity: cli.verbosity(),
        module_name: module_name(cli.input.as_deref()),
    };

    let source = match &cli.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {path}"))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read standard input")?;
            buffer
        }
    };

    let artifact = compile(&source, &options, &mut TracingSink)?;

    match cli.emit.as_str() {
        "llvm" => {
            write_output(&cli.output, artifact.ir.as_bytes())?;
            info!(output = %cli.output, "saved IR");
        }
        "exe" => {
            let ir_path = PathBuf::from(&cli.ir);
            create_parent(&ir_path)?;
            write_ir(&artifact.module, &ir_path)?;
            toolchain::link(&cli.cc, &ir_path, Path::new(&cli.output))?;
        }
        other => return Err(anyhow::anyhow!("unsupported emit format: {other}")),
    }

    Ok(())
}

fn module_name(input: Option<&str>) -> String {
    input
        .and_then(|path| Path::new(path).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| CompilerOptions::default().module_name)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    Ok(())
}

fn write_output(path: &str, bytes: &[u8]) -> Result<()> {
    create_parent(Path::new(path))?;
    fs::write(path, bytes).with_context(|| format!("failed to write output file {path}"))?;
    Ok(())
}
