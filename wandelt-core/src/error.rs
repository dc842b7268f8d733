use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("lexing failed with {errors} error(s)")]
    LexFailed { errors: usize },
    #[error("parsing failed with {errors} syntax error(s)")]
    ParseFailed { errors: usize },
    #[error("failed to write IR to {path}: {source}")]
    WriteIr {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
