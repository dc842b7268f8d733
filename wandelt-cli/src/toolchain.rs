//! Invocation of the native compiler that turns textual IR into an
//! executable.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// Flags passed after the input and output paths.
const EXTRA_FLAGS: &[&str] = &["-Wno-override-module"];

/// Build the `<cc> <ir> -o <output> -Wno-override-module` command.
pub fn command(cc: &str, ir: &Path, output: &Path) -> Command {
    let mut command = Command::new(cc);
    command.arg(ir).arg("-o").arg(output).args(EXTRA_FLAGS);
    command
}

/// Compile `ir` into the executable `output` using `cc`.
pub fn link(cc: &str, ir: &Path, output: &Path) -> Result<()> {
    let mut command = command(cc, ir, output);
    debug!(?command, "invoking native toolchain");

    let status = command
        .status()
        .with_context(|| format!("failed to launch native toolchain `{cc}`"))?;
    if !status.success() {
        bail!("native toolchain `{cc}` exited with {status}");
    }

    info!(output = %output.display(), "saved executable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_command_line() {
        let command = command("clang", Path::new("output.ll"), Path::new("prog"));
        assert_eq!(command.get_program(), "clang");
        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["output.ll", "-o", "prog", "-Wno-override-module"]);
    }

    #[test]
    fn missing_toolchain_is_reported() {
        let err = link(
            "wandelt-no-such-compiler",
            Path::new("output.ll"),
            Path::new("prog"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to launch native toolchain"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_toolchain_is_reported() {
        let err = link("false", Path::new("output.ll"), Path::new("prog")).unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
    }
}
