use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

/// Argument vector that runs this binary in interactive mode inside
/// `terminal` (emulator program plus its "execute" flag).
pub fn build_command(
    terminal: &[String],
    exe: &Path,
    forwarded: &[OsString],
) -> Result<process::Command> {
    let Some((program, flags)) = terminal.split_first() else {
        bail!("no terminal emulator configured");
    };
    let mut cmd = process::Command::new(program);
    cmd.args(flags)
        .arg(exe)
        .arg("--interactive")
        .args(forwarded);
    Ok(cmd)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Exited,
    TerminalMissing,
}

impl LaunchOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            LaunchOutcome::Exited => 0,
            LaunchOutcome::TerminalMissing => 1,
        }
    }
}

/// Open a terminal window running the interactive session and wait for it.
pub fn launch(terminal: &[String], forwarded: &[OsString]) -> Result<LaunchOutcome> {
    let exe = std::env::current_exe().context("resolve current executable")?;
    let mut cmd = build_command(terminal, &exe, forwarded)?;
    info!(terminal = ?terminal, exe = %exe.display(), "launching interactive session");

    match cmd.status() {
        Ok(status) => {
            info!(%status, "terminal exited");
            Ok(LaunchOutcome::Exited)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let program = terminal.first().map(String::as_str).unwrap_or_default();
            warn!(program, "terminal emulator not found");
            eprintln!("❌ Error: {program} not found. Please install it first:");
            eprintln!("sudo apt install {program}");
            Ok(LaunchOutcome::TerminalMissing)
        }
        Err(e) => Err(e).with_context(|| format!("spawn terminal {terminal:?}")),
    }
}
