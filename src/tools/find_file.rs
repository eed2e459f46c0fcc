//! The `find_file` tool: locate files by name under a directory.
//!
//! The search is delegated to the system `find` binary. Every value the model
//! supplies is passed as its own argv entry; nothing is ever handed to a shell,
//! so a filename such as `x; rm -rf ~` is only ever a (non-matching) pattern.
//!
//! # Examples
//!
//! ```ignore
//! let args = FindFileArgs {
//!     filename: "*.toml".to_string(),
//!     path: "/home/me/src".to_string(),
//!     options: Some(vec!["-maxdepth".into(), "2".into()]),
//! };
//! let result = find_file(&args, Duration::from_secs(30)).await?;
//! println!("{}", result.render());
//! ```

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::tools::ToolError;

/// `find` predicates that act on the filesystem or write files. The model may
/// narrow a search with extra options, never turn it into a mutation.
const FORBIDDEN_OPTIONS: &[&str] = &[
    "-exec", "-execdir", "-ok", "-okdir", "-delete", "-fprint", "-fprint0", "-fprintf", "-fls",
];

/// Arguments for the `find_file` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindFileArgs {
    /// Name or shell-style pattern handed to `find -name`, e.g. `"main.rs"` or `"*.log"`.
    pub filename: String,
    /// Directory the search starts from.
    pub path: String,
    /// Extra `find` arguments appended after the name test, e.g. `["-type", "f"]`.
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// The result returned by the `find_file` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FindFileResult {
    /// Matching paths, one per line of `find` output. Empty when nothing matched.
    pub files: Vec<String>,
}

impl FindFileResult {
    /// List representation handed back to the model, `[]` when empty.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.files).unwrap_or_else(|_| "[]".to_string())
    }
}

impl FindFileArgs {
    fn validate(&self) -> Result<(), ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: "find_file",
            reason,
        };
        if self.filename.is_empty() {
            return Err(invalid("filename must not be empty".into()));
        }
        if self.path.is_empty() {
            return Err(invalid("path must not be empty".into()));
        }
        // A leading dash would make find parse the root as an expression
        if self.path.starts_with('-') {
            return Err(invalid(format!("path must not start with '-': {}", self.path)));
        }
        for opt in self.options.iter().flatten() {
            if FORBIDDEN_OPTIONS.contains(&opt.as_str()) {
                return Err(invalid(format!("option not allowed: {opt}")));
            }
        }
        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("find");
        cmd.arg(&self.path)
            .arg("-name")
            .arg(&self.filename)
            .args(self.options.iter().flatten())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

/// Run `find <path> -name <filename> [options...]`, bounded by `timeout`.
pub async fn find_file(args: &FindFileArgs, timeout: Duration) -> Result<FindFileResult, ToolError> {
    args.validate()?;
    debug!(path=%args.path, filename=%args.filename, options=?args.options, "running find");

    let output = match tokio::time::timeout(timeout, args.command().output()).await {
        Err(_) => {
            warn!(path=%args.path, timeout_ms=%timeout.as_millis(), "find timed out");
            return Err(ToolError::Timeout);
        }
        Ok(Err(e)) => return Err(ToolError::Unexpected(e.to_string())),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ToolError::CommandFailed(stderr));
    }

    let files = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    Ok(FindFileResult { files })
}
