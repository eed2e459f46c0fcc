use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Stdout is the chat surface, so logs always go to a file.
pub fn init_logging(level: &str, log_file: &Path) -> Result<()> {
    let file = open_log_file(log_file)?;
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::sync::Arc::new(file))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!(path=%log_file.display(), "logging initialized");
    Ok(())
}

/// Opens the log for appending so earlier sessions survive a restart.
fn open_log_file(log_file: &Path) -> Result<File> {
    if let Some(dir) = log_file.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create log directory: {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("open log file: {}", log_file.display()))
}
