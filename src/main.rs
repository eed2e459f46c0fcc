mod cli;
mod config;
mod launcher;
mod llm;
mod logging;
mod metrics;
mod session;
mod tools;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser};
use dotenvy::dotenv;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::AppConfig;
use crate::logging::init_logging;
use crate::session::{Session, choose_session_config};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tassist",
    version,
    about = "Terminal assistant backed by a local model, with hardware, file and web tools"
)]
pub struct Cli {
    /// Run the chat session in this terminal instead of opening a new window
    #[arg(long, action = ArgAction::SetTrue)]
    interactive: bool,

    /// Config file (default: $TASSIST_CONFIG, then <config dir>/term-assist/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model server base URL (env OLLAMA_HOST)
    #[arg(long)]
    base_url: Option<String>,

    /// Model name; skips the model menu (env TASSIST_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Leave out network-backed tools; skips the offline prompt
    #[arg(long, action = ArgAction::SetTrue)]
    offline: bool,

    /// Log level (error,warn,info,debug,trace; env TASSIST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv().ok();
    let cli = Cli::parse();
    let cfg = AppConfig::from_cli(&cli)?;
    init_logging(&cfg.log_level, &cfg.log_file)?;
    info!(
        base_url = %cfg.base_url,
        model = ?cfg.model,
        interactive = cli.interactive,
        "app config"
    );

    if cli.interactive {
        run_interactive(cfg).await?;
        Ok(ExitCode::SUCCESS)
    } else {
        let forwarded: Vec<_> = std::env::args_os().skip(1).collect();
        let outcome = launcher::launch(&cfg.terminal, &forwarded)?;
        Ok(ExitCode::from(outcome.exit_code()))
    }
}

async fn run_interactive(cfg: AppConfig) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin());
    let mut out = io::stdout();

    let Some(session_cfg) = choose_session_config(&cfg, &mut input, &mut out).await? else {
        return Ok(());
    };
    let mut session = Session::new(cfg, session_cfg)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });

    session.run(&mut input, &mut out, &mut rx).await
}
