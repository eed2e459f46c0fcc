mod commands;
#[cfg(test)]
mod tests;

pub use commands::Command;

use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli;
use crate::config::{AppConfig, SessionConfig};
use crate::llm::{
    ConversationHistory, DispatchError, Dispatcher, OllamaClient, TurnEvent, TurnSink,
};
use crate::metrics::HostReport;
use crate::tools::ToolRegistry;

/// Ask for whatever the configuration left open: model, art style and
/// offline mode. `None` if input ends before the answers are complete.
pub async fn choose_session_config<R, W>(
    app: &AppConfig,
    input: &mut R,
    out: &mut W,
) -> Result<Option<SessionConfig>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let model = match &app.model {
        Some(m) => m.clone(),
        None => match cli::select_model(input, out, &app.models).await? {
            Some(m) => m,
            None => return Ok(None),
        },
    };
    let Some(art) = cli::select_art(input, out).await? else {
        return Ok(None);
    };
    let offline = match app.offline {
        Some(o) => o,
        None => match cli::select_offline(input, out).await? {
            Some(o) => o,
            None => return Ok(None),
        },
    };
    Ok(Some(SessionConfig {
        model,
        offline,
        art,
        base_url: app.base_url.clone(),
    }))
}

/// Dispatcher bound to one session configuration.
pub fn build_dispatcher(app: &AppConfig, cfg: &SessionConfig) -> Result<Dispatcher> {
    let client = OllamaClient::with_llm_config(cfg.base_url.clone(), app.llm.clone())?;
    let tools = ToolRegistry::new(cfg.offline, &app.tools, app.web_search_api_key.clone())?;
    let filter = app.output_filter_for(&cfg.model);
    debug!(
        model = %cfg.model,
        filtered = !filter.is_passthrough(),
        tools = ?tools.enabled(),
        "binding dispatcher"
    );
    Ok(Dispatcher::new(
        client,
        cfg.model.clone(),
        tools,
        filter,
        app.tool_results,
    ))
}

/// The interactive command loop. Owns the conversation history for the
/// lifetime of the process.
pub struct Session {
    app: AppConfig,
    config: SessionConfig,
    history: ConversationHistory,
    dispatcher: Dispatcher,
    system_context: String,
}

impl Session {
    pub fn new(app: AppConfig, config: SessionConfig) -> Result<Self> {
        let system_context = cli::build_system_context(config.offline, &HostReport::collect());
        Self::with_system_context(app, config, system_context)
    }

    pub fn with_system_context(
        app: AppConfig,
        config: SessionConfig,
        system_context: String,
    ) -> Result<Self> {
        let dispatcher = build_dispatcher(&app, &config)?;
        info!(model = %config.model, offline = config.offline, "session started");
        Ok(Self {
            app,
            config,
            history: ConversationHistory::new(),
            dispatcher,
            system_context,
        })
    }

    #[cfg(test)]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[cfg(test)]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Read commands from `input` until exit, end of input or an interrupt at
    /// the prompt. An interrupt while a turn runs cancels just that turn, and
    /// one inside the model menu returns to the prompt.
    pub async fn run<R, W>(
        &mut self,
        input: &mut R,
        out: &mut W,
        interrupts: &mut UnboundedReceiver<()>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        cli::print_banner(out, &self.config)?;
        loop {
            queue!(out, SetForegroundColor(Color::Cyan), Print("> "), ResetColor)?;
            out.flush()?;

            let line = tokio::select! {
                biased;
                _ = next_interrupt(interrupts) => {
                    writeln!(out)?;
                    cli::print_goodbye(out)?;
                    return Ok(());
                }
                line = cli::read_line(input) => line?,
            };
            let Some(line) = line else {
                writeln!(out)?;
                cli::print_goodbye(out)?;
                return Ok(());
            };

            match Command::parse(&line) {
                Command::Exit => {
                    cli::print_goodbye(out)?;
                    return Ok(());
                }
                Command::Help => cli::print_help(out)?,
                Command::SysInfo => cli::print_system_info(out, &HostReport::collect())?,
                Command::Clear => cli::print_banner(out, &self.config)?,
                Command::ChangeModel => {
                    // An interrupt inside the menu abandons it and keeps the current model
                    let picked = tokio::select! {
                        biased;
                        _ = next_interrupt(interrupts) => None,
                        picked = cli::select_model(input, out, &self.app.models) => Some(picked?),
                    };
                    match picked {
                        None => {
                            debug!(model = %self.config.model, "model menu interrupted");
                            writeln!(out)?;
                        }
                        Some(None) => {
                            cli::print_goodbye(out)?;
                            return Ok(());
                        }
                        Some(Some(model)) => {
                            self.change_model(model)?;
                            cli::print_banner(out, &self.config)?;
                        }
                    }
                }
                Command::Prompt(text) => self.turn(text, out, interrupts).await?,
                Command::Empty => {}
            }
        }
    }

    /// Rebind the dispatcher to `model`. History, offline mode and the system
    /// context carry over.
    pub fn change_model(&mut self, model: String) -> Result<()> {
        let config = self.config.with_model(model);
        let dispatcher = build_dispatcher(&self.app, &config)?;
        info!(
            from = self.dispatcher.model(),
            to = dispatcher.model(),
            kept_messages = self.history.len(),
            "model changed"
        );
        self.dispatcher = dispatcher;
        self.config = config;
        Ok(())
    }

    async fn turn<W: Write>(
        &mut self,
        text: String,
        out: &mut W,
        interrupts: &mut UnboundedReceiver<()>,
    ) -> Result<()> {
        self.history.append_user(text);
        queue!(
            out,
            SetForegroundColor(Color::Green),
            Print(format!("{}: ", self.config.art.emoji()))
        )?;
        out.flush()?;

        let cancel = CancellationToken::new();
        let mut sink = WriterSink::new(out);
        let result = {
            let turn = self.dispatcher.run_turn(
                &self.system_context,
                &mut self.history,
                &mut sink,
                cancel.clone(),
            );
            tokio::select! {
                res = turn => res,
                _ = next_interrupt(interrupts) => {
                    cancel.cancel();
                    Err(DispatchError::Cancelled)
                }
            }
        };
        if let Some(e) = sink.failed.take() {
            return Err(e.into());
        }

        if let Err(e) = result {
            warn!(err = %e, "turn ended with error");
            let line = match e {
                DispatchError::Cancelled => "(cancelled)".to_string(),
                other => format!("❌ Error: {other}"),
            };
            queue!(out, SetForegroundColor(Color::Red), Print(line))?;
        }
        queue!(out, ResetColor, Print("\n"))?;
        out.flush()?;
        Ok(())
    }
}

/// Writes turn events straight through to the terminal. The first write error
/// is kept and later events are dropped.
struct WriterSink<'a, W: Write> {
    out: &'a mut W,
    failed: Option<io::Error>,
}

impl<'a, W: Write> WriterSink<'a, W> {
    fn new(out: &'a mut W) -> Self {
        Self { out, failed: None }
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> TurnSink for WriterSink<'_, W> {
    fn emit(&mut self, event: TurnEvent<'_>) {
        if self.failed.is_some() {
            return;
        }
        let res = match event {
            TurnEvent::Content(text) => self.write(text),
            TurnEvent::ToolStarted(name) => self.write(&format!("\n🔧 Running tool: {name}\n")),
        };
        if let Err(e) = res {
            self.failed = Some(e);
        }
    }
}

/// Resolves on the next interrupt. A closed channel never resolves.
async fn next_interrupt(interrupts: &mut UnboundedReceiver<()>) {
    if interrupts.recv().await.is_none() {
        std::future::pending::<()>().await;
    }
}

