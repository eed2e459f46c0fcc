use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{OutputFilterPolicy, ToolResultPolicy};
use crate::llm::client_core::OllamaClient;
use crate::llm::history::ConversationHistory;
use crate::llm::output_filter::OutputFilter;
use crate::llm::stream::ChunkStream;
use crate::llm::types::{ChatMessage, ToolCall};
use crate::llm::{LlmErrorKind, classify_error};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    CheckingBackend,
    StreamingPrimary,
    ToolDispatch,
    StreamingFollowup,
    Done,
    Error,
}

/// What a turn shows the user while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent<'a> {
    Content(&'a str),
    ToolStarted(&'a str),
}

/// Receives turn output as it is produced. Implementations should render each
/// event immediately rather than buffer the turn.
pub trait TurnSink {
    fn emit(&mut self, event: TurnEvent<'_>);
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Model backend is not running at {base_url}. Please start Ollama first.")]
    BackendUnavailable { base_url: String },

    #[error("Error communicating with the model: {0:#}")]
    PrimaryStream(anyhow::Error),

    #[error("Error communicating with the model while answering with tool results: {0:#}")]
    FollowupStream(anyhow::Error),

    #[error("Turn cancelled")]
    Cancelled,
}

impl DispatchError {
    fn primary(e: anyhow::Error) -> Self {
        if classify_error(None, &e) == LlmErrorKind::Cancelled {
            return DispatchError::Cancelled;
        }
        DispatchError::PrimaryStream(e)
    }

    fn followup(e: anyhow::Error) -> Self {
        if classify_error(None, &e) == LlmErrorKind::Cancelled {
            return DispatchError::Cancelled;
        }
        DispatchError::FollowupStream(e)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnSummary {
    /// Tool results appended to history this turn.
    pub tool_results: usize,
    pub primary_chunks: usize,
    pub followup_chunks: usize,
}

/// Runs one chat turn against the backend: probe, primary stream, inline tool
/// execution, and a follow-up stream when any tool produced a result.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: OllamaClient,
    model: String,
    tools: ToolRegistry,
    filter: OutputFilterPolicy,
    tool_results: ToolResultPolicy,
}

struct PrimaryOutcome {
    chunks: usize,
    executed: Vec<(ToolCall, String)>,
}

impl Dispatcher {
    pub fn new(
        client: OllamaClient,
        model: impl Into<String>,
        tools: ToolRegistry,
        filter: OutputFilterPolicy,
        tool_results: ToolResultPolicy,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            tools,
            filter,
            tool_results,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a turn for the user message already at the end of `history`.
    ///
    /// History only grows here by tool results. On error, anything appended
    /// before the failure stays.
    pub async fn run_turn(
        &self,
        system_context: &str,
        history: &mut ConversationHistory,
        sink: &mut dyn TurnSink,
        cancel: CancellationToken,
    ) -> Result<TurnSummary, DispatchError> {
        let mut state = TurnState::Idle;
        let result = self
            .drive(&mut state, system_context, history, sink, cancel)
            .await;
        if let Err(e) = &result {
            warn!(from = ?state, err = %e, "turn failed");
            transition(&mut state, TurnState::Error);
        }
        result
    }

    async fn drive(
        &self,
        state: &mut TurnState,
        system_context: &str,
        history: &mut ConversationHistory,
        sink: &mut dyn TurnSink,
        cancel: CancellationToken,
    ) -> Result<TurnSummary, DispatchError> {
        transition(state, TurnState::CheckingBackend);
        let up = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            up = self.client.check_status() => up,
        };
        if !up {
            return Err(DispatchError::BackendUnavailable {
                base_url: self.client.base_url.clone(),
            });
        }

        transition(state, TurnState::StreamingPrimary);
        let mut outbound = history.build_outbound(system_context);
        let stream = self
            .client
            .chat_stream(
                &self.model,
                outbound.clone(),
                self.tools.definitions(),
                cancel.clone(),
            )
            .await
            .map_err(DispatchError::primary)?;
        let primary = self.consume_primary(state, stream, sink).await?;

        let mut summary = TurnSummary {
            primary_chunks: primary.chunks,
            ..TurnSummary::default()
        };
        let mut executed = primary.executed;
        if executed.is_empty() {
            transition(state, TurnState::Done);
            return Ok(summary);
        }
        if self.tool_results == ToolResultPolicy::Last && executed.len() > 1 {
            debug!(discarded = executed.len() - 1, "keeping only the last tool result");
            executed = executed.split_off(executed.len() - 1);
        }

        let (calls, results): (Vec<ToolCall>, Vec<String>) = executed.into_iter().unzip();
        outbound.push(ChatMessage::assistant_tool_calls(calls));
        for result in results {
            history.append_tool_result(result.clone());
            outbound.push(ChatMessage::tool(result));
            summary.tool_results += 1;
        }

        transition(state, TurnState::StreamingFollowup);
        let stream = self
            .client
            .chat_stream(
                &self.model,
                outbound,
                self.tools.definitions(),
                cancel.clone(),
            )
            .await
            .map_err(DispatchError::followup)?;
        summary.followup_chunks = self.consume_followup(stream, sink).await?;

        transition(state, TurnState::Done);
        info!(
            tool_results = summary.tool_results,
            primary_chunks = summary.primary_chunks,
            followup_chunks = summary.followup_chunks,
            "turn complete"
        );
        Ok(summary)
    }

    async fn consume_primary(
        &self,
        state: &mut TurnState,
        mut stream: ChunkStream,
        sink: &mut dyn TurnSink,
    ) -> Result<PrimaryOutcome, DispatchError> {
        let mut filter = OutputFilter::new(self.filter.clone());
        let mut executed = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DispatchError::primary)?;
            let show = filter.admit(&chunk.content);

            if !chunk.tool_calls.is_empty() {
                transition(state, TurnState::ToolDispatch);
                for call in chunk.tool_calls {
                    sink.emit(TurnEvent::ToolStarted(call.name()));
                    if let Some(result) = self.tools.execute(&call).await {
                        executed.push((call, result));
                    }
                }
                transition(state, TurnState::StreamingPrimary);
            }
            if show {
                sink.emit(TurnEvent::Content(&chunk.content));
            }
        }

        debug!(
            seen = filter.seen(),
            suppressed = filter.suppressed(),
            tool_calls = executed.len(),
            "primary stream finished"
        );
        Ok(PrimaryOutcome {
            chunks: filter.seen(),
            executed,
        })
    }

    async fn consume_followup(
        &self,
        mut stream: ChunkStream,
        sink: &mut dyn TurnSink,
    ) -> Result<usize, DispatchError> {
        let mut filter = OutputFilter::new(self.filter.clone());
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DispatchError::followup)?;
            if !chunk.tool_calls.is_empty() {
                // One round of tools per turn
                warn!(count = chunk.tool_calls.len(), "ignoring tool calls in follow-up stream");
            }
            if filter.admit(&chunk.content) {
                sink.emit(TurnEvent::Content(&chunk.content));
            }
        }
        debug!(
            seen = filter.seen(),
            suppressed = filter.suppressed(),
            "follow-up stream finished"
        );
        Ok(filter.seen())
    }
}

fn transition(state: &mut TurnState, next: TurnState) {
    debug!(from = ?*state, to = ?next, "turn state");
    *state = next;
}
