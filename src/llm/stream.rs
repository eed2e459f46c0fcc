use anyhow::{Context, Result, anyhow};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::llm::client_core::OllamaClient;
use crate::llm::types::{ChatMessage, ChatOptions, ChatRequest, ChatStreamLine, StreamChunk, ToolDef};
use crate::llm::{LlmErrorKind, classify_error, should_retry};

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

impl OllamaClient {
    /// Open a streamed chat completion. Only establishing the stream is
    /// retried; a failure mid-stream surfaces as an `Err` item.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDef>,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let url = self.chat_endpoint();
        let req = ChatRequest {
            model: model.to_string(),
            messages,
            tools,
            stream: true,
            options: ChatOptions {
                temperature: self.llm_cfg.temperature,
            },
        };

        if let Ok(payload) = serde_json::to_string_pretty(&req) {
            debug!(payload=%payload, endpoint=%url, "sending chat payload (stream)");
        }

        let mut attempt = 1usize;
        let max_attempts = self.llm_cfg.max_retries.saturating_add(1);
        let resp = loop {
            let fut = self.inner.post(&url).json(&req).send();
            let resp_res = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("chat_stream cancelled before send");
                    return Err(anyhow!(LlmErrorKind::Cancelled));
                }
                res = fut => res,
            };

            let err = match resp_res {
                Ok(resp) if resp.status().is_success() => break resp,
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    let e = anyhow!("chat error: {} - {}", status, text.trim());
                    (classify_error(Some(status), &e), e)
                }
                Err(e) => {
                    let e = anyhow::Error::new(e).context("send chat request (stream)");
                    (classify_error(None, &e), e)
                }
            };
            let (kind, e) = err;
            if attempt < max_attempts && should_retry(&kind) {
                let wait = self.backoff_delay(attempt);
                warn!(attempt, kind=?kind, err=%e, wait_ms=%wait.as_millis(), "retrying stream establish");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("chat_stream cancelled during retry sleep");
                        return Err(anyhow!(LlmErrorKind::Cancelled));
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
                attempt += 1;
                continue;
            }
            return Err(e);
        };

        let mut byte_stream = resp.bytes_stream();
        let mut buf = Vec::<u8>::new();

        let stream = async_stream::try_stream! {
            let mut finished = false;
            while !finished {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("chat_stream cancelled during read");
                        Err(anyhow!(LlmErrorKind::Cancelled))
                    }
                    chunk = byte_stream.next() => match chunk {
                        Some(Ok(bytes)) => Ok(Some(bytes)),
                        Some(Err(e)) => Err(anyhow::Error::new(e).context("byte stream read error")),
                        None => Ok(None),
                    }
                };

                let lines = match next? {
                    Some(bytes) => {
                        buf.extend_from_slice(&bytes);
                        drain_lines(&mut buf)
                    }
                    None => {
                        // Servers may omit the newline after the final object
                        finished = true;
                        let rest = std::mem::take(&mut buf);
                        vec![rest]
                    }
                };

                for line in lines {
                    match parse_line(&line)? {
                        None => {}
                        Some(parsed) => {
                            if let Some(msg) = parsed.message {
                                yield StreamChunk::from(msg);
                            }
                            if parsed.done {
                                finished = true;
                                break;
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Split complete `\n`-terminated lines off the front of `buf`.
fn drain_lines(buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    for i in 0..buf.len() {
        if buf[i] == b'\n' {
            lines.push(buf[start..i].to_vec());
            start = i + 1;
        }
    }
    if start > 0 {
        buf.drain(0..start);
    }
    lines
}

fn parse_line(line: &[u8]) -> Result<Option<ChatStreamLine>> {
    let s = std::str::from_utf8(line).context("stream line is not valid UTF-8")?;
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    debug!(response_chunk=%s, "chat_stream line");
    let parsed: ChatStreamLine =
        serde_json::from_str(s).with_context(|| format!("malformed stream line: {s}"))?;
    if let Some(err) = parsed.error {
        return Err(anyhow!("backend error: {err}"));
    }
    Ok(Some(parsed))
}
