use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;

/// HTTP client for an Ollama-compatible model server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    pub base_url: String,
    pub(crate) inner: reqwest::Client,
    pub llm_cfg: LlmConfig,
}

impl OllamaClient {
    #[cfg(test)]
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_llm_config(base_url, LlmConfig::default())
    }

    pub fn with_llm_config(base_url: impl Into<String>, cfg: LlmConfig) -> Result<Self> {
        // No overall timeout: a generation may legitimately stream for minutes
        let inner = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            inner,
            llm_cfg: cfg,
        })
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub(crate) fn chat_endpoint(&self) -> String {
        format!("{}/api/chat", self.base())
    }

    pub(crate) fn tags_endpoint(&self) -> String {
        format!("{}/api/tags", self.base())
    }

    /// Liveness probe: the server answers `GET /api/tags` with 200 within the
    /// probe timeout.
    pub async fn check_status(&self) -> bool {
        let timeout = Duration::from_millis(self.llm_cfg.probe_timeout_ms);
        match self
            .inner
            .get(self.tags_endpoint())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(resp) => {
                let ok = resp.status() == reqwest::StatusCode::OK;
                debug!(status = resp.status().as_u16(), ok, "backend liveness probe");
                ok
            }
            Err(e) => {
                warn!(err=%e, base_url=%self.base_url, "backend liveness probe failed");
                false
            }
        }
    }

    pub(crate) fn backoff_delay(&self, attempt: usize) -> Duration {
        let base = self.llm_cfg.retry_base_ms;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1).min(16) as u32));
        let jitter = self.llm_cfg.retry_jitter_ms;
        let rnd = if jitter == 0 { 0 } else { fastrand::u64(0..=jitter) };
        Duration::from_millis(exp.saturating_add(rnd))
    }
}
