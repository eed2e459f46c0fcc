mod client_core;
mod dispatch;
mod history;
mod output_filter;
mod stream;
pub mod types;

use reqwest::StatusCode;

pub use client_core::OllamaClient;
pub use dispatch::{DispatchError, Dispatcher, TurnEvent, TurnSink};
pub use history::ConversationHistory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmErrorKind {
    RateLimited,
    Server,
    Network,
    Timeout,
    Client,
    Deserialize,
    Cancelled,
    Unknown,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LlmErrorKind::RateLimited => "rate limited",
            LlmErrorKind::Server => "server error",
            LlmErrorKind::Network => "network error",
            LlmErrorKind::Timeout => "timed out",
            LlmErrorKind::Client => "request rejected",
            LlmErrorKind::Deserialize => "malformed response",
            LlmErrorKind::Cancelled => "cancelled",
            LlmErrorKind::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

impl std::error::Error for LlmErrorKind {}

pub fn classify_error(status: Option<StatusCode>, err: &anyhow::Error) -> LlmErrorKind {
    if let Some(st) = status {
        if st == StatusCode::TOO_MANY_REQUESTS {
            return LlmErrorKind::RateLimited;
        }
        if st.is_server_error() {
            return LlmErrorKind::Server;
        }
        if st.is_client_error() {
            return LlmErrorKind::Client;
        }
    }
    if let Some(kind) = err.downcast_ref::<LlmErrorKind>() {
        return kind.clone();
    }
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        if e.is_timeout() {
            return LlmErrorKind::Timeout;
        }
        if e.is_connect() || e.is_body() || e.is_request() {
            return LlmErrorKind::Network;
        }
    }
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return LlmErrorKind::Deserialize;
    }
    LlmErrorKind::Unknown
}

pub(crate) fn should_retry(kind: &LlmErrorKind) -> bool {
    matches!(
        kind,
        LlmErrorKind::RateLimited
            | LlmErrorKind::Server
            | LlmErrorKind::Network
            | LlmErrorKind::Timeout
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_status() {
        let e = anyhow::anyhow!("x");
        assert_eq!(
            classify_error(Some(StatusCode::TOO_MANY_REQUESTS), &e),
            LlmErrorKind::RateLimited
        );
        assert_eq!(
            classify_error(Some(StatusCode::BAD_GATEWAY), &e),
            LlmErrorKind::Server
        );
        assert_eq!(
            classify_error(Some(StatusCode::NOT_FOUND), &e),
            LlmErrorKind::Client
        );
        assert_eq!(classify_error(None, &e), LlmErrorKind::Unknown);
    }

    #[test]
    fn classify_wrapped_kind_and_json() {
        let e = anyhow::anyhow!(LlmErrorKind::Cancelled);
        assert_eq!(classify_error(None, &e), LlmErrorKind::Cancelled);
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            classify_error(None, &anyhow::Error::new(json_err)),
            LlmErrorKind::Deserialize
        );
        assert!(!should_retry(&LlmErrorKind::Client));
        assert!(should_retry(&LlmErrorKind::Server));
    }
}
