use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::tools::ToolError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQueryArgs {
    pub query: String,
}

#[derive(Debug, Clone, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    max_results: u32,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
}

/// Client for the Tavily search API. The key is optional so a session can
/// start without one; the tool reports the missing credential when called.
#[derive(Debug, Clone)]
pub struct WebSearchClient {
    pub base_url: String,
    api_key: Option<String>,
    inner: reqwest::Client,
}

impl WebSearchClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            inner,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.base_url.trim_end_matches('/'))
    }

    /// Ask for a synthesized answer using advanced depth over at most five results.
    pub async fn search(&self, query: &str) -> Result<String, ToolError> {
        let api_key = self.api_key.as_deref().ok_or(ToolError::CredentialMissing)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ToolError::WebSearch(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);

        let req = SearchRequest {
            query,
            search_depth: "advanced",
            max_results: 5,
            include_answer: true,
            include_raw_content: true,
        };
        let url = self.endpoint();
        debug!(endpoint=%url, query, "sending web search");

        let resp = self
            .inner
            .post(&url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| ToolError::WebSearch(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(status=%status.as_u16(), body=%text, "web search non-success status");
            return Err(ToolError::WebSearch(format!("{status} - {text}")));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| ToolError::WebSearch(format!("malformed response: {e}")))?;
        body.answer
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| ToolError::WebSearch("response did not include an answer".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    #[tokio::test]
    async fn search_returns_answer() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/search"),
                request::headers(contains(key("authorization"))),
                request::body(json_decoded(eq(serde_json::json!({
                    "query": "rust release",
                    "search_depth": "advanced",
                    "max_results": 5,
                    "include_answer": true,
                    "include_raw_content": true
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "query": "rust release",
                "answer": "Rust 1.90 is out.",
                "results": []
            }))),
        );

        let client =
            WebSearchClient::new(server.url_str("/"), Some("tvly-test".into())).unwrap();
        let answer = client.search("rust release").await.unwrap();
        assert_eq!(answer, "Rust 1.90 is out.");
    }

    #[tokio::test]
    async fn search_without_key_is_credential_error() {
        let client = WebSearchClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.search("anything").await.unwrap_err();
        assert!(matches!(err, ToolError::CredentialMissing));
    }

    #[tokio::test]
    async fn search_missing_answer_is_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/search"))
                .respond_with(json_encoded(serde_json::json!({"results": []}))),
        );
        let client = WebSearchClient::new(server.url_str(""), Some("k".into())).unwrap();
        let err = client.search("q").await.unwrap_err();
        assert!(matches!(err, ToolError::WebSearch(_)));
    }

    #[tokio::test]
    async fn search_server_error_is_reported() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/search"))
                .respond_with(status_code(401).body("unauthorized")),
        );
        let client = WebSearchClient::new(server.url_str(""), Some("k".into())).unwrap();
        let err = client.search("q").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
