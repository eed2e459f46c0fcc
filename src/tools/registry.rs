use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ToolsConfig;
use crate::llm::types::{ToolCall, ToolDef, ToolFunctionDef};
use crate::tools::find_file::{FindFileArgs, find_file};
use crate::tools::hardware::hardware_temperatures;
use crate::tools::web_search::{SearchQueryArgs, WebSearchClient};
use crate::tools::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    HardwareTemperatures,
    FindFile,
    SearchQuery,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::HardwareTemperatures,
        ToolName::FindFile,
        ToolName::SearchQuery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::HardwareTemperatures => "get_hardware_temperatures",
            ToolName::FindFile => "find_file",
            ToolName::SearchQuery => "search_query",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    fn needs_network(self) -> bool {
        matches!(self, ToolName::SearchQuery)
    }

    fn definition(self) -> ToolDef {
        let (description, parameters) = match self {
            ToolName::HardwareTemperatures => (
                "Get current hardware temperatures (CPU, disk, etc.). ONLY use this function when the user specifically asks about hardware temperatures or thermal status.",
                json!({"type": "object", "properties": {}}),
            ),
            ToolName::FindFile => (
                "Find a file by name under a directory. `filename` is a name or shell-style pattern (e.g. `*.log`), `path` is the directory to search in, and `options` are optional extra arguments for the find command (e.g. [\"-type\", \"f\"]). Returns a list of matching paths.",
                json!({
                    "type": "object",
                    "properties": {
                        "filename": {"type": "string", "description": "Name of the file to search"},
                        "path": {"type": "string", "description": "Path to search in"},
                        "options": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Optional arguments for the find command"
                        }
                    },
                    "required": ["filename", "path"]
                }),
            ),
            ToolName::SearchQuery => (
                "Search for a query on the Internet and return a synthesized answer.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"}
                    },
                    "required": ["query"]
                }),
            ),
        };
        ToolDef {
            kind: "function".into(),
            function: ToolFunctionDef {
                name: self.as_str().into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// The fixed catalog bound to one session. Offline sessions leave out the
/// network-backed tools.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    enabled: Vec<ToolName>,
    find_timeout: Duration,
    web: WebSearchClient,
}

impl ToolRegistry {
    pub fn new(offline: bool, cfg: &ToolsConfig, web_search_api_key: Option<String>) -> Result<Self> {
        let enabled = ToolName::ALL
            .into_iter()
            .filter(|t| !(offline && t.needs_network()))
            .collect();
        Ok(Self {
            enabled,
            find_timeout: Duration::from_secs(cfg.find_timeout_secs),
            web: WebSearchClient::new(cfg.web_search_url.clone(), web_search_api_key)?,
        })
    }

    pub fn enabled(&self) -> &[ToolName] {
        &self.enabled
    }

    pub fn definitions(&self) -> Vec<ToolDef> {
        self.enabled.iter().map(|t| t.definition()).collect()
    }

    /// Run the tool a call names. Returns `None` when the name is not in this
    /// registry; tool failures come back as their error text.
    pub async fn execute(&self, call: &ToolCall) -> Option<String> {
        let Some(tool) = ToolName::from_name(call.name()).filter(|t| self.enabled.contains(t))
        else {
            warn!(tool = call.name(), "ignoring call to unregistered tool");
            return None;
        };
        debug!(tool = tool.as_str(), args = %call.function.arguments, "executing tool");

        let result = self.run(tool, &call.function.arguments).await;
        Some(match result {
            Ok(output) => {
                info!(tool = tool.as_str(), bytes = output.len(), "tool succeeded");
                output
            }
            Err(e) => {
                warn!(tool = tool.as_str(), err = %e, "tool failed");
                e.to_string()
            }
        })
    }

    async fn run(&self, tool: ToolName, args: &JsonValue) -> Result<String, ToolError> {
        match tool {
            // A panic in the sensor read comes back as a JoinError
            ToolName::HardwareTemperatures => tokio::task::spawn_blocking(hardware_temperatures)
                .await
                .map_err(|e| {
                    warn!(err = %e, "sensor read aborted");
                    ToolError::SensorsUnavailable
                })?,
            ToolName::FindFile => {
                let args: FindFileArgs = parse_args(tool, args)?;
                let found = find_file(&args, self.find_timeout).await?;
                Ok(found.render())
            }
            ToolName::SearchQuery => {
                let args: SearchQueryArgs = parse_args(tool, args)?;
                self.web.search(&args.query).await
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: ToolName, args: &JsonValue) -> Result<T, ToolError> {
    let parsed = match args {
        JsonValue::String(raw) => serde_json::from_str(raw),
        JsonValue::Null => serde_json::from_value(json!({})),
        other => serde_json::from_value(other.clone()),
    };
    parsed.map_err(|e| ToolError::InvalidArguments {
        tool: tool.as_str(),
        reason: e.to_string(),
    })
}
