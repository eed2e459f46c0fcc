use thiserror::Error;

/// Failures inside a tool. These never abort a turn: the registry renders
/// them as the tool's textual result so the model can explain them.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Timeout Error")]
    Timeout,

    #[error("Error running find command: {0}")]
    CommandFailed(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Web search unavailable: TAVILY_API_KEY is not set")]
    CredentialMissing,

    #[error("Error getting answer from web: {0}")]
    WebSearch(String),

    #[error("Couldn't get system temperatures")]
    SensorsUnavailable,

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_display() {
        assert_eq!(ToolError::Timeout.to_string(), "Timeout Error");
        assert_eq!(
            ToolError::CommandFailed("find: '/nope': No such file or directory".into())
                .to_string(),
            "Error running find command: find: '/nope': No such file or directory"
        );
        assert_eq!(
            ToolError::SensorsUnavailable.to_string(),
            "Couldn't get system temperatures"
        );
    }
}
