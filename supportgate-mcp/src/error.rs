//! Errors for the NL-query router.

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("invalid parameters for {tool_name}: {message}")]
    InvalidParams { tool_name: String, message: String },

    #[error("dispatch failed: {message}")]
    DispatchFailed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unknown_tool() {
        let err = RouterError::UnknownTool {
            tool_name: "launch_missiles".into(),
        };
        assert_eq!(err.to_string(), "unknown tool: launch_missiles");
    }
}
