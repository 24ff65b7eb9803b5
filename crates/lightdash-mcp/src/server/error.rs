//! Converting errors into MCP error responses.

use rmcp::ErrorData as McpError;

/// Extension trait for turning any displayable error into an [`McpError`].
///
/// API and transport failures become internal errors carrying the (already
/// enriched) message. Bad arguments become invalid-params errors.
pub trait ToMcpResult<T> {
    /// Map the error to an internal error with its message unchanged.
    fn mcp_internal(self) -> Result<T, McpError>;

    /// Map the error to an internal error, prefixed with `context`.
    fn mcp_context(self, context: &str) -> Result<T, McpError>;

    /// Map the error to an invalid-params error.
    fn mcp_invalid_params(self) -> Result<T, McpError>;
}

impl<T, E: std::fmt::Display> ToMcpResult<T> for Result<T, E> {
    fn mcp_internal(self) -> Result<T, McpError> {
        self.map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    fn mcp_context(self, context: &str) -> Result<T, McpError> {
        self.map_err(|e| McpError::internal_error(format!("{context}: {e}"), None))
    }

    fn mcp_invalid_params(self) -> Result<T, McpError> {
        self.map_err(|e| McpError::invalid_params(e.to_string(), None))
    }
}

/// Extension trait for required values that may be absent.
pub trait OptionToMcpResult<T> {
    /// Convert `None` into an invalid-params error with `message`.
    fn mcp_ok_or_invalid(self, message: &str) -> Result<T, McpError>;
}

impl<T> OptionToMcpResult<T> for Option<T> {
    fn mcp_ok_or_invalid(self, message: &str) -> Result<T, McpError> {
        self.ok_or_else(|| McpError::invalid_params(message.to_string(), None))
    }
}
