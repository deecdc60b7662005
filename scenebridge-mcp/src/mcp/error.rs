//! MCP error types

use std::io;

use scenebridge_utils::BridgeError;

use super::protocol::JsonRpcError;

/// MCP front-end errors
///
/// Only protocol-level problems live here. A bridge call that fails is a
/// successful JSON-RPC exchange carrying an `isError` tool result.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// IO error (stdio or socket)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Unknown tool
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Unknown prompt
    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    /// The HTTP listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::MethodNotFound(method) => {
                JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, format!("Method not found: {}", method))
            }
            McpError::InvalidParams(msg) => JsonRpcError::new(JsonRpcError::INVALID_PARAMS, msg),
            McpError::UnknownTool(name) => {
                JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, format!("Unknown tool: {}", name))
            }
            McpError::UnknownPrompt(name) => {
                JsonRpcError::new(JsonRpcError::INVALID_PARAMS, format!("Unknown prompt: {}", name))
            }
            McpError::Io(err) => {
                JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, format!("IO error: {}", err))
            }
            McpError::Json(err) => {
                JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("JSON error: {}", err))
            }
            McpError::Bind { addr, source } => JsonRpcError::new(
                JsonRpcError::INTERNAL_ERROR,
                format!("Failed to bind {}: {}", addr, source),
            ),
            McpError::Internal(msg) => JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, msg),
        }
    }
}

impl From<McpError> for BridgeError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::Io(e) => BridgeError::Io(e),
            McpError::Bind { addr, source } => BridgeError::Bind { addr, source },
            other => BridgeError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_maps_to_method_not_found() {
        let err: JsonRpcError = McpError::UnknownTool("fly".into()).into();
        assert_eq!(err.code, JsonRpcError::METHOD_NOT_FOUND);
        assert_eq!(err.message, "Unknown tool: fly");
    }

    #[test]
    fn test_invalid_params_keeps_message() {
        let err: JsonRpcError = McpError::InvalidParams("Missing 'name' parameter".into()).into();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
        assert_eq!(err.message, "Missing 'name' parameter");
    }

    #[test]
    fn test_unknown_prompt_is_invalid_params() {
        let err: JsonRpcError = McpError::UnknownPrompt("nope".into()).into();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
    }

    #[test]
    fn test_into_bridge_error() {
        let err: BridgeError = McpError::Bind {
            addr: "127.0.0.1:8000".into(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        }
        .into();
        assert!(matches!(err, BridgeError::Bind { .. }));

        let err: BridgeError = McpError::Internal("boom".into()).into();
        assert!(matches!(err, BridgeError::Internal(_)));
    }
}
