//! Error types for the Jamf Pro MCP server.

use thiserror::Error;

use crate::mcp::protocol::{ErrorCode, ErrorDetail, JsonRpcError};

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the server.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Protocol Errors =====
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("server not initialized")]
    NotInitialized { method: String },

    // ===== Tool Errors =====
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("unknown toolset: {0}")]
    UnknownToolset(String),

    // ===== Resource Errors =====
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("invalid resource URI: {0}")]
    InvalidResourceUri(String),

    #[error("resource access denied: {0}")]
    ResourceAccessDenied(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("transport error: {0}")]
    Transport(String),

    // ===== Configuration Errors =====
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The wire error code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MethodNotFound(_) => ErrorCode::MethodNotFound,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::NotInitialized { .. } => ErrorCode::InternalError,
            Self::ToolNotFound(_) => ErrorCode::ToolNotFound,
            Self::ToolExecutionFailed(_) => ErrorCode::ToolExecutionError,
            Self::ResourceNotFound(_) => ErrorCode::ResourceNotFound,
            Self::InvalidResourceUri(_) => ErrorCode::InvalidResourceUri,
            Self::ResourceAccessDenied(_) => ErrorCode::ResourceAccessDenied,
            Self::Json(_) => ErrorCode::InternalError,
            Self::UnknownToolset(_)
            | Self::InvalidPath(_)
            | Self::Io(_)
            | Self::Yaml(_)
            | Self::Transport(_)
            | Self::Config(_) => ErrorCode::ServerError,
        }
    }

    /// Build the JSON-RPC error for this failure.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let detail = match self {
            Self::MethodNotFound(method) | Self::NotInitialized { method } => Some(ErrorDetail {
                method: Some(method.clone()),
                ..Default::default()
            }),
            Self::ToolNotFound(tool) | Self::ToolExecutionFailed(tool) => Some(ErrorDetail {
                tool: Some(tool.clone()),
                ..Default::default()
            }),
            Self::ResourceNotFound(uri)
            | Self::InvalidResourceUri(uri)
            | Self::ResourceAccessDenied(uri) => Some(ErrorDetail {
                uri: Some(uri.clone()),
                ..Default::default()
            }),
            _ => None,
        };

        let error = JsonRpcError::new(self.code(), self.to_string());
        match detail {
            Some(detail) => error.with_detail(detail),
            None => error,
        }
    }

    /// Map an I/O failure on a resource to the matching resource error.
    pub fn from_resource_io(uri: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::ResourceNotFound(uri.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::ResourceAccessDenied(uri.to_string()),
            _ => Self::Io(err),
        }
    }
}
