//! MCP Error Handling
//!
//! Classification of protocol-level failures and their JSON-RPC encoding.
//! Failures inside a tool are not protocol errors; they travel back as
//! `isError` tool results.

use crate::mcp::protocol::*;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Protocol-level errors raised while dispatching a request
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Invalid tool parameters for {tool}: {message}")]
    InvalidToolParameters { tool: String, message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },

    #[error("JSON-RPC parse error: {message}")]
    ParseError { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },
}

impl McpError {
    /// JSON-RPC code this error is reported under
    #[inline]
    pub fn code(&self) -> i32 {
        match self {
            Self::ToolNotFound { .. } => mcp_error_codes::TOOL_NOT_FOUND,
            Self::InvalidToolParameters { .. } | Self::InvalidParameters { .. } => {
                error_codes::INVALID_PARAMS
            }
            Self::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            Self::InternalError { .. } => error_codes::INTERNAL_ERROR,
            Self::ParseError { .. } => error_codes::PARSE_ERROR,
            Self::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
        }
    }

    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        let error = JsonRpcError::new(self.code(), self.to_string());
        match self {
            Self::InvalidToolParameters { tool, .. } => error.with_data(json!({ "tool": tool })),
            _ => error,
        }
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        let error = self.to_jsonrpc_error();
        JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(error, id))
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::ParseError { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidParameters { .. }
            | Self::InvalidToolParameters { .. } => {
                warn!("Client error: {}", self);
            }
            Self::ToolNotFound { .. } | Self::MethodNotFound { .. } => {
                warn!("Not found error: {}", self);
            }
            Self::InternalError { .. } => {
                error!("Server error: {}", self);
            }
        }
    }
}

/// Error handler utility for consistent error processing
pub struct ErrorHandler;

impl ErrorHandler {
    /// Convert any dispatch error into a JSON-RPC error response
    #[inline]
    pub fn handle_error(error: &anyhow::Error, id: Option<RequestId>) -> JsonRpcMessage {
        if let Some(mcp_error) = error.downcast_ref::<McpError>() {
            mcp_error.log();
            return mcp_error.to_error_response(id);
        }

        error!("Unexpected error: {}", error);
        McpError::InternalError {
            message: error.to_string(),
        }
        .to_error_response(id)
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidParameters {
            message: error.to_string(),
        }
    }
}
