//! MCP (Model Context Protocol) Server Implementation
//!
//! JSON-RPC 2.0 over newline-delimited stdio, exposing the vector store and
//! document pipelines as tools.

#[cfg(test)]
mod tests;

pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;

pub use errors::{McpError, McpResult};
pub use server::{ConnectionState, McpServer, ToolHandler};
pub use tools::register_default_tools;
