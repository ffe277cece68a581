//! MCP Server Implementation
//!
//! Tool registry, message routing and the newline-delimited stdio transport.
//! Requests are handled one at a time, in arrival order.

use crate::mcp::errors::{ErrorHandler, McpError};
use crate::mcp::protocol::*;
use crate::mcp::validation::{McpValidator, compile_tool_schema, validate_tool_arguments};
use anyhow::Result;
use async_trait::async_trait;
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

/// A tool with its compiled argument schema
struct RegisteredTool {
    definition: Tool,
    arguments: Validator,
    handler: Arc<dyn ToolHandler>,
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// MCP Server state and configuration
pub struct McpServer {
    pub server_info: Implementation,
    pub capabilities: ServerCapabilities,
    instructions: Option<String>,
    tools: RwLock<HashMap<String, RegisteredTool>>,
    connection_state: RwLock<ConnectionState>,
    validator: McpValidator,
}

/// Routes one parsed message to its handler
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    /// Create a new MCP server
    #[inline]
    pub fn new(name: String, version: String) -> Result<Self> {
        Ok(Self {
            server_info: Implementation { name, version },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            instructions: None,
            tools: RwLock::new(HashMap::new()),
            connection_state: RwLock::new(ConnectionState::Uninitialized),
            validator: McpValidator::new()?,
        })
    }

    /// Text returned to clients in the initialize result
    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool with the server, replacing any tool of the same name
    #[inline]
    pub async fn register_tool<H>(&self, tool: Tool, handler: H) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        let arguments = compile_tool_schema(&tool)?;
        let tool_name = tool.name.clone();

        let mut tools = self.tools.write().await;
        tools.insert(
            tool_name.clone(),
            RegisteredTool {
                definition: tool,
                arguments,
                handler: Arc::new(handler),
            },
        );
        drop(tools);

        debug!("Registered tool: {}", tool_name);
        Ok(())
    }

    /// Definitions of all registered tools, sorted by name
    #[inline]
    pub async fn list_tools(&self) -> Vec<Tool> {
        let tools = self.tools.read().await;
        let mut definitions: Vec<Tool> = tools
            .values()
            .map(|registered| registered.definition.clone())
            .collect();
        drop(tools);

        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, answering on `writer`,
    /// until end of input
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    if let Some(reply) = self.handle_line(&line).await {
                        send_message(&mut writer, &reply).await?;
                    }
                }
                Err(e) => {
                    error!("Error reading input: {}", e);
                    break;
                }
            }
        }

        *self.connection_state.write().await = ConnectionState::Closed;
        info!("MCP server stopped");
        Ok(())
    }

    /// Handle one line of input, returning the reply if one is due
    #[inline]
    pub async fn handle_line(self: &Arc<Self>, line: &str) -> Option<JsonRpcMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let raw_value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to parse JSON: {}", e);
                return Some(JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                    JsonRpcError::parse_error(),
                    None,
                )));
            }
        };

        match self.validator.validate_raw_message(&raw_value) {
            Ok(message) => MessageHandler::new(Arc::clone(self))
                .process_message(message)
                .await,
            Err(e) => {
                warn!("Message validation failed: {}", e);
                let id = raw_value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
                Some(JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                    JsonRpcError::invalid_request(),
                    id,
                )))
            }
        }
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }
}

async fn send_message<W>(writer: &mut W, message: &JsonRpcMessage) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let json = serde_json::to_string(message)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Process an incoming message; notifications produce no reply
    #[inline]
    pub async fn process_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(&notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        debug!("Handling request {}", request.method);
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => Err(McpError::MethodNotFound {
                method: method.to_string(),
            }
            .into()),
        };

        match result {
            Ok(value) => JsonRpcMessage::Response(JsonRpcResponse::new(value, request.id)),
            Err(e) => ErrorHandler::handle_error(&e, Some(request.id)),
        }
    }

    async fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                *self.server.connection_state.write().await = ConnectionState::Ready;
                info!("Server ready to handle requests");
            }
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            method => {
                warn!("Unknown notification method: {}", method);
            }
        }
    }

    /// Handle initialize request
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams =
            serde_json::from_value(params.ok_or_else(|| McpError::InvalidParameters {
                message: "Initialize request missing parameters".to_string(),
            })?)
            .map_err(McpError::from)?;

        let validator = &self.server.validator;
        let protocol_version = validator.negotiate_protocol_version(&params.protocol_version);
        if !validator.is_protocol_version_supported(&params.protocol_version) {
            warn!(
                "Client requested protocol version {}, answering with {}",
                params.protocol_version, protocol_version
            );
        }

        *self.server.connection_state.write().await = ConnectionState::Initializing;

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!(
            "Client initialized: {} {}",
            params.client_info.name, params.client_info.version
        );
        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request
    #[inline]
    pub async fn handle_list_tools(&self) -> Result<Value> {
        let result = ListToolsResult {
            tools: self.server.list_tools().await,
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request.
    ///
    /// Unknown tools and arguments that fail the input schema are protocol
    /// errors. Anything that goes wrong inside the tool is an `isError` result.
    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams =
            serde_json::from_value(params.ok_or_else(|| McpError::InvalidParameters {
                message: "Tool call request missing parameters".to_string(),
            })?)
            .map_err(McpError::from)?;

        let arguments = Value::Object(params.arguments.clone().unwrap_or_default());
        let handler = {
            let tools = self.server.tools.read().await;
            let registered = tools.get(&params.name).ok_or_else(|| McpError::ToolNotFound {
                name: params.name.clone(),
            })?;
            validate_tool_arguments(&params.name, &registered.arguments, &arguments)?;
            Arc::clone(&registered.handler)
        };

        let tool_name = params.name.clone();
        debug!("Calling tool {} with {}", tool_name, arguments);
        let result = match handler.handle(params).await {
            Ok(result) => result,
            Err(e) => {
                error!("Tool {} failed: {:#}", tool_name, e);
                CallToolResult::error(format!("{:#}", e))
            }
        };
        Ok(serde_json::to_value(result)?)
    }
}
