//! MCP Message Validation
//!
//! JSON schema validation for incoming JSON-RPC envelopes and for tool
//! arguments, which are checked against each tool's `inputSchema` before
//! the tool runs.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use anyhow::{Result, anyhow};
use jsonschema::{Draft, Validator};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// JSON Schema validator for MCP messages
pub struct McpValidator {
    schemas: HashMap<String, Validator>,
}

impl fmt::Debug for McpValidator {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.schemas.keys().collect();
        names.sort_unstable();
        f.debug_struct("McpValidator")
            .field("schemas", &names)
            .finish()
    }
}

impl McpValidator {
    /// Create a new MCP validator with built-in schemas
    #[inline]
    pub fn new() -> Result<Self> {
        let mut validator = Self {
            schemas: HashMap::new(),
        };
        validator.load_builtin_schemas()?;
        Ok(validator)
    }

    fn load_builtin_schemas(&mut self) -> Result<()> {
        let id_schema = json!({
            "oneOf": [
                {"type": "string"},
                {"type": "integer"}
            ]
        });

        let request_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {"type": "string", "const": "2.0"},
                "method": {"type": "string"},
                "params": {},
                "id": id_schema
            },
            "required": ["jsonrpc", "method", "id"]
        });
        self.add_schema("jsonrpc_request", &request_schema)?;

        let notification_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {"type": "string", "const": "2.0"},
                "method": {"type": "string"},
                "params": {}
            },
            "required": ["jsonrpc", "method"]
        });
        self.add_schema("jsonrpc_notification", &notification_schema)?;

        let initialize_schema = json!({
            "type": "object",
            "properties": {
                "protocolVersion": {"type": "string"},
                "capabilities": {"type": "object"},
                "clientInfo": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "version": {"type": "string"}
                    },
                    "required": ["name", "version"]
                }
            },
            "required": ["protocolVersion", "clientInfo"]
        });
        self.add_schema("initialize_params", &initialize_schema)?;

        let tool_call_schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "arguments": {"type": "object"}
            },
            "required": ["name"]
        });
        self.add_schema("call_tool_params", &tool_call_schema)?;

        debug!("Loaded {} built-in JSON schemas", self.schemas.len());
        Ok(())
    }

    /// Add a JSON schema to the validator
    #[inline]
    pub fn add_schema(&mut self, name: &str, schema: &Value) -> Result<()> {
        let compiled = compile_schema(schema)
            .map_err(|e| anyhow!("Failed to compile schema '{}': {}", name, e))?;
        self.schemas.insert(name.to_string(), compiled);
        Ok(())
    }

    /// Validate a JSON-RPC request, including known method parameters
    #[inline]
    pub fn validate_request(&self, request: &JsonRpcRequest) -> Result<()> {
        let request_value = serde_json::to_value(request)?;
        self.validate_with_schema("jsonrpc_request", &request_value)?;

        if let Some(params) = &request.params {
            self.validate_method_params(&request.method, params)?;
        }
        Ok(())
    }

    /// Validate a JSON-RPC notification
    #[inline]
    pub fn validate_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let notification_value = serde_json::to_value(notification)?;
        self.validate_with_schema("jsonrpc_notification", &notification_value)
    }

    fn validate_method_params(&self, method: &str, params: &Value) -> Result<()> {
        let schema_name = match method {
            "initialize" => "initialize_params",
            "tools/call" => "call_tool_params",
            _ => {
                debug!("No parameter validation schema for method: {}", method);
                return Ok(());
            }
        };
        self.validate_with_schema(schema_name, params)
    }

    /// Validate a value against a named schema
    #[inline]
    pub fn validate_with_schema(&self, schema_name: &str, value: &Value) -> Result<()> {
        let schema = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| anyhow!("Schema '{}' not found", schema_name))?;

        let error_messages = collect_errors(schema, value);
        if !error_messages.is_empty() {
            return Err(anyhow!(
                "Schema validation failed for '{}': {}",
                schema_name,
                error_messages.join(", ")
            ));
        }
        Ok(())
    }

    /// Parse and validate a raw JSON value as an incoming message.
    ///
    /// Clients only send requests and notifications; anything else is rejected.
    #[inline]
    pub fn validate_raw_message(&self, value: &Value) -> Result<JsonRpcMessage> {
        if value.get("id").is_some() {
            let request = serde_json::from_value::<JsonRpcRequest>(value.clone())?;
            self.validate_request(&request)?;
            return Ok(JsonRpcMessage::Request(request));
        }

        let notification = serde_json::from_value::<JsonRpcNotification>(value.clone())?;
        self.validate_notification(&notification)?;
        Ok(JsonRpcMessage::Notification(notification))
    }

    /// Whether `version` is one of [`SUPPORTED_PROTOCOL_VERSIONS`]
    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
    }

    /// Version to answer an initialize request with: the client's own when
    /// supported, otherwise the latest this server speaks
    #[inline]
    pub fn negotiate_protocol_version(&self, requested: &str) -> &'static str {
        SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .copied()
            .find(|version| *version == requested)
            .unwrap_or(MCP_VERSION)
    }
}

/// Compile a tool's input schema
#[inline]
pub fn compile_tool_schema(tool: &Tool) -> Result<Validator> {
    compile_schema(&tool.input_schema)
        .map_err(|e| anyhow!("Invalid input schema for tool '{}': {}", tool.name, e))
}

/// Check tool call arguments against the tool's compiled input schema
#[inline]
pub fn validate_tool_arguments(
    tool_name: &str,
    schema: &Validator,
    arguments: &Value,
) -> McpResult<()> {
    let error_messages = collect_errors(schema, arguments);
    if error_messages.is_empty() {
        return Ok(());
    }
    Err(McpError::InvalidToolParameters {
        tool: tool_name.to_string(),
        message: error_messages.join(", "),
    })
}

fn compile_schema(schema: &Value) -> std::result::Result<Validator, String> {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(schema)
        .map_err(|e| e.to_string())
}

fn collect_errors(schema: &Validator, value: &Value) -> Vec<String> {
    schema
        .iter_errors(value)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect()
}
