//! Transport-independent MCP request handling
//!
//! Both front-ends feed raw JSON-RPC text in here and write back whatever
//! comes out. Tool calls become exactly one bridge call each.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use scenebridge_protocol::{Params, Response};

use crate::client::BridgeQueue;

use super::error::McpError;
use super::prompts::{get_prompt, prompt_definitions};
use super::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, PromptsListResult, ToolResult,
    ToolsListResult,
};
use super::tools::ToolCatalog;

/// MCP method dispatcher shared by every session of every transport
pub struct McpService {
    bridge: BridgeQueue,
    catalog: &'static ToolCatalog,
    initialized: AtomicBool,
    requests: AtomicU64,
}

impl McpService {
    pub fn new(bridge: BridgeQueue) -> Self {
        Self {
            bridge,
            catalog: ToolCatalog::global(),
            initialized: AtomicBool::new(false),
            requests: AtomicU64::new(1),
        }
    }

    pub fn bridge(&self) -> &BridgeQueue {
        &self.bridge
    }

    /// Whether an `initialize` request has been handled
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// Handle one raw JSON-RPC message
    ///
    /// Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let req_id = self.requests.fetch_add(1, Ordering::Relaxed);
        debug!(req_id, raw = %raw, "Received raw JSON-RPC message");

        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                error!(req_id, error = %e, "Failed to parse JSON-RPC request");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::new(JsonRpcError::PARSE_ERROR, e.to_string()),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            error!(
                req_id,
                method = %request.method,
                got_version = %request.jsonrpc,
                "Invalid JSON-RPC version"
            );
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::with_data(
                    JsonRpcError::INVALID_REQUEST,
                    "Invalid JSON-RPC version",
                    json!({"expected": "2.0", "got": request.jsonrpc}),
                ),
            ));
        }

        info!(
            req_id,
            method = %request.method,
            jsonrpc_id = ?request.id,
            "Incoming JSON-RPC request"
        );

        let method = request.method.clone();
        let start = Instant::now();
        let response = self.handle_request(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &response {
            Some(r) if r.is_error() => {
                warn!(req_id, method = %method, elapsed_ms, error = ?r.error, "Request failed")
            }
            Some(_) => info!(req_id, method = %method, elapsed_ms, "Request completed"),
            None => debug!(req_id, method = %method, "Notification handled"),
        }
        response
    }

    /// Handle a parsed request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            self.handle_notification(&request.method);
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "prompts/list" => self.handle_prompts_list(),
            "prompts/get" => self.handle_prompts_get(&request.params),
            _ => Err(McpError::MethodNotFound(request.method.clone())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e.into()),
        })
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => info!("Client finished initialization"),
            "notifications/cancelled" => {
                // A bridge call cannot be interrupted once sent
                debug!("Cancellation ignored");
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    fn handle_initialize(&self) -> Result<Value, McpError> {
        self.initialized.store(true, Ordering::Relaxed);
        info!("MCP session initialized");
        Ok(serde_json::to_value(InitializeResult::default())?)
    }

    fn handle_tools_list(&self) -> Result<Value, McpError> {
        let result = ToolsListResult {
            tools: self.catalog.tools(),
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".into()))?;
        let spec = self
            .catalog
            .find(name)
            .ok_or_else(|| McpError::UnknownTool(name.into()))?;

        let arguments = match &params["arguments"] {
            Value::Null => Params::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(McpError::InvalidParams(
                    "'arguments' must be an object".into(),
                ))
            }
        };
        spec.check_arguments(&arguments)?;

        debug!(tool = name, command = spec.command, "Forwarding tool call");
        let response = self.bridge.call(spec.command, arguments).await;
        Ok(serde_json::to_value(tool_result(response))?)
    }

    fn handle_prompts_list(&self) -> Result<Value, McpError> {
        let result = PromptsListResult {
            prompts: prompt_definitions(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_prompts_get(&self, params: &Value) -> Result<Value, McpError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".into()))?;
        Ok(serde_json::to_value(get_prompt(name)?)?)
    }
}

/// Translate a bridge response into tool output
///
/// Failures stay inside the tool result so the agent can read them.
pub fn tool_result(response: Response) -> ToolResult {
    match response {
        Response::Success { result } => match serde_json::to_string_pretty(&result) {
            Ok(text) => ToolResult::text(text),
            Err(e) => ToolResult::error(format!("Failed to format result: {}", e)),
        },
        Response::Failure { kind, message } => ToolResult::error(format!("{}: {}", kind, message)),
    }
}
