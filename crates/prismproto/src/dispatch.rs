//! Method dispatch.
//!
//! Routes parsed JSON-RPC messages to a [`Handler`] and assembles response
//! envelopes. Transport-agnostic: stdio and HTTP both feed raw values in and
//! write whatever comes back.
//!
//! Spans follow the JSON-RPC semantic conventions (`rpc.system`,
//! `rpc.method`, `rpc.jsonrpc.request_id`).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::envelope::{ErrorData, JsonRpcMessage, RequestId};
use crate::protocol::{
    ConnectionState, Implementation, InitializeParams, InitializeResult, ServerCapabilities,
};
use crate::resource::{ListResourcesResult, ReadResourceResult, Resource};
use crate::tool::{CallToolParams, CallToolResult, ListToolsResult, Tool};

/// Server-side behavior behind the protocol.
///
/// Implementations provide the tool and resource catalogs and execute calls.
/// Tool failures that the caller can act on should come back as
/// `CallToolResult::error`, not as `Err` - protocol errors are reserved for
/// malformed requests and unknown names.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// The tool catalog, in stable registration order.
    fn tools(&self) -> Vec<Tool>;

    /// Execute a tool call.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData>;

    /// Server implementation info for the initialize handshake.
    fn server_info(&self) -> Implementation;

    /// The resource catalog, in stable registration order.
    fn resources(&self) -> Vec<Resource> {
        vec![]
    }

    /// Read a resource by URI.
    async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        Err(ErrorData::resource_not_found(uri))
    }

    /// Instructions surfaced to the client in the initialize result.
    fn instructions(&self) -> Option<String> {
        None
    }

    fn capabilities(&self) -> ServerCapabilities {
        let mut caps = ServerCapabilities {
            tools: Some(Default::default()),
            ..Default::default()
        };
        if !self.resources().is_empty() {
            caps.resources = Some(Default::default());
        }
        caps
    }
}

/// One dispatcher per connection; owns the lifecycle state.
pub struct Dispatcher<H: Handler> {
    handler: Arc<H>,
    state: Mutex<ConnectionState>,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            state: Mutex::new(ConnectionState::Uninitialized),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Mark the connection closed. Further dispatch is still answered; the
    /// transport decides when to actually stop reading.
    pub async fn close(&self) {
        self.state.lock().await.on_close();
    }

    /// Dispatch one raw line of input.
    ///
    /// A line that is not JSON at all carries no recoverable id, so there is
    /// nothing to correlate a response with; it is skipped with a warning.
    /// Returns `None` when no response should be written.
    pub async fn dispatch_line(&self, line: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.dispatch_value(value).await,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable line");
                None
            }
        }
    }

    /// Dispatch one JSON value.
    ///
    /// A value that is valid JSON but not a valid message (wrong version,
    /// missing method) gets an invalid-request response when an id can be
    /// recovered from the raw object; without one it is skipped.
    pub async fn dispatch_value(&self, value: Value) -> Option<Value> {
        let recovered_id = recover_id(&value);

        let message: JsonRpcMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                return match recovered_id {
                    Some(id) => Some(error_envelope(
                        Some(id),
                        ErrorData::new(
                            ErrorData::INVALID_REQUEST,
                            format!("Invalid request: {}", e),
                        ),
                    )),
                    None => {
                        tracing::warn!(error = %e, "skipping invalid message with no id");
                        None
                    }
                };
            }
        };

        if message.is_notification() {
            self.handle_notification(&message).await;
            return None;
        }

        let id = message.id.clone();
        let request_id_str = id.as_ref().map(|i| i.to_string()).unwrap_or_default();

        let span = tracing::info_span!(
            "rpc.dispatch",
            rpc.system = "jsonrpc",
            rpc.method = %message.method,
            rpc.jsonrpc.request_id = %request_id_str,
        );

        let result = self.dispatch_request(&message).instrument(span).await;

        Some(match result {
            Ok(result) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result,
            }),
            Err(error) => error_envelope(id, error),
        })
    }

    async fn handle_notification(&self, message: &JsonRpcMessage) {
        match message.method.as_str() {
            "notifications/initialized" => {
                self.state.lock().await.on_initialized();
            }
            other => {
                tracing::debug!(method = %other, "ignoring notification");
            }
        }
    }

    async fn dispatch_request(&self, message: &JsonRpcMessage) -> Result<Value, ErrorData> {
        {
            let state = self.state.lock().await;
            let pre_session = matches!(message.method.as_str(), "initialize" | "ping");
            if !state.is_active() && !pre_session {
                tracing::warn!(
                    method = %message.method,
                    state = ?*state,
                    "request before session is active"
                );
            }
        }

        match message.method.as_str() {
            "initialize" => self.handle_initialize(message).await,
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(message).await,
            "resources/list" => self.handle_list_resources(),
            "resources/read" => self.handle_read_resource(message).await,
            _ => Err(ErrorData::method_not_found(&message.method)),
        }
    }

    async fn handle_initialize(&self, request: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let params: InitializeParams = parse_params(request, "initialize")?;

        if let Some(client) = &params.client_info {
            tracing::info!(
                client.name = %client.name,
                client.version = %client.version,
                client.protocol = %params.protocol_version,
                "client connected"
            );
        }

        self.state.lock().await.on_initialize();

        let mut result =
            InitializeResult::new(self.handler.server_info(), self.handler.capabilities());
        if let Some(instructions) = self.handler.instructions() {
            result = result.with_instructions(instructions);
        }

        to_result_value(&result)
    }

    fn handle_list_tools(&self) -> Result<Value, ErrorData> {
        to_result_value(&ListToolsResult::all(self.handler.tools()))
    }

    async fn handle_call_tool(&self, request: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let params: CallToolParams = parse_params(request, "tools/call")?;

        let known = self.handler.tools().iter().any(|t| t.name == params.name);
        if !known {
            return Err(ErrorData::tool_not_found(&params.name));
        }

        let arguments = params
            .arguments
            .map(Value::Object)
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        let span = tracing::info_span!("tool.call", tool.name = %params.name);
        let result = self
            .handler
            .call_tool(&params.name, arguments)
            .instrument(span)
            .await?;

        to_result_value(&result)
    }

    fn handle_list_resources(&self) -> Result<Value, ErrorData> {
        to_result_value(&ListResourcesResult::all(self.handler.resources()))
    }

    async fn handle_read_resource(&self, request: &JsonRpcMessage) -> Result<Value, ErrorData> {
        #[derive(serde::Deserialize)]
        struct Params {
            uri: String,
        }

        let params: Params = parse_params(request, "resources/read")?;

        let span = tracing::info_span!("resource.read", resource.uri = %params.uri);
        let result = self
            .handler
            .read_resource(&params.uri)
            .instrument(span)
            .await?;

        to_result_value(&result)
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    request: &JsonRpcMessage,
    method: &str,
) -> Result<T, ErrorData> {
    request
        .params
        .as_ref()
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| ErrorData::invalid_params(format!("Invalid {} params: {}", method, e)))?
        .ok_or_else(|| ErrorData::invalid_params(format!("Missing {} params", method)))
}

fn to_result_value<T: serde::Serialize>(value: &T) -> Result<Value, ErrorData> {
    serde_json::to_value(value)
        .map_err(|e| ErrorData::internal_error(format!("Failed to serialize result: {}", e)))
}

fn error_envelope(id: Option<RequestId>, error: ErrorData) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error,
    })
}

fn recover_id(value: &Value) -> Option<RequestId> {
    value
        .get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}
