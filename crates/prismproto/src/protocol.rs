//! Initialization handshake types and the connection lifecycle state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version negotiated with clients.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server or client implementation info.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Initialize request params from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,

    #[serde(default)]
    pub capabilities: ClientCapabilities,

    #[serde(default)]
    pub client_info: Option<Implementation>,
}

/// Initialize result from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    pub fn new(server_info: Implementation, capabilities: ServerCapabilities) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities,
            server_info,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Client capabilities. Parsed but not acted upon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
}

/// Server capabilities: prism offers tools and resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
}

impl ServerCapabilities {
    pub fn tools_and_resources() -> Self {
        Self {
            tools: Some(ToolsCapability::default()),
            resources: Some(ResourcesCapability::default()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
}

/// Connection lifecycle.
///
/// Uninitialized -> (initialize) -> Initializing -> (notifications/initialized)
/// -> Active -> (transport closes) -> Terminated.
///
/// Calls before Active are permitted with a warning; some real clients skip
/// the initialized notification entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Active,
    Terminated,
}

impl ConnectionState {
    /// Apply the `initialize` request.
    pub fn on_initialize(&mut self) {
        if *self == ConnectionState::Uninitialized {
            *self = ConnectionState::Initializing;
        } else {
            tracing::warn!(state = ?self, "initialize received in unexpected state");
        }
    }

    /// Apply the `notifications/initialized` notification.
    pub fn on_initialized(&mut self) {
        match *self {
            ConnectionState::Initializing => *self = ConnectionState::Active,
            state => {
                tracing::warn!(state = ?state, "initialized notification in unexpected state");
                *self = ConnectionState::Active;
            }
        }
    }

    pub fn on_close(&mut self) {
        *self = ConnectionState::Terminated;
    }

    pub fn is_active(&self) -> bool {
        *self == ConnectionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_result_shape() {
        let result = InitializeResult::new(
            Implementation::new("prism", "0.1.0"),
            ServerCapabilities::tools_and_resources(),
        )
        .with_instructions("Render and validate ISF shaders.");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["serverInfo"]["name"], "prism");
        assert!(json["capabilities"]["tools"].is_object());
        assert!(json["capabilities"]["resources"].is_object());
    }

    #[test]
    fn initialize_params_tolerates_missing_client_info() {
        let params: InitializeParams = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05"
        }))
        .unwrap();

        assert_eq!(params.protocol_version, "2024-11-05");
        assert!(params.client_info.is_none());
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut state = ConnectionState::Uninitialized;
        state.on_initialize();
        assert_eq!(state, ConnectionState::Initializing);
        state.on_initialized();
        assert!(state.is_active());
        state.on_close();
        assert_eq!(state, ConnectionState::Terminated);
    }

    #[test]
    fn initialized_without_initialize_still_activates() {
        let mut state = ConnectionState::Uninitialized;
        state.on_initialized();
        assert!(state.is_active());
    }
}
