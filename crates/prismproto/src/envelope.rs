//! JSON-RPC 2.0 envelope types.
//!
//! A message is a request (has `id` and `method`), a notification (`method`
//! without `id`), or a response (`id` and exactly one of `result`/`error`).
//! The server only ever parses the message side; responses are assembled as
//! JSON values at dispatch time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version marker - always serializes as the literal "2.0".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected JSON-RPC version '2.0', got '{}'",
                s
            )))
        }
    }
}

/// Request ID - an integer or a string, per JSON-RPC 2.0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// An incoming JSON-RPC message that may or may not carry an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: JsonRpcVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcMessage {
    /// Create a request with params.
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: Some(id.into()),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Create a notification (no id, so no response is expected).
    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC error payload with the standard code band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorData {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(Self::PARSE_ERROR, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            Self::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Tool not found: {}", name))
    }

    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(
            Self::INVALID_PARAMS,
            format!("Resource not found: {}", uri),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }
}

impl std::fmt::Display for ErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorData {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_id_forms() {
        let n: RequestId = serde_json::from_str("7").unwrap();
        assert_eq!(n, RequestId::Number(7));

        let s: RequestId = serde_json::from_str("\"req-7\"").unwrap();
        assert_eq!(s, RequestId::String("req-7".to_string()));
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"req-7\"");
    }

    #[test]
    fn version_rejects_non_2_0() {
        let err = serde_json::from_value::<JsonRpcVersion>(json!("1.0"));
        assert!(err.is_err());
    }

    #[test]
    fn message_roundtrip() {
        let msg = JsonRpcMessage::request(1, "tools/call", json!({"name": "render_shader"}));
        let text = serde_json::to_string(&msg).unwrap();
        let parsed: JsonRpcMessage = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed.id, Some(RequestId::Number(1)));
        assert_eq!(parsed.method, "tools/call");
        assert!(!parsed.is_notification());
    }

    #[test]
    fn notification_has_no_id() {
        let msg = JsonRpcMessage::notification("notifications/initialized");
        let json = serde_json::to_value(&msg).unwrap();

        assert!(msg.is_notification());
        assert!(json.get("id").is_none());
        assert_eq!(json["jsonrpc"], "2.0");
    }

    #[test]
    fn error_codes_and_serialization() {
        let err = ErrorData::tool_not_found("nonexistent_tool");
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], -32601);
        assert_eq!(json["message"], "Tool not found: nonexistent_tool");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn error_with_data() {
        let err = ErrorData::with_data(
            ErrorData::INVALID_PARAMS,
            "Missing required field",
            json!({"field": "shader_content"}),
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["data"]["field"], "shader_content");
    }
}
