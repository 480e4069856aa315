//! Protocol layer for the prism shader-rendering server.
//!
//! Implements the JSON-RPC 2.0 envelope types used by MCP, the tool and
//! resource catalogs, and a method dispatcher with the connection lifecycle
//! state machine. Transports (stdio, HTTP) hand raw JSON values to
//! [`Dispatcher::dispatch_value`] and write back whatever envelope it
//! returns; domain-level failures travel inside tool results, never as
//! protocol errors.

pub mod dispatch;
pub mod envelope;
pub mod protocol;
pub mod resource;
pub mod tool;

pub use dispatch::{Dispatcher, Handler};
pub use envelope::{ErrorData, JsonRpcMessage, JsonRpcVersion, RequestId};
pub use protocol::{
    ClientCapabilities, ConnectionState, Implementation, InitializeParams, InitializeResult,
    ResourcesCapability, ServerCapabilities, ToolsCapability, PROTOCOL_VERSION,
};
pub use resource::{ListResourcesResult, ReadResourceResult, Resource, ResourceContents};
pub use tool::{CallToolParams, CallToolResult, Content, ListToolsResult, Tool, ToolSchema};
