//! The MCP handler: tool and resource registries over the render service.

use async_trait::async_trait;
use serde_json::{json, Value};

use prismproto::{
    CallToolResult, ErrorData, Handler, Implementation, ReadResourceResult, Resource, Tool,
};

use crate::render::{RenderRequest, RenderService};
use crate::resources;

pub const SERVER_NAME: &str = "prism";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct ShaderHandler {
    service: RenderService,
    tools: Vec<Tool>,
}

impl ShaderHandler {
    pub fn new(service: RenderService) -> Self {
        Self {
            service,
            tools: build_tools(),
        }
    }

    async fn render_shader(&self, arguments: Value) -> Result<CallToolResult, ErrorData> {
        let request: RenderRequest = serde_json::from_value(arguments)
            .map_err(|e| ErrorData::invalid_params(format!("Invalid render arguments: {}", e)))?;

        let outcome = self.service.render(request).await;
        outcome_result(outcome.success, &outcome)
    }

    async fn validate_shader(&self, arguments: Value) -> Result<CallToolResult, ErrorData> {
        let source = shader_content(&arguments)?;
        let report = self.service.validate(source).await;
        outcome_result(report.success, &report)
    }

    async fn get_shader_info(&self, arguments: Value) -> Result<CallToolResult, ErrorData> {
        let source = shader_content(&arguments)?;
        let report = self.service.describe(source).await;
        outcome_result(report.success, &report)
    }
}

fn shader_content(arguments: &Value) -> Result<&str, ErrorData> {
    arguments
        .get("shader_content")
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorData::invalid_params("Missing required argument: shader_content"))
}

/// Serialize an outcome as a text content block, flagging domain failures
/// with `isError` rather than a protocol error.
fn outcome_result<T: serde::Serialize>(
    success: bool,
    outcome: &T,
) -> Result<CallToolResult, ErrorData> {
    let text = serde_json::to_string_pretty(outcome)
        .map_err(|e| ErrorData::internal_error(format!("Failed to serialize result: {}", e)))?;

    let mut result = CallToolResult::text(text);
    result.is_error = !success;
    Ok(result)
}

fn build_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "render_shader",
            "Render an ISF shader to PNG images at specified time codes",
        )
        .with_input_schema(json!({
            "type": "object",
            "properties": {
                "shader_content": {
                    "type": "string",
                    "description": "ISF shader source code"
                },
                "time_codes": {
                    "type": "array",
                    "items": {"type": "number"},
                    "description": "Time codes for rendering (seconds)"
                },
                "width": {
                    "type": "integer",
                    "default": 1920,
                    "description": "Output width in pixels"
                },
                "height": {
                    "type": "integer",
                    "default": 1080,
                    "description": "Output height in pixels"
                },
                "quality": {
                    "type": "integer",
                    "default": 95,
                    "minimum": 1,
                    "maximum": 100,
                    "description": "PNG quality (1-100)"
                },
                "inputs": {
                    "type": "object",
                    "description": "Shader input values by name"
                },
                "verbose": {
                    "type": "boolean",
                    "default": false,
                    "description": "Enable verbose output"
                }
            },
            "required": ["shader_content", "time_codes"]
        })),
        Tool::new(
            "validate_shader",
            "Validate ISF shader syntax and extract metadata",
        )
        .with_input_schema(json!({
            "type": "object",
            "properties": {
                "shader_content": {
                    "type": "string",
                    "description": "ISF shader source code to validate"
                }
            },
            "required": ["shader_content"]
        })),
        Tool::new("get_shader_info", "Extract information from ISF shader").with_input_schema(
            json!({
                "type": "object",
                "properties": {
                    "shader_content": {
                        "type": "string",
                        "description": "ISF shader source code"
                    }
                },
                "required": ["shader_content"]
            }),
        ),
    ]
}

#[async_trait]
impl Handler for ShaderHandler {
    fn tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
        match name {
            "render_shader" => self.render_shader(arguments).await,
            "validate_shader" => self.validate_shader(arguments).await,
            "get_shader_info" => self.get_shader_info(arguments).await,
            other => Err(ErrorData::tool_not_found(other)),
        }
    }

    fn server_info(&self) -> Implementation {
        Implementation::new(SERVER_NAME, SERVER_VERSION)
    }

    fn resources(&self) -> Vec<Resource> {
        resources::list()
    }

    async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        resources::read(uri)
            .map(ReadResourceResult::single)
            .ok_or_else(|| ErrorData::resource_not_found(uri))
    }

    fn instructions(&self) -> Option<String> {
        Some(
            "Render, validate, and inspect ISF fragment shaders. Use validate_shader to check \
             source before rendering, then render_shader with time codes to produce PNG frames."
                .to_string(),
        )
    }
}
