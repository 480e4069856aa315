//! Render engine adapter.
//!
//! The server talks to rendering backends through [`RenderEngine`], a
//! synchronous trait driven from a single worker task. The trait holds one
//! mutable "currently loaded shader" slot, mirroring how native ISF scenes
//! work. Today the only backend is the procedural placeholder; probing picks
//! the backend once at startup.

pub mod placeholder;
pub mod worker;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::PrismConfig;

/// A typed shader input value, post-coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Bool(bool),
    Long(i64),
    Float(f64),
    Point2d([f64; 2]),
    Color([f64; 4]),
    Image(PathBuf),
}

/// Declared kind of a shader input, from the ISF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Bool,
    Long,
    Float,
    Point2d,
    Color,
    Image,
}

impl InputKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bool" => Some(InputKind::Bool),
            "long" => Some(InputKind::Long),
            "float" => Some(InputKind::Float),
            "point2D" => Some(InputKind::Point2d),
            "color" => Some(InputKind::Color),
            "image" => Some(InputKind::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Bool => "bool",
            InputKind::Long => "long",
            InputKind::Float => "float",
            InputKind::Point2d => "point2D",
            InputKind::Color => "color",
            InputKind::Image => "image",
        }
    }
}

/// One declared input from the ISF header.
#[derive(Debug, Clone, Serialize)]
pub struct InputDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind_name: String,
    #[serde(skip)]
    pub kind: Option<InputKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Descriptive metadata extracted from a shader.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShaderMetadata {
    #[serde(rename = "type")]
    pub shader_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub categories: Vec<String>,
    pub inputs: Vec<InputDecl>,
    pub size: usize,
    pub lines: usize,
    pub has_time_uniform: bool,
    pub has_resolution_uniform: bool,
}

impl ShaderMetadata {
    /// The parts of the metadata any backend can compute from raw source.
    pub fn from_source_counts(source: &str) -> Self {
        let upper = source.to_uppercase();
        Self {
            shader_type: "ISF".to_string(),
            size: source.len(),
            lines: source.lines().count(),
            has_time_uniform: upper.contains("TIME"),
            has_resolution_uniform: upper.contains("RENDERSIZE"),
            ..Default::default()
        }
    }

    /// Best-effort metadata straight from source: counts plus whatever the
    /// declarative header yields. Never fails; a missing or malformed
    /// header just leaves the descriptive fields empty.
    pub fn from_source(source: &str) -> Self {
        let mut meta = Self::from_source_counts(source);

        if let Some(header) = isf_header(source) {
            meta.description = header
                .get("DESCRIPTION")
                .and_then(|v| v.as_str())
                .map(String::from);
            meta.credit = header
                .get("CREDIT")
                .and_then(|v| v.as_str())
                .map(String::from);
            meta.categories = header
                .get("CATEGORIES")
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            if let Some(inputs) = header.get("INPUTS").and_then(|v| v.as_array()) {
                meta.inputs = inputs
                    .iter()
                    .filter_map(|entry| {
                        let name = entry.get("NAME")?.as_str()?.to_string();
                        let kind_name = entry
                            .get("TYPE")
                            .and_then(|v| v.as_str())
                            .unwrap_or("float")
                            .to_string();
                        Some(InputDecl {
                            kind: InputKind::parse(&kind_name),
                            name,
                            kind_name,
                            label: entry
                                .get("LABEL")
                                .and_then(|v| v.as_str())
                                .map(String::from),
                            default: entry.get("DEFAULT").cloned(),
                        })
                    })
                    .collect();
            }
        }

        meta
    }

    pub fn declared_kind(&self, name: &str) -> Option<InputKind> {
        self.inputs
            .iter()
            .find(|decl| decl.name == name)
            .and_then(|decl| decl.kind)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("shader compilation failed: {message}")]
    Compile { message: String },

    #[error("render failed: {message}")]
    Render {
        message: String,
        code: Option<String>,
    },

    #[error("engine unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("engine call timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("engine i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for rendering one frame.
#[derive(Debug, Clone)]
pub struct FrameParams {
    pub time_code: f64,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub inputs: Vec<(String, InputValue)>,
}

/// A rendering backend.
///
/// Methods take `&mut self` because backends hold a currently loaded shader.
/// All calls go through the single engine worker, never directly.
pub trait RenderEngine: Send {
    fn backend_name(&self) -> &'static str;

    /// Cheap structural validation, no load required.
    fn validate(&mut self, source: &str) -> bool;

    /// Load a shader into the engine's active slot.
    fn load(&mut self, source: &str) -> Result<(), EngineError>;

    /// Render one frame of the loaded shader to encoded PNG bytes.
    fn render(&mut self, params: &FrameParams) -> Result<Vec<u8>, EngineError>;

    /// Extract descriptive metadata from a shader.
    fn describe(&mut self, source: &str) -> Result<ShaderMetadata, EngineError>;
}

/// Extract and parse the `/*{ ... }*/` JSON header.
pub(crate) fn isf_header(source: &str) -> Option<serde_json::Value> {
    let content = source.trim_start();
    if !content.starts_with("/*{") {
        return None;
    }
    let end = content.find("}*/")?;
    serde_json::from_str(&content[2..end + 1]).ok()
}

/// Pick the best available backend. The placeholder always succeeds, so
/// probing never fails; native backends would be tried first here.
pub fn probe(_config: &PrismConfig) -> Box<dyn RenderEngine> {
    let engine = placeholder::PlaceholderEngine::new();
    tracing::info!(backend = engine.backend_name(), "render backend selected");
    Box::new(engine)
}
