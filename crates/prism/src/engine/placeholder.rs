//! Procedural placeholder backend.
//!
//! Stands in when no native ISF engine is linked: validates ISF structure,
//! parses the declarative JSON header for metadata, and renders a
//! deterministic image. A shader whose only output is a literal
//! `gl_FragColor = vec4(r, g, b, a);` renders that constant color; anything
//! else gets a time-animated sin/cos gradient.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use super::{isf_header, EngineError, FrameParams, RenderEngine, ShaderMetadata};

pub struct PlaceholderEngine {
    loaded: Option<LoadedShader>,
}

struct LoadedShader {
    constant_color: Option<[f32; 4]>,
}

impl PlaceholderEngine {
    pub fn new() -> Self {
        Self { loaded: None }
    }

    fn structural_errors(source: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let content = source.trim();

        if content.is_empty() {
            errors.push("Shader content is empty".to_string());
            return errors;
        }

        if !content.starts_with("/*{") && !content.starts_with("/*") {
            errors.push("Shader does not appear to have ISF header".to_string());
        }

        if !content.contains("void main()") && !content.contains("void main (") {
            errors.push("Shader does not contain main function".to_string());
        }

        if !content.contains("gl_FragColor") {
            errors.push("Shader does not assign to gl_FragColor".to_string());
        }

        if content.starts_with("/*{") && isf_header(content).is_none() {
            errors.push("syntax error in ISF JSON header".to_string());
        }

        errors
    }
}

impl Default for PlaceholderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for PlaceholderEngine {
    fn backend_name(&self) -> &'static str {
        "placeholder"
    }

    fn validate(&mut self, source: &str) -> bool {
        Self::structural_errors(source).is_empty()
    }

    fn load(&mut self, source: &str) -> Result<(), EngineError> {
        let errors = Self::structural_errors(source);
        if let Some(first) = errors.into_iter().next() {
            self.loaded = None;
            return Err(EngineError::Compile { message: first });
        }

        self.loaded = Some(LoadedShader {
            constant_color: parse_constant_color(source),
        });
        Ok(())
    }

    fn render(&mut self, params: &FrameParams) -> Result<Vec<u8>, EngineError> {
        let shader = self.loaded.as_ref().ok_or_else(|| EngineError::Render {
            message: "no shader loaded".to_string(),
            code: None,
        })?;

        let width = params.width;
        let height = params.height;
        let t = params.time_code as f32;

        let image = match shader.constant_color {
            Some(color) => {
                let pixel = Rgba(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
                RgbaImage::from_pixel(width, height, pixel)
            }
            None => RgbaImage::from_fn(width, height, |px, py| {
                let x = px as f32 / width.max(1) as f32;
                let y = py as f32 / height.max(1) as f32;

                let r = (x * 10.0 + t * 2.0).sin() * 0.5 + 0.5;
                let g = (y * 8.0 + t * 1.5).cos() * 0.5 + 0.5;
                let b = ((x + y) * 5.0 + t * 3.0).sin() * 0.5 + 0.5;

                Rgba([
                    (r * 255.0) as u8,
                    (g * 255.0) as u8,
                    (b * 255.0) as u8,
                    255,
                ])
            }),
        };

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| EngineError::Render {
                message: format!("PNG encoding failed: {}", e),
                code: None,
            })?;

        Ok(bytes)
    }

    fn describe(&mut self, source: &str) -> Result<ShaderMetadata, EngineError> {
        Ok(ShaderMetadata::from_source(source))
    }
}

/// Recognize a single literal `gl_FragColor = vec4(r, g, b, a);` assignment.
///
/// Only numeric literals count; any identifier in the arguments means the
/// shader is "animated" and falls through to the gradient.
fn parse_constant_color(source: &str) -> Option<[f32; 4]> {
    let idx = source.find("gl_FragColor")?;
    let rest = source[idx + "gl_FragColor".len()..].trim_start();
    let rest = rest.strip_prefix('=')?.trim_start();
    let rest = rest.strip_prefix("vec4")?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let close = rest.find(')')?;
    let args = &rest[..close];

    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return None;
    }

    let mut color = [0.0f32; 4];
    for (slot, part) in color.iter_mut().zip(&parts) {
        *slot = part.parse::<f32>().ok()?;
    }
    Some(color)
}
