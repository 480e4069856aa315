//! Render orchestration.
//!
//! [`RenderService`] sits between the protocol handler and the engine
//! worker: it validates, clamps, coerces inputs, consults the frame cache,
//! and assembles the outcome envelopes the tools and REST endpoints both
//! serialize. A failed frame fails the whole request; there is no partial
//! success.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use framecache::{CanonValue, Fingerprint, RenderCache};

use crate::coerce;
use crate::config::PrismConfig;
use crate::diagnose::ErrorDetail;
use crate::engine::{worker::EngineHandle, FrameParams, InputValue, ShaderMetadata};

#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    pub shader_content: String,
    pub time_codes: Vec<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub inputs: Option<Map<String, Value>>,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
pub struct RenderOutcome {
    pub success: bool,
    pub message: String,
    pub frames: Vec<FrameInfo>,
    pub metadata: RenderMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader_info: Option<ShaderMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
}

/// One rendered frame, PNG bytes as base64.
#[derive(Debug, Serialize)]
pub struct FrameInfo {
    pub data: String,
    pub size: usize,
    pub time_code: f64,
    pub cached: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct RenderMetadata {
    pub dimensions: String,
    pub quality: u8,
    pub frame_count: usize,
    pub cache_hits: usize,
    pub time_codes: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader_info: Option<ShaderMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ShaderInfoReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader_info: Option<ShaderMetadata>,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct RenderService {
    engine: EngineHandle,
    cache: Arc<RenderCache>,
    config: PrismConfig,
}

impl RenderService {
    pub fn new(engine: EngineHandle, cache: Arc<RenderCache>, config: PrismConfig) -> Self {
        Self {
            engine,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub async fn render(&self, req: RenderRequest) -> RenderOutcome {
        let mut logs = Vec::new();

        // Structural validation first; harvest a detailed diagnostic from a
        // tiny render attempt when it fails.
        match self.engine.validate(req.shader_content.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                let detail = self.harvest_diagnostic(&req.shader_content).await;
                return failure("Invalid shader content", detail, &req, logs);
            }
            Err(e) => {
                let detail = ErrorDetail::from_engine(&e, "shader validation");
                return failure("Engine unavailable", detail, &req, logs);
            }
        }

        let (width, height) = self.clamp_dimensions(
            req.width.unwrap_or(self.config.defaults.width),
            req.height.unwrap_or(self.config.defaults.height),
            &mut logs,
        );
        let quality = req
            .quality
            .unwrap_or(self.config.defaults.quality)
            .clamp(1, 100);

        let shader_info = self.engine.describe(req.shader_content.clone()).await.ok();

        // Coerce inputs against the declared schema.
        let mut inputs: Vec<(String, InputValue)> = Vec::new();
        if let Some(raw_inputs) = &req.inputs {
            for (name, raw) in raw_inputs {
                let declared = shader_info
                    .as_ref()
                    .and_then(|info| info.declared_kind(name));
                match coerce::coerce(name, raw, declared) {
                    Ok(value) => inputs.push((name.clone(), value)),
                    Err(e) => {
                        let detail = ErrorDetail::validation(e.to_string());
                        return failure(
                            format!("Invalid input '{}'", name),
                            detail,
                            &req,
                            logs,
                        );
                    }
                }
            }
        }

        let canon: Vec<(String, CanonValue)> = inputs
            .iter()
            .map(|(name, value)| (name.clone(), canon_value(value)))
            .collect();

        let mut frames = Vec::with_capacity(req.time_codes.len());
        let mut cache_hits = 0usize;

        for &time_code in &req.time_codes {
            let fingerprint = Fingerprint::compute(
                &req.shader_content,
                &canon,
                time_code,
                width,
                height,
            );

            let (bytes, cached) = match self.cache.get(&fingerprint) {
                Some(bytes) => {
                    cache_hits += 1;
                    if req.verbose {
                        logs.push(format!("frame t={} served from cache", time_code));
                    }
                    (bytes, true)
                }
                None => {
                    let params = FrameParams {
                        time_code,
                        width,
                        height,
                        quality,
                        inputs: inputs.clone(),
                    };
                    match self.engine.render(req.shader_content.clone(), params).await {
                        Ok(bytes) => {
                            let bytes = Arc::new(bytes);
                            self.cache.insert(fingerprint, bytes.clone());
                            if req.verbose {
                                logs.push(format!("frame t={} rendered", time_code));
                            }
                            (bytes, false)
                        }
                        Err(e) => {
                            tracing::error!(time_code, error = %e, "frame render failed");
                            let detail = ErrorDetail::from_engine(&e, "frame rendering");
                            return failure(
                                format!("Error rendering shader: {}", e),
                                detail,
                                &req,
                                logs,
                            );
                        }
                    }
                }
            };

            frames.push(FrameInfo {
                data: BASE64.encode(bytes.as_slice()),
                size: bytes.len(),
                time_code,
                cached,
            });
        }

        let frame_count = frames.len();
        RenderOutcome {
            success: true,
            message: format!("Successfully rendered {} frames", frame_count),
            frames,
            metadata: RenderMetadata {
                dimensions: format!("{}x{}", width, height),
                quality,
                frame_count,
                cache_hits,
                time_codes: req.time_codes.clone(),
            },
            shader_info,
            error: None,
            logs: req.verbose.then_some(logs),
        }
    }

    pub async fn validate(&self, source: &str) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if source.trim().is_empty() {
            errors.push("Shader content is empty".to_string());
        }

        let valid = matches!(self.engine.validate(source.to_string()).await, Ok(true));
        if !valid && errors.is_empty() {
            errors.push("Shader validation failed".to_string());
        }

        let upper = source.to_uppercase();
        if !upper.contains("TIME") {
            warnings.push("No TIME uniform found - shader may not animate".to_string());
        }
        if !upper.contains("RENDERSIZE") {
            warnings.push("No RENDERSIZE uniform found - shader may not be responsive".to_string());
        }

        let shader_info = self.describe_with_fallback(source).await;
        let error = if valid {
            None
        } else {
            Some(self.harvest_diagnostic(source).await)
        };

        ValidationReport {
            success: valid && errors.is_empty(),
            message: "Shader validation completed".to_string(),
            errors,
            warnings,
            shader_info,
            error,
        }
    }

    pub async fn describe(&self, source: &str) -> ShaderInfoReport {
        match self.describe_with_fallback(source).await {
            Some(shader_info) => ShaderInfoReport {
                success: true,
                message: "Shader information extracted successfully".to_string(),
                shader_info: Some(shader_info),
                errors: vec![],
            },
            None => ShaderInfoReport {
                success: false,
                message: "Error extracting shader info".to_string(),
                shader_info: None,
                errors: vec!["could not extract shader information".to_string()],
            },
        }
    }

    /// Descriptive metadata survives even when the engine cannot describe
    /// the shader; header extraction and source counts never fail.
    async fn describe_with_fallback(&self, source: &str) -> Option<ShaderMetadata> {
        match self.engine.describe(source.to_string()).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!(error = %e, "describe failed, extracting header manually");
                Some(ShaderMetadata::from_source(source))
            }
        }
    }

    /// Attempt a 1x1 render purely to capture the engine's error text.
    async fn harvest_diagnostic(&self, source: &str) -> ErrorDetail {
        let params = FrameParams {
            time_code: 0.0,
            width: 1,
            height: 1,
            quality: 1,
            inputs: vec![],
        };
        match self.engine.render(source.to_string(), params).await {
            Ok(_) => ErrorDetail::validation("Shader validation failed"),
            Err(e) => ErrorDetail::from_engine(&e, "shader validation"),
        }
    }

    fn clamp_dimensions(&self, width: u32, height: u32, logs: &mut Vec<String>) -> (u32, u32) {
        let max = self.config.max_image_size;
        let clamped_w = width.clamp(1, max);
        let clamped_h = height.clamp(1, max);
        if clamped_w != width || clamped_h != height {
            tracing::warn!(
                requested = format!("{}x{}", width, height),
                clamped = format!("{}x{}", clamped_w, clamped_h),
                "render dimensions clamped"
            );
            logs.push(format!(
                "dimensions clamped from {}x{} to {}x{}",
                width, height, clamped_w, clamped_h
            ));
        }
        (clamped_w, clamped_h)
    }
}

fn canon_value(value: &InputValue) -> CanonValue {
    match value {
        InputValue::Bool(b) => CanonValue::Bool(*b),
        InputValue::Long(n) => CanonValue::Long(*n),
        InputValue::Float(f) => CanonValue::Float(*f),
        InputValue::Point2d(p) => CanonValue::Point2d(*p),
        InputValue::Color(c) => CanonValue::Color(*c),
        InputValue::Image(path) => CanonValue::Path(path.to_string_lossy().into_owned()),
    }
}

fn failure(
    message: impl Into<String>,
    error: ErrorDetail,
    req: &RenderRequest,
    logs: Vec<String>,
) -> RenderOutcome {
    RenderOutcome {
        success: false,
        message: message.into(),
        frames: vec![],
        metadata: RenderMetadata {
            time_codes: req.time_codes.clone(),
            ..Default::default()
        },
        shader_info: None,
        error: Some(error),
        logs: req.verbose.then_some(logs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use std::time::Duration;

    const CONSTANT_SHADER: &str = "/*{\n    \"DESCRIPTION\": \"Solid green\"\n}*/\n\nvoid main() {\n    gl_FragColor = vec4(0.0, 1.0, 0.0, 1.0);\n}";

    fn service() -> RenderService {
        let config = PrismConfig::default();
        let engine = EngineHandle::spawn(
            engine::probe(&config),
            Duration::from_millis(config.request_timeout_ms),
        );
        RenderService::new(engine, Arc::new(RenderCache::new(config.cache_capacity)), config)
    }

    fn request(time_codes: Vec<f64>) -> RenderRequest {
        RenderRequest {
            shader_content: CONSTANT_SHADER.to_string(),
            time_codes,
            width: Some(64),
            height: Some(64),
            quality: None,
            inputs: None,
            verbose: false,
        }
    }

    #[tokio::test]
    async fn renders_constant_color_frames() {
        let service = service();
        let outcome = service.render(request(vec![0.0, 1.0])).await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.frames.len(), 2);
        assert_eq!(outcome.metadata.dimensions, "64x64");
        assert_eq!(outcome.metadata.frame_count, 2);

        for frame in &outcome.frames {
            let bytes = BASE64.decode(&frame.data).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
            assert_eq!(decoded.dimensions(), (64, 64));
            assert!(decoded.pixels().all(|p| p.0 == [0, 255, 0, 255]));
        }
    }

    #[tokio::test]
    async fn repeat_render_hits_cache_with_identical_bytes() {
        let service = service();

        let first = service.render(request(vec![0.0, 1.0])).await;
        assert_eq!(first.metadata.cache_hits, 0);

        let second = service.render(request(vec![0.0, 1.0])).await;
        assert_eq!(second.metadata.cache_hits, 2);
        assert!(second.frames.iter().all(|f| f.cached));

        for (a, b) in first.frames.iter().zip(&second.frames) {
            assert_eq!(a.data, b.data);
        }
    }

    #[tokio::test]
    async fn oversized_dimensions_are_clamped() {
        let service = service();
        let mut req = request(vec![0.0]);
        req.width = Some(999_999);
        req.height = Some(999_999);

        let outcome = service.render(req).await;
        assert!(outcome.success);
        assert_eq!(outcome.metadata.dimensions, "4096x4096");
    }

    #[tokio::test]
    async fn render_recovers_after_invalid_shader_request() {
        let service = service();
        assert!(service.render(request(vec![0.0])).await.success);

        let mut bad = request(vec![0.0]);
        bad.shader_content = "not a shader".to_string();
        assert!(!service.render(bad).await.success);

        // Fresh time code so the frame cannot come from the cache.
        let outcome = service.render(request(vec![2.0])).await;
        assert!(outcome.success, "{:?}", outcome.error);
    }

    #[tokio::test]
    async fn invalid_shader_fails_without_frames() {
        let service = service();
        let mut req = request(vec![0.0]);
        req.shader_content = String::new();

        let outcome = service.render(req).await;
        assert!(!outcome.success);
        assert!(outcome.frames.is_empty());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn bad_input_fails_with_validation_detail() {
        let service = service();
        let mut req = request(vec![0.0]);
        let mut inputs = Map::new();
        inputs.insert("mystery".to_string(), serde_json::json!({"nested": true}));
        req.inputs = Some(inputs);

        let outcome = service.render(req).await;
        assert!(!outcome.success);
        let detail = outcome.error.unwrap();
        assert_eq!(detail.kind, crate::diagnose::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn validate_reports_heuristic_warnings() {
        let service = service();
        let report = service.validate(CONSTANT_SHADER).await;

        assert!(report.success);
        assert!(report.errors.is_empty());
        // Constant shader uses neither TIME nor RENDERSIZE.
        assert_eq!(report.warnings.len(), 2);
    }

    #[tokio::test]
    async fn validate_empty_shader_fails() {
        let service = service();
        let report = service.validate("").await;

        assert!(!report.success);
        assert!(report.errors.iter().any(|e| e.contains("empty")));
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn describe_surfaces_header_fields() {
        let service = service();
        let report = service.describe(CONSTANT_SHADER).await;

        assert!(report.success);
        let info = report.shader_info.unwrap();
        assert_eq!(info.description.as_deref(), Some("Solid green"));
        assert_eq!(info.shader_type, "ISF");
    }

    #[tokio::test]
    async fn describe_falls_back_to_header_extraction() {
        use crate::engine::{EngineError, RenderEngine};

        struct NoDescribe;
        impl RenderEngine for NoDescribe {
            fn backend_name(&self) -> &'static str {
                "nodescribe"
            }
            fn validate(&mut self, _source: &str) -> bool {
                true
            }
            fn load(&mut self, _source: &str) -> Result<(), EngineError> {
                Ok(())
            }
            fn render(&mut self, _params: &FrameParams) -> Result<Vec<u8>, EngineError> {
                Ok(vec![])
            }
            fn describe(&mut self, _source: &str) -> Result<ShaderMetadata, EngineError> {
                Err(EngineError::Unavailable {
                    reason: "no metadata support".to_string(),
                })
            }
        }

        let config = PrismConfig::default();
        let engine = EngineHandle::spawn(Box::new(NoDescribe), Duration::from_secs(5));
        let service = RenderService::new(engine, Arc::new(RenderCache::default()), config);

        let report = service.describe(CONSTANT_SHADER).await;
        assert!(report.success);
        let info = report.shader_info.unwrap();
        assert_eq!(info.description.as_deref(), Some("Solid green"));
        assert_eq!(info.shader_type, "ISF");
    }

    #[tokio::test]
    async fn verbose_render_carries_logs() {
        let service = service();
        let mut req = request(vec![0.0]);
        req.verbose = true;

        let outcome = service.render(req).await;
        assert!(outcome.success);
        assert!(outcome.logs.is_some_and(|logs| !logs.is_empty()));
    }
}
