//! HTTP transport.
//!
//! `POST /` carries the JSON-RPC protocol for MCP clients that speak HTTP;
//! the REST endpoints (`/render`, `/validate`, `/info`, `/resources`) expose
//! the same operations for plain HTTP callers. Engine serialization happens
//! behind the shared render service, so concurrent HTTP requests are safe.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use prismproto::{Dispatcher, Handler};

use crate::config::PrismConfig;
use crate::handler::{ShaderHandler, SERVER_NAME, SERVER_VERSION};
use crate::render::{RenderRequest, RenderService};
use crate::resources;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher<ShaderHandler>>,
    pub service: RenderService,
    pub config: PrismConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(describe_server).post(protocol))
        .route("/health", get(health))
        .route("/render", post(render))
        .route("/validate", post(validate))
        .route("/info", post(shader_info))
        .route("/resources", get(list_resources))
        .route("/resources/{*uri}", get(read_resource))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Log method, path, truncated body, and response status for every request.
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let request = if method == axum::http::Method::POST {
        let (parts, body) = request.into_parts();
        match axum::body::to_bytes(body, 1024 * 1024 * 64).await {
            Ok(bytes) => {
                let preview: String = String::from_utf8_lossy(&bytes).chars().take(200).collect();
                tracing::info!(%method, %path, body = %preview, "request");
                Request::from_parts(parts, Body::from(bytes))
            }
            Err(e) => {
                tracing::warn!(%method, %path, error = %e, "could not read request body");
                Request::from_parts(parts, Body::empty())
            }
        }
    } else {
        tracing::info!(%method, %path, "request");
        request
    };

    let response = next.run(request).await;
    tracing::info!(%method, %path, status = %response.status(), "response");
    response
}

/// JSON-RPC over HTTP. Notifications get 202 with no body.
async fn protocol(State(state): State<AppState>, Json(envelope): Json<Value>) -> Response {
    match state.dispatcher.dispatch_value(envelope).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn describe_server() -> impl IntoResponse {
    Json(json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "description": "HTTP server for ISF shader rendering",
        "endpoints": ["/render", "/validate", "/info", "/health"],
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy", "service": SERVER_NAME}))
}

async fn render(State(state): State<AppState>, Json(request): Json<RenderRequest>) -> Response {
    let max_frames = state.config.max_frames_per_request;
    if request.time_codes.len() > max_frames {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("Too many time codes. Maximum allowed: {}", max_frames),
            })),
        )
            .into_response();
    }

    Json(state.service.render(request).await).into_response()
}

#[derive(Deserialize)]
struct ShaderBody {
    shader_content: String,
}

async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ShaderBody>,
) -> impl IntoResponse {
    Json(state.service.validate(&body.shader_content).await)
}

async fn shader_info(
    State(state): State<AppState>,
    Json(body): Json<ShaderBody>,
) -> impl IntoResponse {
    Json(state.service.describe(&body.shader_content).await)
}

async fn list_resources() -> impl IntoResponse {
    Json(json!({"resources": resources::list()}))
}

async fn read_resource(Path(uri): Path<String>) -> Response {
    let full_uri = format!("isf://{}", uri);
    match resources::read(&full_uri) {
        Some(contents) => contents.text.into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Unknown resource: {}", full_uri)})),
        )
            .into_response(),
    }
}

/// Bind and serve until shutdown.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "http transport listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use crate::engine::worker::EngineHandle;
    use framecache::RenderCache;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = PrismConfig::default();
        let engine = EngineHandle::spawn(engine::probe(&config), Duration::from_secs(5));
        let cache = Arc::new(RenderCache::new(config.cache_capacity));
        let service = RenderService::new(engine, cache, config.clone());
        let handler = Arc::new(ShaderHandler::new(service.clone()));
        router(AppState {
            dispatcher: Arc::new(Dispatcher::new(handler)),
            service,
            config,
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(path: &str, body: Value) -> Request {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn root_get_describes_server() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["name"], "prism");
        assert!(json["endpoints"].as_array().unwrap().contains(&json!("/render")));
    }

    #[tokio::test]
    async fn protocol_endpoint_dispatches_requests() {
        let response = app()
            .oneshot(post_json(
                "/",
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn protocol_notification_returns_accepted() {
        let response = app()
            .oneshot(post_json(
                "/",
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn protocol_unknown_method_is_json_rpc_error() {
        let response = app()
            .oneshot(post_json(
                "/",
                json!({"jsonrpc": "2.0", "id": 9, "method": "prompts/list"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn render_endpoint_enforces_frame_limit() {
        let time_codes: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let response = app()
            .oneshot(post_json(
                "/render",
                json!({
                    "shader_content": "/*{}*/\nvoid main() { gl_FragColor = vec4(0.0, 0.0, 1.0, 1.0); }",
                    "time_codes": time_codes,
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Too many time codes"));
    }

    #[tokio::test]
    async fn render_endpoint_renders() {
        let response = app()
            .oneshot(post_json(
                "/render",
                json!({
                    "shader_content": "/*{}*/\nvoid main() { gl_FragColor = vec4(0.0, 0.0, 1.0, 1.0); }",
                    "time_codes": [0.0],
                    "width": 32,
                    "height": 32,
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["frames"].as_array().unwrap().len(), 1);
        assert_eq!(json["metadata"]["dimensions"], "32x32");
    }

    #[tokio::test]
    async fn validate_endpoint() {
        let response = app()
            .oneshot(post_json("/validate", json!({"shader_content": ""})))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn resource_endpoints() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/resources")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["resources"].as_array().unwrap().len(), 3);

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/resources/examples/basic")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/resources/examples/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
