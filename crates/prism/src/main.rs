mod coerce;
mod config;
mod diagnose;
mod engine;
mod handler;
mod http;
mod render;
mod resources;
mod stdio;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use framecache::RenderCache;
use prismproto::Dispatcher;

use crate::engine::worker::EngineHandle;
use crate::handler::ShaderHandler;
use crate::render::RenderService;

/// MCP server for ISF shader rendering.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Serve over HTTP instead of stdin/stdout.
    #[arg(long)]
    http: bool,

    /// Host to bind (HTTP mode).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (HTTP mode).
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a config file (replaces the local prism.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // All logging goes to stderr; stdout belongs to the stream transport.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (mut config, sources) =
        config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    for file in &sources.files {
        tracing::info!(path = %file.display(), "loaded config file");
    }
    for var in &sources.env_overrides {
        tracing::debug!(var, "config overridden from environment");
    }

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let engine = engine::probe(&config);
    let engine = EngineHandle::spawn(engine, Duration::from_millis(config.request_timeout_ms));

    let cache = Arc::new(RenderCache::new(config.cache_capacity));
    let service = RenderService::new(engine, cache, config.clone());
    let handler = Arc::new(ShaderHandler::new(service.clone()));

    if cli.http {
        http::run(http::AppState {
            dispatcher: Arc::new(Dispatcher::new(handler)),
            service,
            config,
        })
        .await
    } else {
        stdio::run(handler).await
    }
}
