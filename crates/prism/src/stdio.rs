//! Line-delimited stream transport.
//!
//! One JSON-RPC message per line on the reader, one response envelope per
//! line on the writer. Strictly sequential: a request is fully dispatched
//! and answered before the next line is read, so responses always come back
//! in request order. Logging goes to stderr; stdout carries only protocol.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use prismproto::{Dispatcher, Handler};

/// Serve the protocol over stdin/stdout until EOF.
pub async fn run<H: Handler>(handler: Arc<H>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tracing::info!("stream transport running");
    serve(handler, stdin, stdout).await
}

/// Transport loop, generic over the byte streams for testability.
pub async fn serve<H, R, W>(handler: Arc<H>, reader: R, mut writer: W) -> Result<()>
where
    H: Handler,
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let dispatcher = Dispatcher::new(handler);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("transport read failed")? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(response) = dispatcher.dispatch_line(trimmed).await {
            let mut payload =
                serde_json::to_vec(&response).context("failed to serialize response")?;
            payload.push(b'\n');
            writer
                .write_all(&payload)
                .await
                .context("transport write failed")?;
            writer.flush().await.context("transport flush failed")?;
        }
    }

    dispatcher.close().await;
    tracing::info!("stream transport closed (EOF)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrismConfig;
    use crate::engine;
    use crate::engine::worker::EngineHandle;
    use crate::handler::ShaderHandler;
    use crate::render::RenderService;
    use framecache::RenderCache;
    use serde_json::Value;
    use std::time::Duration;

    fn handler() -> Arc<ShaderHandler> {
        let config = PrismConfig::default();
        let engine = EngineHandle::spawn(engine::probe(&config), Duration::from_secs(5));
        let cache = Arc::new(RenderCache::new(config.cache_capacity));
        Arc::new(ShaderHandler::new(RenderService::new(engine, cache, config)))
    }

    async fn run_session(input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(handler(), input.as_bytes(), &mut output)
            .await
            .unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn full_session_flow() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test","version":"0"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"validate_shader","arguments":{"shader_content":""}}}"#,
            "\n",
        );

        let responses = run_session(input).await;
        // The notification produces no response line.
        assert_eq!(responses.len(), 3);

        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "prism");
        assert_eq!(
            responses[0]["result"]["protocolVersion"],
            prismproto::PROTOCOL_VERSION
        );

        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 3);

        assert_eq!(responses[2]["id"], 3);
        assert_eq!(responses[2]["result"]["isError"], true);
        let text = responses[2]["result"]["content"][0]["text"].as_str().unwrap();
        let outcome: Value = serde_json::from_str(text).unwrap();
        assert_eq!(outcome["success"], false);
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_and_loop_survives() {
        let input = concat!(
            "this is not json\n",
            r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#,
            "\n",
        );

        // The unparseable line produces no response line at all.
        let responses = run_session(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 5);
        assert_eq!(responses[0]["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let input = concat!(
            "\n",
            "   \n",
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
        );

        let responses = run_session(input).await;
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn responses_preserve_request_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":10,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":11,"method":"resources/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":12,"method":"ping"}"#,
            "\n",
        );

        let responses = run_session(input).await;
        let ids: Vec<i64> = responses
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [10, 11, 12]);
    }
}
