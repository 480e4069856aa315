//! Single-owner engine worker.
//!
//! Exactly one blocking task owns the `Box<dyn RenderEngine>` and drains a
//! command channel, so every engine call in the process is serialized no
//! matter how many transports or HTTP requests are in flight. Callers hold a
//! cloneable [`EngineHandle`]; each call carries a oneshot reply and a
//! timeout. A timed-out call is abandoned by its caller but still runs to
//! completion on the worker before the next command is taken, so the engine
//! is never observed mid-call.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::{EngineError, FrameParams, RenderEngine, ShaderMetadata};

enum Command {
    Validate {
        source: String,
        reply: oneshot::Sender<bool>,
    },
    Render {
        source: String,
        params: FrameParams,
        reply: oneshot::Sender<Result<Vec<u8>, EngineError>>,
    },
    Describe {
        source: String,
        reply: oneshot::Sender<Result<ShaderMetadata, EngineError>>,
    },
}

/// Cloneable async handle to the engine worker.
///
/// Dropping the last handle closes the channel and the worker exits after
/// finishing its current command.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    timeout: Duration,
}

impl EngineHandle {
    /// Spawn the worker task that owns the engine.
    pub fn spawn(mut engine: Box<dyn RenderEngine>, timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(32);

        tokio::task::spawn_blocking(move || {
            // The shader stays loaded across commands; reload only on change.
            let mut current_source: Option<String> = None;

            while let Some(command) = rx.blocking_recv() {
                match command {
                    Command::Validate { source, reply } => {
                        let _ = reply.send(engine.validate(&source));
                    }
                    Command::Render {
                        source,
                        params,
                        reply,
                    } => {
                        let result = ensure_loaded(&mut *engine, &mut current_source, &source)
                            .and_then(|()| engine.render(&params));
                        if reply.send(result).is_err() {
                            tracing::warn!("render result dropped, caller gave up");
                        }
                    }
                    Command::Describe { source, reply } => {
                        let _ = reply.send(engine.describe(&source));
                    }
                }
            }

            tracing::debug!("engine worker shutting down");
        });

        Self { tx, timeout }
    }

    pub async fn validate(&self, source: String) -> Result<bool, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Validate { source, reply }).await?;
        self.await_reply(rx).await
    }

    pub async fn render(
        &self,
        source: String,
        params: FrameParams,
    ) -> Result<Vec<u8>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Render {
            source,
            params,
            reply,
        })
        .await?;
        self.await_reply(rx).await?
    }

    pub async fn describe(&self, source: String) -> Result<ShaderMetadata, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Describe { source, reply }).await?;
        self.await_reply(rx).await?
    }

    async fn send(&self, command: Command) -> Result<(), EngineError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| EngineError::Unavailable {
                reason: "engine worker has shut down".to_string(),
            })
    }

    async fn await_reply<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, EngineError> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(EngineError::Unavailable {
                reason: "engine worker dropped the reply".to_string(),
            }),
            Err(_) => Err(EngineError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Load `source` into the engine if it is not already the active shader.
fn ensure_loaded(
    engine: &mut dyn RenderEngine,
    current: &mut Option<String>,
    source: &str,
) -> Result<(), EngineError> {
    if current.as_deref() != Some(source) {
        // A failed load empties the engine slot, so forget the old source
        // before trying; otherwise the next render of it would skip the
        // reload.
        *current = None;
        engine.load(source)?;
        *current = Some(source.to_string());
        tracing::debug!(bytes = source.len(), "loaded shader into engine");
    }
    Ok(())
}
