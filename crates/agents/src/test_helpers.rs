//! Shared test helpers: a scripted streaming provider and streamer wiring.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forkreach_core::error::ProviderError;
use forkreach_core::message::Message;
use forkreach_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use forkreach_providers::BackendRegistry;
use tokio::sync::mpsc;

use crate::frame::Frame;
use crate::registry::HandlerRegistry;
use crate::router::Router;
use crate::streamer::{ResponseStreamer, StreamerSettings};

pub const MOCK_MODEL: &str = "mock-model";

/// What the provider does when asked to stream.
#[derive(Clone)]
pub enum Script {
    /// Emit each fragment, then a done chunk.
    Chunks(Vec<String>),
    /// Emit the fragments, then fail mid-stream.
    ChunksThenError(Vec<String>, ProviderError),
    /// Refuse the request outright.
    Fail(ProviderError),
    /// Accept the request but never produce a chunk.
    Stall,
}

impl Script {
    pub fn chunks<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(fragments.into_iter().map(Into::into).collect())
    }
}

/// A provider that replays a script and records every request.
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
    // Keeps stalled channels open
    parked: Mutex<Vec<mpsc::Sender<Result<StreamChunk, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            parked: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Chunks(parts) => Ok(ProviderResponse {
                message: Message::assistant(parts.concat()),
                usage: None,
                model: request.model,
            }),
            Script::ChunksThenError(_, e) | Script::Fail(e) => Err(e.clone()),
            Script::Stall => Err(ProviderError::Timeout("stalled".into())),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(16);
        match self.script.clone() {
            Script::Fail(e) => return Err(e),
            Script::Stall => self.parked.lock().unwrap().push(tx),
            Script::Chunks(parts) => {
                tokio::spawn(async move {
                    for part in parts {
                        if tx.send(Ok(StreamChunk::text(part))).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(Ok(StreamChunk::finished(None))).await;
                });
            }
            Script::ChunksThenError(parts, e) => {
                tokio::spawn(async move {
                    for part in parts {
                        if tx.send(Ok(StreamChunk::text(part))).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(Err(e)).await;
                });
            }
        }
        Ok(rx)
    }
}

/// Backends with a single wired mock model.
pub fn mock_backends(provider: Arc<ScriptedProvider>) -> BackendRegistry {
    let mut backends = BackendRegistry::new(MOCK_MODEL);
    backends.map_model(MOCK_MODEL, "mock");
    backends.map_model("claude-opus-4-20250514", "anthropic");
    backends.register("mock", provider);
    backends
}

/// A streamer over the built-in handlers and the given provider.
pub fn streamer(provider: Arc<ScriptedProvider>) -> ResponseStreamer {
    let registry = HandlerRegistry::builtin("twitter").unwrap();
    ResponseStreamer::new(
        Router::new(Arc::new(registry)),
        Arc::new(mock_backends(provider)),
        StreamerSettings {
            chunk_timeout: Duration::from_secs(60),
            ..StreamerSettings::default()
        },
    )
}

/// Drain a frame receiver.
pub async fn collect(mut rx: mpsc::Receiver<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}
