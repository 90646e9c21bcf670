//! Response streamer — drives one handler generation per request and
//! re-frames its output into the UI message-stream protocol.
//!
//! Every response runs in its own tokio task and is delivered through a
//! bounded channel of [`Frame`]s. The sequence is always well-formed:
//!
//! - success (including empty output) ends with `finish{stop}`
//! - a generation failure, before or after partial output, appends one
//!   `Error generating response: …` delta and ends with `finish{error}`
//! - an unsupported model yields one explanatory delta and `finish{error}`
//!   without calling any provider
//!
//! Dropping the receiver cancels the task, which drops the handler stream
//! and with it the provider connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use forkreach_config::AppConfig;
use forkreach_core::context::SessionContext;
use forkreach_core::event::{DomainEvent, EventBus};
use forkreach_core::message::Turn;
use forkreach_providers::{BackendRegistry, Resolution};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::frame::{FinishReason, Frame, FrameIds};
use crate::handler::{GenerationError, GenerationTarget, HandlerStream};
use crate::registry::{HandlerRegistry, RegistryError};
use crate::router::{Routed, Router};

const FRAME_BUFFER: usize = 64;

/// Input for one streamed response.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    pub message: String,
    /// Explicit handler id; unknown ids fall back to auto-routing
    pub handler_id: Option<String>,
    /// Requested model; `None` uses the default
    pub model: Option<String>,
    pub context: Option<SessionContext>,
    /// Earlier turns, oldest first
    pub history: Vec<Turn>,
}

impl StreamRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_handler(mut self, id: impl Into<String>) -> Self {
        self.handler_id = Some(id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone)]
pub struct StreamerSettings {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub history_limit: usize,
    /// Longest wait for the next fragment before giving up
    pub chunk_timeout: Duration,
}

impl Default for StreamerSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            history_limit: 5,
            chunk_timeout: Duration::from_secs(60),
        }
    }
}

impl StreamerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            history_limit: config.generation.history_limit,
            chunk_timeout: Duration::from_secs(config.generation.chunk_timeout_secs),
        }
    }
}

/// Fail-soft text for a model whose backend is not wired.
pub fn unsupported_model_message(model: &str) -> String {
    format!("Model '{model}' is not yet supported. Please use a Gemini model.")
}

/// Visible text for a failed generation.
pub fn generation_error_message(error: &GenerationError) -> String {
    format!("Error generating response: {error}")
}

pub struct ResponseStreamer {
    router: Router,
    backends: Arc<BackendRegistry>,
    settings: StreamerSettings,
    events: Option<Arc<EventBus>>,
}

impl ResponseStreamer {
    pub fn new(router: Router, backends: Arc<BackendRegistry>, settings: StreamerSettings) -> Self {
        Self {
            router,
            backends,
            settings,
            events: None,
        }
    }

    /// Built-in handlers, backends and limits from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let registry = HandlerRegistry::builtin(&config.routing.priority_handler)?;
        Ok(Self::new(
            Router::new(Arc::new(registry)),
            Arc::new(forkreach_providers::build_from_config(config)),
            StreamerSettings::from_config(config),
        ))
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.backends
    }

    pub fn settings(&self) -> &StreamerSettings {
        &self.settings
    }

    /// Start a response. Frames arrive on the returned receiver in order.
    pub fn stream(&self, request: StreamRequest) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let run = StreamRun {
            router: self.router.clone(),
            backends: Arc::clone(&self.backends),
            settings: self.settings.clone(),
            events: self.events.clone(),
            ids: FrameIds::new(),
            tx,
        };
        tokio::spawn(run.execute(request));
        rx
    }
}

/// How a response ended, for logging and events.
enum Outcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// State owned by one response task.
struct StreamRun {
    router: Router,
    backends: Arc<BackendRegistry>,
    settings: StreamerSettings,
    events: Option<Arc<EventBus>>,
    ids: FrameIds,
    tx: mpsc::Sender<Frame>,
}

impl StreamRun {
    async fn execute(self, request: StreamRequest) {
        let started = Instant::now();

        let (provider, model) = match self.backends.resolve(request.model.as_deref()) {
            Resolution::Supported { provider, model } => (provider, model),
            Resolution::Unsupported { model } => {
                warn!(model = %model, "Requested model is not supported");
                let text = unsupported_model_message(&model);
                for frame in self.ids.whole(None, &text, FinishReason::Error) {
                    if self.tx.send(frame).await.is_err() {
                        return;
                    }
                }
                self.publish(DomainEvent::GenerationFailed {
                    handler_id: None,
                    error: text,
                    timestamp: Utc::now(),
                });
                return;
            }
        };

        let routed = self
            .router
            .route(&request.message, request.handler_id.as_deref());
        self.publish_selected(&routed);

        let handler_id = routed.handler.id().to_string();
        info!(
            handler = %handler_id,
            score = routed.score,
            explicit = routed.explicit,
            model = %model,
            "Streaming response"
        );

        if !self.send(self.ids.start(Some(&handler_id))).await
            || !self.send(self.ids.text_start()).await
        {
            return;
        }

        let target = GenerationTarget {
            provider,
            model,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            history_limit: self.settings.history_limit,
        };

        let mut deltas = 0usize;
        let outcome = match self.open(&routed, &target, &request).await {
            Ok(Some(stream)) => self.pump(stream, &mut deltas).await,
            Ok(None) => Outcome::Cancelled,
            Err(e) => self.fail(&e, &mut deltas).await,
        };

        let reason = match outcome {
            Outcome::Cancelled => {
                debug!(handler = %handler_id, "Consumer went away, response abandoned");
                return;
            }
            Outcome::Completed => FinishReason::Stop,
            Outcome::Failed(error) => {
                self.publish(DomainEvent::GenerationFailed {
                    handler_id: Some(handler_id.clone()),
                    error,
                    timestamp: Utc::now(),
                });
                FinishReason::Error
            }
        };

        if !self.send(self.ids.text_end()).await || !self.send(self.ids.finish(reason)).await {
            return;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(handler = %handler_id, deltas, duration_ms, reason = reason.as_str(), "Response finished");
        self.publish(DomainEvent::ResponseCompleted {
            handler_id,
            finish_reason: reason.as_str().into(),
            deltas,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    /// Start generation, bounded by the chunk timeout. `Ok(None)` means the
    /// consumer disconnected while waiting.
    async fn open(
        &self,
        routed: &Routed,
        target: &GenerationTarget,
        request: &StreamRequest,
    ) -> Result<Option<HandlerStream>, GenerationError> {
        let generate = routed.handler.generate(
            target,
            &request.message,
            &request.history,
            request.context.as_ref(),
        );

        tokio::select! {
            _ = self.tx.closed() => Ok(None),
            result = tokio::time::timeout(self.settings.chunk_timeout, generate) => match result {
                Ok(stream) => stream.map(Some),
                Err(_) => Err(self.timeout_error()),
            },
        }
    }

    async fn pump(&self, mut stream: HandlerStream, deltas: &mut usize) -> Outcome {
        loop {
            let next = tokio::select! {
                _ = self.tx.closed() => return Outcome::Cancelled,
                next = tokio::time::timeout(self.settings.chunk_timeout, stream.next()) => next,
            };

            match next {
                Ok(None) => return Outcome::Completed,
                Ok(Some(Ok(text))) => {
                    if !self.send(self.ids.delta(text)).await {
                        return Outcome::Cancelled;
                    }
                    *deltas += 1;
                }
                Ok(Some(Err(e))) => return self.fail(&e, deltas).await,
                Err(_) => {
                    let e = self.timeout_error();
                    return self.fail(&e, deltas).await;
                }
            }
        }
    }

    async fn fail(&self, error: &GenerationError, deltas: &mut usize) -> Outcome {
        warn!(error = %error, partial_deltas = *deltas, "Generation failed");
        if !self.send(self.ids.delta(generation_error_message(error))).await {
            return Outcome::Cancelled;
        }
        *deltas += 1;
        Outcome::Failed(error.to_string())
    }

    fn timeout_error(&self) -> GenerationError {
        GenerationError::Timeout {
            secs: self.settings.chunk_timeout.as_secs(),
        }
    }

    async fn send(&self, frame: Frame) -> bool {
        self.tx.send(frame).await.is_ok()
    }

    fn publish_selected(&self, routed: &Routed) {
        self.publish(DomainEvent::HandlerSelected {
            handler_id: routed.handler.id().to_string(),
            score: routed.score,
            explicit: routed.explicit,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::validate_sequence;
    use crate::test_helpers::{Script, ScriptedProvider, collect, streamer};
    use forkreach_core::error::ProviderError;

    fn text_of(frames: &[Frame]) -> String {
        frames.iter().filter_map(Frame::delta).collect()
    }

    fn handler_of(frames: &[Frame]) -> Option<String> {
        match &frames[0] {
            Frame::Start { handler_id, .. } => handler_id.clone(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn success_frames_are_well_formed() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(["1/ Shipping ", "in public"])));
        let streamer = streamer(provider.clone());

        let frames = collect(streamer.stream(StreamRequest::new("Write a Twitter thread"))).await;

        validate_sequence(&frames).unwrap();
        assert_eq!(frames.len(), 6);
        assert_eq!(handler_of(&frames).as_deref(), Some("twitter"));
        assert_eq!(text_of(&frames), "1/ Shipping in public");
        assert_eq!(frames.last().unwrap().finish_reason(), Some(FinishReason::Stop));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn deltas_never_carry_handler_signal() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(["Subject: hi"])));
        let frames =
            collect(streamer(provider).stream(StreamRequest::new("x").with_handler("email"))).await;

        assert_eq!(handler_of(&frames).as_deref(), Some("email"));
        let text = text_of(&frames);
        assert_eq!(text, "Subject: hi");
        assert!(!text.contains("email"));
        assert!(!text.contains("[AGENT"));
    }

    #[tokio::test]
    async fn empty_output_finishes_with_stop() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(Vec::<String>::new())));
        let frames = collect(streamer(provider).stream(StreamRequest::new("hello"))).await;

        validate_sequence(&frames).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3].finish_reason(), Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn failure_before_output() {
        let provider = Arc::new(ScriptedProvider::new(Script::Fail(ProviderError::ApiError {
            status_code: 500,
            message: "upstream down".into(),
        })));
        let frames = collect(streamer(provider).stream(StreamRequest::new("hello"))).await;

        validate_sequence(&frames).unwrap();
        assert_eq!(frames.len(), 5);
        let text = text_of(&frames);
        assert!(text.starts_with("Error generating response: "));
        assert!(text.contains("upstream down"));
        assert_eq!(frames[4].finish_reason(), Some(FinishReason::Error));
    }

    #[tokio::test]
    async fn failure_after_partial_output_appends_error() {
        let provider = Arc::new(ScriptedProvider::new(Script::ChunksThenError(
            vec!["Hook: ".into(), "ship it".into()],
            ProviderError::StreamInterrupted("connection reset".into()),
        )));
        let frames = collect(streamer(provider).stream(StreamRequest::new("hello"))).await;

        validate_sequence(&frames).unwrap();
        let deltas: Vec<&str> = frames.iter().filter_map(Frame::delta).collect();
        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[0], "Hook: ");
        assert_eq!(deltas[1], "ship it");
        assert!(deltas[2].starts_with("Error generating response: Stream interrupted"));
        assert_eq!(frames.last().unwrap().finish_reason(), Some(FinishReason::Error));
    }

    #[tokio::test]
    async fn unsupported_model_makes_no_provider_call() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(["never"])));
        let streamer = streamer(provider.clone());

        let frames = collect(
            streamer.stream(StreamRequest::new("hello").with_model("claude-opus-4-20250514")),
        )
        .await;

        validate_sequence(&frames).unwrap();
        assert_eq!(frames.len(), 5);
        assert_eq!(handler_of(&frames), None);
        assert_eq!(
            text_of(&frames),
            "Model 'claude-opus-4-20250514' is not yet supported. Please use a Gemini model."
        );
        assert_eq!(frames[4].finish_reason(), Some(FinishReason::Error));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_generation_times_out() {
        let provider = Arc::new(ScriptedProvider::new(Script::Stall));
        let frames = collect(streamer(provider.clone()).stream(StreamRequest::new("hello"))).await;

        validate_sequence(&frames).unwrap();
        assert_eq!(provider.calls(), 1);
        let text = text_of(&frames);
        assert_eq!(text, "Error generating response: no output received within 60s");
        assert_eq!(frames.last().unwrap().finish_reason(), Some(FinishReason::Error));
    }

    #[tokio::test]
    async fn context_and_history_reach_the_prompt() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(["ok"])));
        let history = (0..8).map(|i| Turn::user(format!("turn{i}"))).collect();
        let request = StreamRequest::new("Write a headline")
            .with_context(SessionContext::new("DevTodo").with_tagline("Todos for devs"))
            .with_history(history);

        collect(streamer(provider.clone()).stream(request)).await;

        let prompt = provider.last_request().unwrap().messages[0].content.clone();
        assert!(prompt.contains("## Product Context\nProduct Name: DevTodo\nTagline: Todos for devs"));
        assert!(prompt.contains("User: turn3\n"));
        assert!(!prompt.contains("turn2"));
        assert!(prompt.ends_with("User: Write a headline"));
    }

    #[tokio::test]
    async fn concurrent_requests_keep_their_own_context() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(["ok"])));
        let streamer = streamer(provider.clone());

        let a = streamer.stream(
            StreamRequest::new("tweet").with_context(SessionContext::new("Alpha")),
        );
        let b = streamer.stream(StreamRequest::new("tweet"));
        let (fa, fb) = tokio::join!(collect(a), collect(b));

        validate_sequence(&fa).unwrap();
        validate_sequence(&fb).unwrap();

        let prompts: Vec<String> = provider
            .requests()
            .iter()
            .map(|r| r.messages[0].content.clone())
            .collect();
        assert_eq!(prompts.len(), 2);
        let with_context: Vec<&String> = prompts
            .iter()
            .filter(|p| p.contains("## Product Context"))
            .collect();
        assert_eq!(with_context.len(), 1);
        assert!(with_context[0].contains("Product Name: Alpha"));
    }

    #[tokio::test]
    async fn events_are_published() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(["a", "b"])));
        let bus = Arc::new(EventBus::new(16));
        let mut events = bus.subscribe();
        let streamer = streamer(provider).with_event_bus(Arc::clone(&bus));

        collect(streamer.stream(StreamRequest::new("write a newsletter"))).await;

        match events.recv().await.unwrap().as_ref() {
            DomainEvent::HandlerSelected { handler_id, score, .. } => {
                assert_eq!(handler_id, "email");
                assert_eq!(*score, 0.95);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match events.recv().await.unwrap().as_ref() {
            DomainEvent::ResponseCompleted {
                finish_reason,
                deltas,
                ..
            } => {
                assert_eq!(finish_reason, "stop");
                assert_eq!(*deltas, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_stops_the_task() {
        let provider = Arc::new(ScriptedProvider::new(Script::Stall));
        let bus = Arc::new(EventBus::new(16));
        let mut events = bus.subscribe();
        let streamer = streamer(provider).with_event_bus(Arc::clone(&bus));

        let mut rx = streamer.stream(StreamRequest::new("hello"));
        assert!(matches!(rx.recv().await, Some(Frame::Start { .. })));
        drop(rx);

        // Selection is published, but no completion follows
        assert!(matches!(
            events.recv().await.unwrap().as_ref(),
            DomainEvent::HandlerSelected { .. }
        ));
        tokio::task::yield_now().await;
        assert!(events.try_recv().is_err());
    }
}
