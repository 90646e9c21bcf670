//! Handlers — a persona template plus an intent scorer.
//!
//! A handler is immutable after construction and holds no per-request
//! state. Product context and history arrive as call parameters, so one
//! `Arc<Handler>` serves any number of concurrent requests.

use std::sync::Arc;

use forkreach_core::context::SessionContext;
use forkreach_core::error::ProviderError;
use forkreach_core::message::{Message, Turn};
use forkreach_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scoring::IntentScorer;

/// Display metadata for a handler, as listed by `/api/agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerInfo {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

/// Why generation could not produce (or finish) a response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no output received within {secs}s")]
    Timeout { secs: u64 },
}

/// Where and how to generate: the resolved provider plus request knobs.
#[derive(Clone)]
pub struct GenerationTarget {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub history_limit: usize,
}

/// A marketing persona with its routing scorer.
pub struct Handler {
    info: HandlerInfo,
    persona: String,
    scorer: Box<dyn IntentScorer>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("id", &self.info.id).finish()
    }
}

impl Handler {
    pub fn new(
        info: HandlerInfo,
        persona: impl Into<String>,
        scorer: impl IntentScorer + 'static,
    ) -> Self {
        Self {
            info,
            persona: persona.into(),
            scorer: Box::new(scorer),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn info(&self) -> &HandlerInfo {
        &self.info
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Confidence in `[0, 1]` that this handler suits `text`.
    pub fn score(&self, text: &str) -> f32 {
        self.scorer.score(text)
    }

    /// Persona text, followed by the product context block when one is given.
    pub fn build_persona(&self, context: Option<&SessionContext>) -> String {
        match context {
            Some(ctx) => format!("{}\n\n## Product Context\n{}", self.persona, ctx.render()),
            None => self.persona.clone(),
        }
    }

    /// Full prompt: persona, the last `history_limit` turns, then the message.
    pub fn build_prompt(
        &self,
        message: &str,
        history: &[Turn],
        context: Option<&SessionContext>,
        history_limit: usize,
    ) -> String {
        let persona = self.build_persona(context);

        if history.is_empty() {
            return format!("{persona}\n\n---\n\nUser: {message}");
        }

        let start = history.len().saturating_sub(history_limit);
        let rendered: Vec<String> = history[start..].iter().map(Turn::render).collect();

        format!(
            "{persona}\n\n## Conversation History\n{}\n\n---\n\nUser: {message}",
            rendered.join("\n")
        )
    }

    /// Submit the prompt with streaming requested.
    pub async fn generate(
        &self,
        target: &GenerationTarget,
        message: &str,
        history: &[Turn],
        context: Option<&SessionContext>,
    ) -> Result<HandlerStream, GenerationError> {
        let prompt = self.build_prompt(message, history, context, target.history_limit);

        debug!(
            handler = %self.info.id,
            model = %target.model,
            prompt_chars = prompt.len(),
            history_turns = history.len().min(target.history_limit),
            "Starting generation"
        );

        let request = ProviderRequest {
            model: target.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: target.temperature,
            max_tokens: target.max_tokens,
            stream: true,
            stop: Vec::new(),
        };

        let rx = target.provider.stream(request).await?;
        Ok(HandlerStream::new(rx))
    }
}

/// Ordered text fragments from one generation.
///
/// Empty fragments are skipped. Dropping the stream drops the provider's
/// receiver, which ends the provider's connection task.
pub struct HandlerStream {
    rx: ChunkReceiver,
    finished: bool,
}

impl HandlerStream {
    pub fn new(rx: ChunkReceiver) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// The next non-empty fragment, `None` at the end of generation.
    pub async fn next(&mut self) -> Option<Result<String, GenerationError>> {
        while !self.finished {
            match self.rx.recv().await {
                None => self.finished = true,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(chunk)) => {
                    self.finished = chunk.done;
                    if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                        return Some(Ok(text));
                    }
                }
            }
        }
        None
    }

    /// Drain the stream into one string.
    pub async fn collect_text(mut self) -> Result<String, GenerationError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::KeywordTiers;
    use crate::test_helpers::{Script, ScriptedProvider};
    use forkreach_core::context::BrandVoice;
    use forkreach_core::provider::StreamChunk;

    fn handler() -> Handler {
        Handler::new(
            HandlerInfo {
                id: "test".into(),
                name: "Test".into(),
                icon: "star".into(),
                description: "A test handler".into(),
                capabilities: vec![],
            },
            "You are a test persona.",
            KeywordTiers::new(0.2).tier(0.9, &["test"]),
        )
    }

    fn target(provider: Arc<ScriptedProvider>) -> GenerationTarget {
        GenerationTarget {
            provider,
            model: "mock-model".into(),
            temperature: 0.7,
            max_tokens: None,
            history_limit: 5,
        }
    }

    #[test]
    fn persona_without_context_is_template() {
        assert_eq!(handler().build_persona(None), "You are a test persona.");
    }

    #[test]
    fn persona_with_context_appends_block() {
        let ctx = SessionContext::new("DevTodo").with_brand_voice(BrandVoice::Professional);
        assert_eq!(
            handler().build_persona(Some(&ctx)),
            "You are a test persona.\n\n## Product Context\nProduct Name: DevTodo\nBrand Voice: professional"
        );
    }

    #[test]
    fn prompt_without_history() {
        let prompt = handler().build_prompt("Write a tweet", &[], None, 5);
        assert_eq!(prompt, "You are a test persona.\n\n---\n\nUser: Write a tweet");
    }

    #[test]
    fn prompt_keeps_last_five_turns_in_order() {
        let history: Vec<Turn> = (1..=8)
            .map(|i| {
                if i % 2 == 1 {
                    Turn::user(format!("u{i}"))
                } else {
                    Turn::assistant(format!("a{i}"))
                }
            })
            .collect();

        let prompt = handler().build_prompt("next", &history, None, 5);
        let expected_history = "User: u5\nAssistant: a6\nUser: u7\nAssistant: a8";
        assert!(prompt.contains(&format!(
            "## Conversation History\nAssistant: a4\n{expected_history}\n\n---\n\nUser: next"
        )));
        assert!(!prompt.contains("u3"));
        assert!(!prompt.contains("u1"));
    }

    #[test]
    fn score_delegates_to_scorer() {
        let h = handler();
        assert_eq!(h.score("a TEST message"), 0.9);
        assert_eq!(h.score("nothing"), 0.2);
    }

    #[tokio::test]
    async fn generate_streams_non_empty_fragments() {
        let provider = Arc::new(ScriptedProvider::new(Script::chunks(["Hello", "", " world"])));
        let stream = handler()
            .generate(&target(provider.clone()), "hi", &[], None)
            .await
            .unwrap();

        assert_eq!(stream.collect_text().await.unwrap(), "Hello world");
        assert_eq!(provider.calls(), 1);

        let request = provider.last_request().unwrap();
        assert!(request.stream);
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0].content.ends_with("User: hi"));
    }

    #[tokio::test]
    async fn generate_returns_typed_error() {
        let provider = Arc::new(ScriptedProvider::new(Script::Fail(
            ProviderError::AuthenticationFailed("bad key".into()),
        )));
        let err = handler()
            .generate(&target(provider), "hi", &[], None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GenerationError::Provider(ProviderError::AuthenticationFailed(_))));
        assert_eq!(err.to_string(), "Authentication failed: bad key");
    }

    #[tokio::test]
    async fn stream_stops_at_done_chunk() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(StreamChunk::text("a"))).await.unwrap();
        tx.send(Ok(StreamChunk::finished(None))).await.unwrap();
        tx.send(Ok(StreamChunk::text("ignored"))).await.unwrap();

        let mut stream = HandlerStream::new(rx);
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn mid_stream_error_is_surfaced_once() {
        let provider = Arc::new(ScriptedProvider::new(Script::ChunksThenError(
            vec!["partial".into()],
            ProviderError::StreamInterrupted("reset".into()),
        )));
        let mut stream = handler()
            .generate(&target(provider), "hi", &[], None)
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
