//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions` with SSE streaming.

use async_trait::async_trait;
use futures::StreamExt;
use forkreach_core::error::ProviderError;
use forkreach_core::message::{Message, Role};
use forkreach_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::transport::{self, SseBuffer};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// An OpenAI-compatible chat-completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: transport::build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// OpenAI's hosted API.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.client = transport::build_client(timeout_secs);
        self
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }
        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        transport::check_status(&self.name, response).await
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post(&Self::build_body(&request, false), false).await?;
        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage: api_response.usage.map(Into::into),
            model: api_response.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&Self::build_body(&request, true), true).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(pump(response.bytes_stream(), tx));

        Ok(rx)
    }
}

/// Drive one SSE response body into `tx`. A body that ends before `[DONE]`
/// is an interrupted stream.
async fn pump<S, B, E>(
    body: S,
    tx: tokio::sync::mpsc::Sender<Result<StreamChunk, ProviderError>>,
)
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut sse = SseBuffer::default();
    let mut usage = None;

    while let Some(chunk_result) = body.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };

        for data in sse.push(bytes.as_ref()) {
            if let Forward::Stop = forward(&tx, &data, &mut usage).await {
                return;
            }
        }
    }

    if let Some(data) = sse.finish() {
        if let Forward::Stop = forward(&tx, &data, &mut usage).await {
            return;
        }
    }

    let _ = tx
        .send(Err(ProviderError::StreamInterrupted(
            "connection closed before [DONE]".into(),
        )))
        .await;
}

enum Forward {
    Continue,
    Stop,
}

/// Handle one SSE payload. `Stop` means the stream ended (successfully on
/// `[DONE]`, or with an error) or the receiver is gone.
async fn forward(
    tx: &tokio::sync::mpsc::Sender<Result<StreamChunk, ProviderError>>,
    data: &str,
    usage: &mut Option<Usage>,
) -> Forward {
    if data == "[DONE]" {
        let _ = tx.send(Ok(StreamChunk::finished(usage.take()))).await;
        return Forward::Stop;
    }

    let parsed = match serde_json::from_str::<StreamResponse>(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, data = %data, "Malformed SSE chunk");
            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(format!(
                    "malformed stream payload: {e}"
                ))))
                .await;
            return Forward::Stop;
        }
    };

    if let Some(error) = parsed.error {
        let _ = tx
            .send(Err(ProviderError::ApiError {
                status_code: 500,
                message: error.message,
            }))
            .await;
        return Forward::Stop;
    }

    if let Some(u) = parsed.usage {
        *usage = Some(u.into());
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty());

    if let Some(content) = content {
        if tx.send(Ok(StreamChunk::text(content))).await.is_err() {
            return Forward::Stop;
        }
    }

    Forward::Continue
}

// --- API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

/// In-stream error object sent by some compatible servers.
#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn message_conversion() {
        let msgs = vec![Message::system("persona"), Message::user("Hello")];
        let api = OpenAiCompatProvider::to_api_messages(&msgs);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[1].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn stream_body_requests_usage() {
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            max_tokens: None,
            stream: true,
            stop: vec!["END".into()],
        };
        let body = OpenAiCompatProvider::build_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["stop"][0], "END");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let resp: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(resp.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn parse_stream_usage() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":20,"total_tokens":30}}"#;
        let resp: StreamResponse = serde_json::from_str(data).unwrap();
        let usage: Usage = resp.usage.unwrap().into();
        assert_eq!(usage.total_tokens, 30);
    }

    #[test]
    fn parse_empty_delta() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":null}]}"#;
        let resp: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(resp.choices[0].delta.content.is_none());
    }

    #[tokio::test]
    async fn forward_ends_on_done_with_usage() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut usage = None;

        let text = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert!(matches!(forward(&tx, text, &mut usage).await, Forward::Continue));
        let counts = r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#;
        assert!(matches!(forward(&tx, counts, &mut usage).await, Forward::Continue));
        assert!(matches!(forward(&tx, "[DONE]", &mut usage).await, Forward::Stop));

        drop(tx);
        assert_eq!(rx.recv().await.unwrap().unwrap().content.as_deref(), Some("Hi"));
        let last = rx.recv().await.unwrap().unwrap();
        assert!(last.done);
        assert_eq!(last.usage.unwrap().total_tokens, 3);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn forward_reports_malformed_payload() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut usage = None;

        assert!(matches!(forward(&tx, "{not json", &mut usage).await, Forward::Stop));
        drop(tx);
        assert!(matches!(
            rx.recv().await,
            Some(Err(ProviderError::StreamInterrupted(_)))
        ));
    }

    #[tokio::test]
    async fn forward_reports_in_stream_error_object() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut usage = None;

        let data = r#"{"error":{"message":"upstream overloaded","type":"server_error"}}"#;
        assert!(matches!(forward(&tx, data, &mut usage).await, Forward::Stop));
        drop(tx);
        match rx.recv().await {
            Some(Err(ProviderError::ApiError { message, .. })) => {
                assert_eq!(message, "upstream overloaded")
            }
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    fn body(parts: &[&str]) -> impl futures::Stream<Item = Result<Vec<u8>, std::io::Error>> {
        let parts: Vec<_> = parts
            .iter()
            .map(|p| Ok::<_, std::io::Error>(p.as_bytes().to_vec()))
            .collect();
        futures::stream::iter(parts)
    }

    #[tokio::test]
    async fn pump_finishes_on_done() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        pump(
            body(&["data: {\"choices\":[{\"delta\":{\"content\":\"Ship\"}}]}\n\n", "data: [DONE]\n\n"]),
            tx,
        )
        .await;

        assert_eq!(rx.recv().await.unwrap().unwrap().content.as_deref(), Some("Ship"));
        assert!(rx.recv().await.unwrap().unwrap().done);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn pump_reports_close_before_done() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        pump(
            body(&["data: {\"choices\":[{\"delta\":{\"content\":\"Ship\"}}]}\n\n"]),
            tx,
        )
        .await;

        assert_eq!(rx.recv().await.unwrap().unwrap().content.as_deref(), Some("Ship"));
        match rx.recv().await {
            Some(Err(ProviderError::StreamInterrupted(reason))) => {
                assert!(reason.contains("[DONE]"))
            }
            other => panic!("expected an interrupted stream, got {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }
}
