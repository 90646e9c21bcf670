//! Google Gemini native provider implementation.
//!
//! Uses the Generative Language API directly:
//! - `x-goog-api-key` header authentication
//! - System messages become the top-level `systemInstruction`
//! - Assistant turns are sent with the `model` role
//! - Streaming via `:streamGenerateContent?alt=sse`, one JSON response per
//!   `data:` line; the stream ends when the connection closes

use async_trait::async_trait;
use futures::StreamExt;
use forkreach_core::error::ProviderError;
use forkreach_core::message::{Message, Role};
use forkreach_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::transport::{self, SseBuffer};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: transport::build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.client = transport::build_client(timeout_secs);
        self
    }

    fn build_body(request: &ProviderRequest) -> GenerateRequest {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(api_role(m.role).into()),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.join("\n\n")),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                stop_sequences: request.stop.clone(),
            },
        }
    }

    async fn post(
        &self,
        url: &str,
        body: &GenerateRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        transport::check_status("gemini", response).await
    }
}

fn api_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        debug!(provider = "gemini", model = %request.model, "Sending completion request");

        let response = self.post(&url, &body).await?;
        let api_resp: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        if let Some(reason) = api_resp.block_reason() {
            return Err(ProviderError::Blocked(reason));
        }

        Ok(ProviderResponse {
            message: Message::assistant(api_resp.text()),
            usage: api_resp.usage(),
            model: api_resp.model_version.unwrap_or(request.model),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let body = Self::build_body(&request);

        debug!(provider = "gemini", model = %request.model, "Sending streaming request");

        let response = self.post(&url, &body).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut sse = SseBuffer::default();
            let mut usage = None;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for data in sse.push(&bytes) {
                    match forward(&tx, &data, &mut usage).await {
                        Forward::Continue => {}
                        Forward::Stop => return,
                    }
                }
            }

            if let Some(data) = sse.finish() {
                if let Forward::Stop = forward(&tx, &data, &mut usage).await {
                    return;
                }
            }

            let _ = tx.send(Ok(StreamChunk::finished(usage))).await;
        });

        Ok(rx)
    }
}

enum Forward {
    Continue,
    Stop,
}

/// Parse one SSE payload and forward its text. `Stop` means the receiver
/// is gone or the stream failed; error objects and unparseable payloads
/// are failures.
async fn forward(
    tx: &tokio::sync::mpsc::Sender<Result<StreamChunk, ProviderError>>,
    data: &str,
    usage: &mut Option<Usage>,
) -> Forward {
    let mut parsed = match serde_json::from_str::<GenerateResponse>(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, data = %data, "Malformed Gemini SSE payload");
            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(format!(
                    "malformed stream payload: {e}"
                ))))
                .await;
            return Forward::Stop;
        }
    };

    if let Some(error) = parsed.error.take() {
        let _ = tx.send(Err(error.into())).await;
        return Forward::Stop;
    }

    if let Some(reason) = parsed.block_reason() {
        let _ = tx.send(Err(ProviderError::Blocked(reason))).await;
        return Forward::Stop;
    }

    if let Some(u) = parsed.usage() {
        *usage = Some(u);
    }

    let text = parsed.text();
    if !text.is_empty() && tx.send(Ok(StreamChunk::text(text))).await.is_err() {
        // Receiver dropped; stop reading from the connection
        return Forward::Stop;
    }

    Forward::Continue
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn block_reason(&self) -> Option<String> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
    }

    fn usage(&self) -> Option<Usage> {
        self.usage_metadata.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Error object the API sends in place of a response, also mid-stream.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

impl From<ApiErrorBody> for ProviderError {
    fn from(body: ApiErrorBody) -> Self {
        ProviderError::ApiError {
            status_code: body.code.unwrap_or(500),
            message: body.message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
