//! Chat-completion client for an OpenAI-compatible backend.
//!
//! Supports a blocking call ([`GenerationClient::complete`]) and a
//! streaming call ([`GenerationClient::stream`]) that yields text fragments
//! as server-sent events arrive. Fragments are sanitized (null characters
//! stripped) before they are yielded, and concatenating the full stream
//! equals the complete response text.
//!
//! Dropping the stream early drops the underlying HTTP response, which
//! releases the connection; no task keeps pulling from the transport.
//!
//! Failures surface as [`AdvisorError::GenerationService`], or
//! [`AdvisorError::ContentPolicy`] when the backend refuses the request.
//! This client never retries.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::AdvisorError;

/// Seam between the orchestrator and the hosted model, so responses can be
/// scripted in tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Block until the full response is available.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Produce response fragments as they arrive. Finite, non-restartable.
    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Client for a hosted chat-completion API.
pub struct GenerationClient {
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl GenerationClient {
    /// Create a client from configuration.
    ///
    /// Fails with [`AdvisorError::Configuration`] when the API key
    /// environment variable is not set.
    pub fn new(config: &GenerationConfig) -> Result<Self, AdvisorError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AdvisorError::Configuration(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let timeout = std::time::Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdvisorError::Configuration(format!("http client: {}", e)))?;
        // A whole-request timeout would cut long completions off mid-stream,
        // so the streaming client only bounds connection establishment.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| AdvisorError::Configuration(format!("http client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            client,
            stream_client,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            stream,
        }
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let client = if stream { &self.stream_client } else { &self.client };
        let resp = client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, stream))
            .send()
            .await
            .map_err(|e| AdvisorError::GenerationService(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body_text = resp.text().await.unwrap_or_default();
        if status.as_u16() == 403 {
            return Err(AdvisorError::ContentPolicy(body_text).into());
        }
        Err(AdvisorError::GenerationService(format!(
            "chat API error {}: {}",
            status, body_text
        ))
        .into())
    }
}

#[async_trait]
impl CompletionClient for GenerationClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let resp = self.send(prompt, false).await?;
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AdvisorError::GenerationService(format!("invalid response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                AdvisorError::GenerationService("response missing choices".to_string())
            })?;

        Ok(sanitize(&content))
    }

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let resp = self.send(prompt, true).await?;

        let state = StreamState {
            inner: resp
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()))
                .boxed(),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }

                match state.inner.next().await {
                    None => {
                        state.done = true;
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        state.pending.push_back(Err(AdvisorError::GenerationService(
                            e.to_string(),
                        )
                        .into()));
                    }
                    Some(Ok(bytes)) => {
                        let chunk = String::from_utf8_lossy(&bytes).into_owned();
                        for data in state.parser.push(&chunk) {
                            if data == "[DONE]" {
                                state.done = true;
                                break;
                            }
                            match parse_stream_data(&data) {
                                Ok(Some(fragment)) => state.pending.push_back(Ok(fragment)),
                                Ok(None) => {}
                                Err(e) => {
                                    state.done = true;
                                    state.pending.push_back(Err(e));
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

struct StreamState {
    inner: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    parser: SseParser,
    pending: VecDeque<Result<String>>,
    done: bool,
}

/// Incremental server-sent-events parser.
///
/// Feeds on raw transport chunks, which may split lines arbitrarily, and
/// yields the payload of each complete `data:` line. Comments, event names,
/// and blank keep-alive lines are ignored.
pub struct SseParser {
    buf: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim().to_string());
            }
        }
        payloads
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one `data:` payload into a sanitized fragment.
///
/// Returns `Ok(None)` for chunks without text content. A `content_filter`
/// finish reason becomes [`AdvisorError::ContentPolicy`]. Payloads that are
/// not valid chunk JSON are skipped; gateways interleave housekeeping
/// messages on the same channel.
fn parse_stream_data(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream payload");
            return Ok(None);
        }
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(
            AdvisorError::ContentPolicy("response stopped by content filter".to_string()).into(),
        );
    }

    Ok(choice
        .delta
        .content
        .map(|c| sanitize(&c))
        .filter(|c| !c.is_empty()))
}

/// Strip null characters from a fragment.
pub fn sanitize(text: &str) -> String {
    text.replace('\u{0000}', "")
}
