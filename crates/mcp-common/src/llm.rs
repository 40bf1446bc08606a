//! OpenAI-compatible chat completions client used to generate answers.
//!
//! Transient failures (timeouts, connect errors, 429, 5xx) are retried with
//! capped exponential backoff plus jitter.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use reqwest::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct LlmClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5_000),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

impl LlmClientConfig {
    /// Optional:
    /// - `LLM_BASE_URL` (default: "http://localhost:8001/v1")
    /// - `LLM_API_KEY`
    /// - `LLM_TIMEOUT_SECS` (default: 60)
    /// - `LLM_MAX_RETRIES` (default: 3)
    /// - `LLM_RETRY_INITIAL_MS` / `LLM_RETRY_MAX_MS` (default: 200 / 5000)
    /// - `LLM_MAX_ERROR_BODY_BYTES` (default: 8192)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("LLM_BASE_URL").unwrap_or(defaults.base_url);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: env_parse::<u64>("LLM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: env_parse("LLM_MAX_RETRIES").unwrap_or(defaults.max_retries),
            initial_backoff: env_parse::<u64>("LLM_RETRY_INITIAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            max_backoff: env_parse::<u64>("LLM_RETRY_MAX_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            max_error_body_bytes: env_parse("LLM_MAX_ERROR_BODY_BYTES")
                .unwrap_or(defaults.max_error_body_bytes),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

#[derive(Debug, thiserror::Error)]
pub enum LlmClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("response contained no completion text")]
    EmptyCompletion,

    #[error("streaming response ended before [DONE]")]
    StreamEnded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            stream: None,
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Result<Self, LlmClientError> {
        let http = reqwest::Client::builder()
            .user_agent("codebase-views")
            .build()?;
        Ok(Self { config, http })
    }

    /// Run a completion and return the assistant text.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, LlmClientError> {
        let url = self.completions_url();
        let response: ChatResponse = self
            .with_retry(|| async {
                let resp = self.post(&url, request).send().await?;
                if !resp.status().is_success() {
                    return Err(self.upstream_error(resp).await);
                }
                Ok::<_, LlmClientError>(resp.json::<ChatResponse>().await?)
            })
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %request.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmClientError::EmptyCompletion)
    }

    /// Run a streamed completion, handing each content delta to `on_delta`
    /// as it arrives. Returns the concatenated text.
    ///
    /// Retries only cover establishing the stream: once the first delta has
    /// been delivered, failures are returned as-is.
    pub async fn complete_streaming<F>(
        &self,
        request: &ChatRequest,
        mut on_delta: F,
    ) -> Result<String, LlmClientError>
    where
        F: FnMut(&str),
    {
        let url = self.completions_url();
        let mut streamed = request.clone();
        streamed.stream = Some(true);

        let resp = self
            .with_retry(|| async {
                let resp = self.post(&url, &streamed).send().await?;
                if !resp.status().is_success() {
                    return Err(self.upstream_error(resp).await);
                }
                Ok::<_, LlmClientError>(resp)
            })
            .await?;

        let mut events = SseBuffer::default();
        let mut text = String::new();
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for data in events.push(&chunk) {
                if data == "[DONE]" {
                    return Ok(text);
                }
                let Ok(parsed) = serde_json::from_str::<StreamChunk>(&data) else {
                    debug!(data = %data, "skipping unparsable stream event");
                    continue;
                };
                if let Some(piece) = parsed
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.as_deref())
                {
                    on_delta(piece);
                    text.push_str(piece);
                }
            }
        }
        Err(LlmClientError::StreamEnded)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn post(&self, url: &str, request: &ChatRequest) -> reqwest::RequestBuilder {
        let builder = self.http.post(url).timeout(self.config.timeout).json(request);
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn upstream_error(&self, resp: reqwest::Response) -> LlmClientError {
        let status = resp.status();
        let body = read_limited_text(resp, self.config.max_error_body_bytes).await;
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(parsed) => LlmClientError::Upstream {
                status,
                message: parsed
                    .error
                    .message
                    .unwrap_or_else(|| "unknown upstream error".to_string()),
            },
            Err(_) => LlmClientError::UpstreamBody { status, body },
        }
    }

    async fn with_retry<T, Fut, F>(&self, mut attempt_fn: F) -> Result<T, LlmClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match attempt_fn().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt > self.config.max_retries || !is_retryable(&e) => return Err(e),
                Err(e) => {
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "llm request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Splits a server-sent event byte stream into `data:` payloads.
///
/// Bytes of a UTF-8 sequence cut by a chunk boundary are held back until the
/// rest arrives. CRLF line endings are treated as LF.
#[derive(Default)]
struct SseBuffer {
    carry: Vec<u8>,
    pending: String,
}

impl SseBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);
        let complete = match std::str::from_utf8(&self.carry) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.carry.len(),
        };
        let decoded: Vec<u8> = self.carry.drain(..complete).collect();
        self.pending.push_str(&String::from_utf8_lossy(&decoded));
        if self.pending.contains("\r\n") {
            self.pending = self.pending.replace("\r\n", "\n");
        }

        let mut payloads = Vec::new();
        while let Some(idx) = self.pending.find("\n\n") {
            let event: String = self.pending.drain(..idx + 2).collect();
            payloads.extend(
                event
                    .lines()
                    .filter_map(|line| line.trim().strip_prefix("data:"))
                    .map(|data| data.trim().to_string())
                    .filter(|data| !data.is_empty()),
            );
        }
        payloads
    }
}

fn is_retryable(err: &LlmClientError) -> bool {
    match err {
        LlmClientError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        LlmClientError::Upstream { status, .. } | LlmClientError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        LlmClientError::InvalidJson(_)
        | LlmClientError::EmptyCompletion
        | LlmClientError::StreamEnded => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let capped_ms = initial.as_millis().saturating_mul(mult).min(max.as_millis()) as u64;
    let jitter_cap = (capped_ms / 4).max(1);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(capped_ms.saturating_add(nanos % (jitter_cap + 1)))
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(bytes) => String::from_utf8_lossy(&bytes[..bytes.len().min(max_bytes)]).to_string(),
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorObject,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_buffer_joins_split_events() {
        let mut sse = SseBuffer::default();
        assert!(sse.push(b"data: {\"a\":").is_empty());
        let payloads = sse.push(b"1}\n\ndata: [DONE]\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn sse_buffer_ignores_non_data_lines() {
        let mut sse = SseBuffer::default();
        let payloads = sse.push(b": keep-alive\nevent: message\ndata: x\n\n");
        assert_eq!(payloads, vec!["x".to_string()]);
    }

    #[test]
    fn sse_buffer_keeps_multibyte_char_split_across_chunks() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"é\"}}]}\n\n".as_bytes();
        let split = event.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut sse = SseBuffer::default();
        assert!(sse.push(&event[..split]).is_empty());
        let payloads = sse.push(&event[split..]);
        assert_eq!(payloads.len(), 1);

        let chunk: StreamChunk = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("é"));
    }

    #[test]
    fn sse_buffer_accepts_crlf_separators() {
        let mut sse = SseBuffer::default();
        let payloads = sse.push(b"data: {\"a\":1}\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn sse_buffer_joins_crlf_split_between_chunks() {
        let mut sse = SseBuffer::default();
        assert!(sse.push(b"data: x\r\n\r").is_empty());
        assert_eq!(sse.push(b"\n"), vec!["x".to_string()]);
    }

    #[test]
    fn stream_chunk_decodes_delta() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"hi"}}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("hi"));
    }

    #[test]
    fn backoff_is_capped() {
        let delay = backoff_delay(Duration::from_millis(200), Duration::from_millis(1_000), 10);
        assert!(delay >= Duration::from_millis(1_000));
        assert!(delay <= Duration::from_millis(1_250));

        let first = backoff_delay(Duration::from_millis(200), Duration::from_millis(1_000), 0);
        assert!(first >= Duration::from_millis(200) && first <= Duration::from_millis(250));
    }

    #[test]
    fn upstream_status_retry_policy() {
        let retryable = LlmClientError::UpstreamBody {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        let fatal = LlmClientError::Upstream {
            status: StatusCode::BAD_REQUEST,
            message: "bad".to_string(),
        };
        assert!(is_retryable(&retryable));
        assert!(!is_retryable(&fatal));
        assert!(!is_retryable(&LlmClientError::StreamEnded));
    }
}
