//! Streaming chat-completions client for the Groq API.
//!
//! Groq exposes an OpenAI-compatible `/chat/completions` endpoint. With `stream: true` the body
//! is a Server-Sent Events stream: each `data:` line carries a JSON chunk whose
//! `choices[0].delta.content` is the next fragment, and `data: [DONE]` marks completion.

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::generation::{CompletionBackend, CompletionRequest, EventStream, StreamEvent};
use crate::{ReportError, ReportResult};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DONE_MARKER: &str = "[DONE]";

/// Longest error body kept from a failed response.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
    stop: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

/// HTTP client for Groq streamed completions.
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GroqClient {
    /// Create a client from the generation settings.
    ///
    /// The HTTP client only bounds connection setup. `Generator` applies the generation timeout
    /// around each whole attempt, so a server that accepts the connection and never answers still
    /// ends in `GenerationTimeout`.
    pub fn new(config: &GenerationConfig) -> ReportResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                ReportError::InvalidConfig(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait::async_trait]
impl CompletionBackend for GroqClient {
    async fn open_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<EventStream, GenerationError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            stream: true,
            stop: None,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        Ok(sse_events(response.bytes_stream()))
    }
}

fn status_error(status: reqwest::StatusCode, body: String) -> GenerationError {
    let code = status.as_u16();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        GenerationError::Authentication { status: code }
    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        GenerationError::Unavailable(format!("status {code}"))
    } else {
        GenerationError::Upstream {
            status: code,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }
}

/// Incremental Server-Sent Events decoder.
///
/// Bytes are buffered until a full line is available, so chunks may split lines (and UTF-8
/// sequences) anywhere.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, GenerationError>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent, GenerationError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest).into_iter().collect()
    }
}

fn decode_line(raw: &[u8]) -> Option<Result<StreamEvent, GenerationError>> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim_end_matches(&['\n', '\r'][..]),
        Err(e) => return Some(Err(GenerationError::Protocol(e.to_string()))),
    };

    // Blank lines separate events; `:` lines are comments; other fields (event:, id:) are unused.
    let payload = line.strip_prefix("data:")?.trim();
    if payload == DONE_MARKER {
        return Some(Ok(StreamEvent::Done));
    }

    let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => return Some(Err(GenerationError::Protocol(e.to_string()))),
    };
    if let Some(error) = chunk.error {
        return Some(Err(GenerationError::Protocol(error.message)));
    }

    let content: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();
    if content.is_empty() {
        None
    } else {
        Some(Ok(StreamEvent::Fragment(content)))
    }
}

struct SseState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamEvent, GenerationError>>,
    finished: bool,
}

/// Turn a raw byte stream into completion events.
pub fn sse_events<S, B, E>(body: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .pending
                        .push_back(Err(GenerationError::Unavailable(e.to_string())));
                }
                None => {
                    state.finished = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
    .boxed()
}
