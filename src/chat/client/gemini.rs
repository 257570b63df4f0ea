use std::collections::VecDeque;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use serde::{Deserialize, Serialize};

use crate::{
    chat::context::message::{ChatMessage, MessageRole},
    config::structure::LLMConfig,
};

use super::{StreamingChatModel, TokenStream, sse::SseDecoder};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Streams completions from Gemini's `streamGenerateContent` endpoint.
pub struct GeminiChat {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    generation: Option<GenerationConfig>,
}

impl GeminiChat {
    pub fn new(config: &LLMConfig) -> Self {
        let generation = GenerationConfig {
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_tokens,
        };

        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            generation: (!generation.is_empty()).then_some(generation),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl StreamingChatModel for GeminiChat {
    async fn stream(&self, messages: Vec<ChatMessage>) -> anyhow::Result<TokenStream> {
        let request = GenerateContentRequest {
            contents: messages.into_iter().map(Content::from).collect(),
            generation_config: self.generation.clone(),
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("gemini returned {status}: {body}");
        }

        Ok(token_stream(response.bytes_stream().boxed()))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<anyhow::Result<String>>,
    done: bool,
}

impl StreamState {
    fn queue(&mut self, data: String) {
        if let Some(item) = parse_chunk(&data) {
            self.pending.push_back(item);
        }
    }
}

/// Turns the raw SSE body into text deltas. The stream ends after the first
/// error it yields.
fn token_stream(bytes: BoxStream<'static, reqwest::Result<Bytes>>) -> TokenStream {
    let state = StreamState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.done = true;
                }
                return Some((item, state));
            }

            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for data in state.decoder.push(&chunk) {
                        state.queue(data);
                    }
                }
                Some(Err(why)) => {
                    state.done = true;
                    state.pending.push_back(Err(why.into()));
                }
                None => {
                    state.done = true;
                    if let Some(data) = state.decoder.finish() {
                        state.queue(data);
                    }
                }
            }
        }
    })
    .boxed()
}

/// Text carried by one streamed response chunk. `None` for chunks without
/// text (safety ratings, usage metadata).
fn parse_chunk(data: &str) -> Option<anyhow::Result<String>> {
    let chunk: GenerateContentResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(why) => return Some(Err(anyhow!("malformed gemini chunk: {why}"))),
    };

    if let Some(error) = chunk.error {
        return Some(Err(anyhow!("gemini error {}: {}", error.code, error.message)));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    (!text.is_empty()).then_some(Ok(text))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.max_output_tokens.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Gemini only knows `user` and `model`.
impl From<ChatMessage> for Content {
    fn from(message: ChatMessage) -> Self {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
        };

        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: Some(message.content),
            }],
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}
