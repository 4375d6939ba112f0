//! Engine backed by a separately running inference server.
//!
//! Both supported backends (text-generation-inference and vLLM) expose the
//! OpenAI-compatible `/v1/chat/completions` route, which does the template
//! rendering, tokenization and batching. This module only builds the request
//! body and decodes the reply.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ModelConfig;
use crate::inference::engine::{Candidate, ChatEngine, EngineError, FragmentStream, GenerationRequest};
use crate::inference::sse::SseDecoder;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Chat engine talking to a TGI or vLLM server over HTTP.
pub struct RemoteEngine {
    client: reqwest::Client,
    model: ModelConfig,
    endpoint: String,
    name: String,
}

impl RemoteEngine {
    /// Create an engine for `model`, served at `base_url`.
    pub fn new(model: ModelConfig, base_url: &str) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().build()?;
        let endpoint = format!("{}{CHAT_COMPLETIONS_PATH}", base_url.trim_end_matches('/'));
        let name = model.infer_backend.to_string();

        Ok(Self {
            client,
            model,
            endpoint,
            name,
        })
    }

    /// Full URL generation requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the upstream request body.
    pub fn build_body(&self, request: &GenerationRequest, stream: bool) -> Result<Value, EngineError> {
        let mut body = json!({
            "model": self.model.model_name_or_path,
            "messages": build_messages(request),
            "max_tokens": request.max_new_tokens,
            "top_p": request.top_p,
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(tools) = request.tools.as_deref().filter(|t| !t.trim().is_empty()) {
            body["tools"] = parse_tools(tools)?;
        }

        Ok(body)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, EngineError> {
        let response = self.client.post(&self.endpoint).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&text),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatEngine for RemoteEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<Vec<Candidate>, EngineError> {
        let body = self.build_body(request, false)?;
        debug!(
            endpoint = %self.endpoint,
            messages = request.messages.len(),
            "Dispatching chat completion"
        );

        let text = self.post(&body).await?.text().await?;
        decode_completion(&text)
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<FragmentStream, EngineError> {
        let body = self.build_body(request, true)?;
        debug!(
            endpoint = %self.endpoint,
            messages = request.messages.len(),
            "Dispatching streaming chat completion"
        );

        let response = self.post(&body).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            // A `finish_reason` or `[DONE]` must arrive before the bytes end.
            let mut finished = false;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(EngineError::from(e));
                        return;
                    }
                };

                for data in decoder.push(&chunk) {
                    match decode_event(&data) {
                        Ok(StreamEvent::Delta { text, finish_reason }) => {
                            finished |= finish_reason.is_some();
                            if let Some(text) = text {
                                yield Ok(text);
                            }
                        }
                        Ok(StreamEvent::Done) => return,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if !finished {
                yield Err(EngineError::Generation(
                    "engine stream ended before completion".to_string(),
                ));
            }
        };

        Ok(Box::pin(stream))
    }
}

// ─── Request body ──────────────────────────────────────────────────────────

fn build_messages(request: &GenerationRequest) -> Vec<Value> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(request.messages.iter().map(|m| json!(m)));

    let media: Vec<Value> = [
        request
            .image
            .as_ref()
            .map(|url| json!({ "type": "image_url", "image_url": { "url": url } })),
        request
            .video
            .as_ref()
            .map(|url| json!({ "type": "video_url", "video_url": { "url": url } })),
    ]
    .into_iter()
    .flatten()
    .collect();

    if media.is_empty() {
        return messages;
    }

    // Media rides on the most recent user turn.
    let idx = match messages.iter().rposition(|m| m["role"] == "user") {
        Some(i) => i,
        None => {
            messages.push(json!({ "role": "user", "content": "" }));
            messages.len() - 1
        }
    };

    let target = &mut messages[idx];
    let text = target["content"].as_str().unwrap_or_default().to_string();
    let mut parts = Vec::with_capacity(media.len() + 1);
    if !text.is_empty() {
        parts.push(json!({ "type": "text", "text": text }));
    }
    parts.extend(media);
    target["content"] = Value::Array(parts);

    messages
}

fn parse_tools(raw: &str) -> Result<Value, EngineError> {
    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| EngineError::InvalidTools(e.to_string()))?;

    let Value::Array(entries) = parsed else {
        return Err(EngineError::InvalidTools("expected a JSON array".to_string()));
    };

    Ok(Value::Array(
        entries
            .into_iter()
            .map(|entry| {
                if entry.get("type").is_some() {
                    entry
                } else {
                    json!({ "type": "function", "function": entry })
                }
            })
            .collect(),
    ))
}

// ─── Reply decoding ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

fn decode_completion(text: &str) -> Result<Vec<Candidate>, EngineError> {
    let reply: ChatCompletion =
        serde_json::from_str(text).map_err(|e| EngineError::Decode(e.to_string()))?;

    // Some servers answer 200 with an error body instead of choices.
    if let Some(error) = reply.error {
        return Err(EngineError::Generation(error_text(&error)));
    }

    Ok(reply
        .choices
        .into_iter()
        .map(|choice| Candidate {
            response_text: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        })
        .collect())
}

#[derive(Debug, PartialEq)]
enum StreamEvent {
    /// Content (if any) and the finish reason (if this is the last delta).
    Delta {
        text: Option<String>,
        finish_reason: Option<String>,
    },
    Done,
}

fn decode_event(data: &str) -> Result<StreamEvent, EngineError> {
    if data.trim() == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| EngineError::Decode(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(EngineError::Generation(error_text(&error)));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(StreamEvent::Delta {
            text: None,
            finish_reason: None,
        });
    };

    Ok(StreamEvent::Delta {
        text: choice.delta.content.filter(|t| !t.is_empty()),
        finish_reason: choice.finish_reason,
    })
}

/// TGI reports `{"error": "..."}`, vLLM `{"error": {"message": "..."}}` or
/// `{"message": "..."}`.
fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("error").or_else(|| value.get("message")) {
            Some(inner) => error_text(inner),
            None => body.trim().to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}
