//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use chat_service::config::{InferBackend, ModelConfig};
use chat_service::inference::engine::{
    Candidate, ChatEngine, EngineError, FragmentStream, GenerationRequest,
};
use chat_service::server::chat_api::{build_router, AppState};

/// What `complete` does.
pub enum Reply {
    /// Answer with the content of the last message.
    Echo,
    Candidates(Vec<Candidate>),
    Fail(String),
}

/// What `stream` does.
pub enum StreamReply {
    Fragments(Vec<String>),
    FailSetup(String),
    FailAfter(Vec<String>, String),
    /// Fragments are fed by the test through a channel.
    Channel(Mutex<Option<mpsc::Receiver<Result<String, EngineError>>>>),
}

/// Engine whose behaviour is fixed up front; records every call.
pub struct ScriptedEngine {
    reply: Reply,
    stream_reply: StreamReply,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedEngine {
    pub fn new(reply: Reply, stream_reply: StreamReply) -> Self {
        Self {
            reply,
            stream_reply,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn replying(reply: Reply) -> Self {
        Self::new(reply, StreamReply::Fragments(vec![]))
    }

    pub fn streaming(stream_reply: StreamReply) -> Self {
        Self::new(Reply::Echo, stream_reply)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn record(&self, request: &GenerationRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
    }
}

#[async_trait]
impl ChatEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<Vec<Candidate>, EngineError> {
        self.record(request);
        // Give other requests a chance to interleave.
        tokio::task::yield_now().await;

        match &self.reply {
            Reply::Echo => {
                let text = request
                    .messages
                    .last()
                    .and_then(|m| m.get("content"))
                    .cloned()
                    .unwrap_or_default();
                Ok(vec![Candidate {
                    response_text: text,
                    finish_reason: "stop".to_string(),
                }])
            }
            Reply::Candidates(candidates) => Ok(candidates.clone()),
            Reply::Fail(message) => Err(EngineError::Other(message.clone())),
        }
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<FragmentStream, EngineError> {
        self.record(request);

        match &self.stream_reply {
            StreamReply::Fragments(fragments) => {
                let items: Vec<Result<String, EngineError>> =
                    fragments.iter().cloned().map(Ok).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            StreamReply::FailSetup(message) => Err(EngineError::Other(message.clone())),
            StreamReply::FailAfter(fragments, message) => {
                let mut items: Vec<Result<String, EngineError>> =
                    fragments.iter().cloned().map(Ok).collect();
                items.push(Err(EngineError::Generation(message.clone())));
                Ok(Box::pin(stream::iter(items)))
            }
            StreamReply::Channel(rx) => {
                let rx = rx
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| EngineError::Other("stream already consumed".to_string()))?;
                Ok(Box::pin(ReceiverStream::new(rx)))
            }
        }
    }
}

pub fn model_config() -> ModelConfig {
    ModelConfig {
        model_name_or_path: "meta-llama/Llama-2-7b-chat-hf".to_string(),
        infer_backend: InferBackend::HuggingFace,
        template: "llama2".to_string(),
    }
}

pub fn router(engine: Arc<ScriptedEngine>) -> axum::Router {
    build_router(Arc::new(AppState::new(engine, model_config())))
}

/// Serve `app` on an ephemeral port, returning its base URL.
pub async fn spawn_app(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
