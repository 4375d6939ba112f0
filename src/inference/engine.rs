//! Inference engine contract.
//!
//! The HTTP layer never knows which backend generates text. It holds one
//! `Arc<dyn ChatEngine>` for the whole process and calls:
//! 1. [`ChatEngine::complete`] for a finished set of candidates
//! 2. [`ChatEngine::stream`] for a lazy sequence of text fragments

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// One chat message as received (`role`, `content`, and any extra keys).
pub type Message = HashMap<String, String>;

/// A generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,

    /// System prompt.
    pub system: Option<String>,

    /// Tool specification, passed through untouched.
    pub tools: Option<String>,

    /// Image reference (path or URL).
    pub image: Option<String>,

    /// Video reference (path or URL).
    pub video: Option<String>,

    /// Maximum tokens to generate.
    pub max_new_tokens: u32,

    /// Top-p (nucleus) sampling threshold.
    pub top_p: f64,

    /// Temperature for sampling (0.0 = greedy).
    pub temperature: f64,
}

/// One finished completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub response_text: String,
    pub finish_reason: String,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("engine returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid tools specification: {0}")]
    InvalidTools(String),

    #[error("malformed engine reply: {0}")]
    Decode(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("{0}")]
    Other(String),
}

/// Text fragments in generation order. Finite and consumed once.
pub type FragmentStream = BoxStream<'static, Result<String, EngineError>>;

/// Chat generation capability shared by every request.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Short name used in logs and the health report.
    fn name(&self) -> &str;

    /// Run generation to completion. An empty vector means no usable output.
    async fn complete(&self, request: &GenerationRequest) -> Result<Vec<Candidate>, EngineError>;

    /// Start generation and hand back fragments as they are produced.
    ///
    /// Errors returned here happen before any fragment exists; errors inside
    /// the stream happen after streaming has begun.
    async fn stream(&self, request: &GenerationRequest) -> Result<FragmentStream, EngineError>;
}
