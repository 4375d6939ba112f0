//! Runtime configuration for chat-service.
//!
//! Everything is taken from the command line once at start-up and never
//! mutated afterwards. The model-related arguments form the [`ModelConfig`]
//! that the single inference engine is built from.

use std::fmt;

use clap::{Parser, ValueEnum};
use serde::Serialize;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-service", about = "HTTP chat service over an LLM inference engine")]
pub struct Cli {
    /// Path to pretrained model or model identifier from huggingface.co/models.
    #[arg(long = "model_name_or_path")]
    pub model_name_or_path: String,

    /// Inference backend to use.
    #[arg(long = "infer_backend", value_enum, default_value_t = InferBackend::HuggingFace)]
    pub infer_backend: InferBackend,

    /// Template to use for the model (e.g. chatglm3, llama2, vicuna).
    #[arg(long)]
    pub template: String,

    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind.
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Base URL of the inference engine (defaults depend on the backend).
    #[arg(long = "engine_url")]
    pub engine_url: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long = "log_json")]
    pub log_json: bool,
}

/// Inference backend selector.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InferBackend {
    /// Hugging Face text-generation-inference.
    #[value(name = "huggingface")]
    HuggingFace,
    /// vLLM OpenAI-compatible server.
    #[value(name = "vllm")]
    Vllm,
}

impl InferBackend {
    /// Base URL the backend's own server listens on by default.
    pub fn default_url(&self) -> &'static str {
        match self {
            InferBackend::HuggingFace => "http://127.0.0.1:3000",
            InferBackend::Vllm => "http://127.0.0.1:8000",
        }
    }
}

impl fmt::Display for InferBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferBackend::HuggingFace => write!(f, "huggingface"),
            InferBackend::Vllm => write!(f, "vllm"),
        }
    }
}

/// Top-level configuration. Serialized once into the start-up log.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Model configuration.
    pub model: ModelConfig,

    /// Engine connection settings.
    pub engine: EngineConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,
}

impl ServerConfig {
    /// Listen address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Model selection. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    /// Model path or hub identifier.
    pub model_name_or_path: String,

    /// Backend the model runs on.
    pub infer_backend: InferBackend,

    /// Prompt template identifier.
    pub template: String,
}

/// Where the inference engine is reached.
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    /// Base URL, without the `/v1/...` path.
    pub base_url: String,
}

impl Config {
    /// Assemble the configuration from parsed command-line arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        let model = ModelConfig {
            model_name_or_path: cli.model_name_or_path.clone(),
            infer_backend: cli.infer_backend,
            template: cli.template.clone(),
        };
        let base_url = cli
            .engine_url
            .clone()
            .unwrap_or_else(|| model.infer_backend.default_url().to_string());

        Self {
            server: ServerConfig {
                host: cli.host.clone(),
                port: cli.port,
            },
            model,
            engine: EngineConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
        }
    }
}
