//! LLM inference engine.
//!
//! - [`engine`]: The `ChatEngine` capability the HTTP layer depends on
//! - [`remote`]: Engine backed by an OpenAI-compatible TGI or vLLM server
//! - [`sse`]: Incremental server-sent-events decoding for streamed replies

pub mod engine;
pub mod remote;
pub mod sse;
