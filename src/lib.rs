//! chat-service: HTTP chat façade over an LLM inference engine.
//!
//! Accepts chat requests on `/chat` (one finished answer) and `/stream_chat`
//! (raw text fragments as they are generated) and forwards them to a single
//! [`inference::engine::ChatEngine`] built once at start-up.

pub mod config;
pub mod inference;
pub mod server;
