//! HTTP server in front of the chat engine.
//!
//! - [`chat_api`]: Request/response types, route handlers and the router
//! - [`streaming`]: Raw chunked streaming of engine fragments
//! - [`error`]: HTTP error mapping

pub mod chat_api;
pub mod error;
pub mod streaming;
