//! Raw chunked streaming of engine fragments.
//!
//! Fragments are written to the response body as they arrive, with no
//! framing and no end marker. If the engine fails after streaming started,
//! the body ends with an error, which aborts the chunked transfer so the
//! client cannot mistake a truncated reply for a complete one.

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::inference::engine::{EngineError, FragmentStream};

/// Wrap a fragment stream in a `text/plain` chunked response.
pub fn fragments_to_response(fragments: FragmentStream, request_id: Uuid) -> Response {
    let body = async_stream::stream! {
        let mut fragments = fragments;
        let mut count = 0usize;

        while let Some(item) = fragments.next().await {
            match item {
                Ok(text) => {
                    count += 1;
                    yield Ok::<Bytes, EngineError>(Bytes::from(text));
                }
                Err(e) => {
                    error!(%request_id, fragments = count, error = %e, "Stream aborted by engine failure");
                    yield Err(e);
                    return;
                }
            }
        }

        debug!(%request_id, fragments = count, "Stream complete");
    };

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}
