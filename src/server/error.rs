//! Errors surfaced at the HTTP boundary.
//!
//! Every failure becomes a status code plus a `{"detail": "..."}` body.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::inference::engine::EngineError;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request body could not be accepted; the engine was not called.
    #[error("{detail}")]
    Validation { status: StatusCode, detail: String },

    /// The engine finished without a single candidate.
    #[error("No response from model")]
    NoResponse,

    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl ServiceError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        ServiceError::Validation {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation { status, .. } => *status,
            ServiceError::NoResponse | ServiceError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}
