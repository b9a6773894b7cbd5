// SPDX-License-Identifier: MIT
//! Domain error taxonomy shared by services, storage, and REST handlers.
//!
//! Every failure surfaced to a caller carries one of these stable kinds:
//!
//! - [`Error::NotFound`] — referenced user/goal/scenario is absent (404).
//! - [`Error::InvalidArgument`] — caller-supplied value rejected (400).
//! - [`Error::Configuration`] — malformed startup configuration. Fatal at
//!   boot, never produced while serving requests.
//! - [`Error::Persistence`] — underlying SQLite failure (500). Logged, not
//!   retried here; the client may retry the whole request.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            // Configuration never escapes startup; treat a leak as a server bug.
            Error::Configuration(_) | Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(err = %self, "request failed");
            // Don't leak SQL details to clients.
            return (status, Json(json!({ "error": "internal error" }))).into_response();
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
