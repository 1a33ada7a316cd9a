use std::io;
use std::process::ExitStatus;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failure to turn a payload into a [`Batch`](crate::pipeline::Batch).
#[derive(Debug, thiserror::Error)]
#[error("malformed batch: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to get filename for {url}")]
    MissingFileName { url: String },

    #[error("failed to write downloaded file: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to run store command: {0}")]
    Io(#[from] io::Error),

    #[error("{status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("store command printed no identifier")]
    EmptyIdentifier,
}

/// Why a job was dropped.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to download file: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to add file to store: {0}")]
    Store(#[from] StoreError),
}

/// Request-level failures surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication failed")]
    Unauthorized,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no file url in request")]
    EmptyBatch,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Decode(_) => (StatusCode::BAD_REQUEST, "MALFORMED_BATCH"),
            ApiError::EmptyBatch => (StatusCode::BAD_REQUEST, "EMPTY_BATCH"),
        };

        let body = json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

/// Failures of the command-line producer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to read jobs file: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid api token header: {0}")]
    Header(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    #[error("unknown message")]
    UnexpectedMessage,

    #[error("bad reply: {0}")]
    Reply(#[from] serde_json::Error),

    #[error("connection closed after {received} of {expected} replies")]
    Closed { received: usize, expected: usize },

    #[error("timed out after {received} of {expected} replies")]
    Timeout { received: usize, expected: usize },
}
