//! Error types for the live reload notifier.

use std::path::PathBuf;

use axum::http::{HeaderValue, StatusCode, Version, header};
use axum::response::{IntoResponse, Response};

/// Error raised while fingerprinting a watched tree.
///
/// The watcher logs these and keeps polling; they never stop it.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Directory traversal failed (e.g., the root was removed).
    #[error("Failed to walk {}: {source}", path.display())]
    Walk {
        /// Root of the tree being walked.
        path: PathBuf,
        /// Underlying walk error.
        source: ignore::Error,
    },

    /// File metadata could not be read.
    #[error("Failed to read metadata for {}: {source}", path.display())]
    Metadata {
        /// File whose metadata was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The blocking fingerprint task panicked or was cancelled.
    #[error("Fingerprint task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Error returned by the event stream handler.
///
/// Each variant maps to the status code the client sees.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Only `GET` opens a stream.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The connection cannot deliver a response body incrementally.
    #[error("Streaming unsupported over {0:?}")]
    StreamingUnsupported(Version),

    /// The reloader was closed before the client subscribed.
    #[error("Live reload has shut down")]
    Gone,
}

impl StreamError {
    /// HTTP status code for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::StreamingUnsupported(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gone => StatusCode::GONE,
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        if matches!(self, Self::MethodNotAllowed) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}
