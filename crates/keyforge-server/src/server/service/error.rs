//! HTTP error responses.
//!
//! [`ApiError`] wraps a [`keyforge::Error`] and picks the status code:
//!
//! - `Timeout`, `Closed`: `503 Service Unavailable`. The pool is starved or
//!   shutting down, and the client may retry elsewhere or later.
//! - anything else: `500 Internal Server Error`.
//!
//! The body is the error's display text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keyforge::Error;

#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Timeout | Error::Closed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self.0, "key request failed");
        } else {
            tracing::warn!(error = %self.0, "key request unavailable");
        }
        (status, self.0.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_outcomes_map_to_unavailable() {
        assert_eq!(
            ApiError(Error::Timeout).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(Error::Closed).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn other_failures_map_to_internal_error() {
        for err in [
            Error::Cancelled,
            Error::EncodingDomain { counter: u64::MAX },
            Error::InvalidConfig {
                reason: "bad".to_string(),
            },
            Error::reservation(std::io::Error::other("disk full")),
        ] {
            assert_eq!(
                ApiError(err).status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[tokio::test]
    async fn body_carries_the_error_message() {
        let response = ApiError(Error::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"timed out waiting for a key");
    }
}
