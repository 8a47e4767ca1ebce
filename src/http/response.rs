//! Error responses.
//!
//! Every failure leaves the control surface as `{"error": "<message>"}`:
//!
//! | Error | Status |
//! |---|---|
//! | InvalidInput, Protocol | 400 |
//! | FetchTimeout | 408 |
//! | Superseded | 409 |
//! | Upstream, Transport | 502 |
//! | Configuration | 500 |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl BridgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::InvalidInput(_) | BridgeError::Protocol(_) => StatusCode::BAD_REQUEST,
            BridgeError::FetchTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            BridgeError::Superseded => StatusCode::CONFLICT,
            BridgeError::Upstream { .. } | BridgeError::Transport { .. } => StatusCode::BAD_GATEWAY,
            BridgeError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(BridgeError::Superseded.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            BridgeError::FetchTimeout(Duration::from_secs(1)).status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            BridgeError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BridgeError::Upstream { status: 403, message: "no".into() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = BridgeError::InvalidInput("referenceNumber cannot be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "referenceNumber cannot be empty");
    }
}
