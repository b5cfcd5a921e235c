//! Mapping of core failures onto HTTP responses.

use api_shared::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use vitals_core::{GenerationError, RenderError, ReportError};

/// Error returned by every API handler. The body is always `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    /// The text-generation service answered with something unusable.
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    GatewayTimeout(String),
    #[error("Internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Upstream failures are logged when answered. `Internal` was already logged with its
    /// details on conversion.
    fn logged_on_response(&self) -> bool {
        self.status().is_server_error() && !matches!(self, Self::Internal)
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        let message = err.to_string();
        match err {
            ReportError::NotFound(_) => Self::NotFound(message),
            ReportError::MissingField(_) | ReportError::MalformedTimestamp(_) => {
                Self::BadRequest(message)
            }
            ReportError::MalformedUpstream { .. } => Self::BadGateway(message),
            ReportError::Generation(generation) => match generation {
                GenerationError::GenerationTimeout(_) => Self::GatewayTimeout(message),
                GenerationError::Unavailable(_) | GenerationError::Authentication { .. } => {
                    Self::ServiceUnavailable(message)
                }
                GenerationError::Upstream { .. }
                | GenerationError::Protocol(_)
                | GenerationError::IncompleteStream
                | GenerationError::EmptyGeneration
                | GenerationError::OutputLimitExceeded { .. } => Self::BadGateway(message),
            },
            ReportError::Render(RenderError::Timeout(_)) => Self::GatewayTimeout(message),
            ReportError::Render(_) => Self::ServiceUnavailable(message),
            other => {
                tracing::error!("unexpected report error: {:?}", other);
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.logged_on_response() {
            tracing::error!("request failed with {}: {}", status, self);
        }
        let body = ErrorRes {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
