use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Rate limit exceeded, retry in {retry_after_secs} seconds")]
    QuotaExceeded { retry_after_secs: u64 },

    #[error("Rate limiter unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Origin data source error: {0}")]
    Origin(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GateError>;

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        GateError::StoreUnavailable(err.to_string())
    }
}

impl GateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Auth(AuthError::ServerMisconfigured) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Auth(_) => StatusCode::UNAUTHORIZED,
            GateError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GateError::Origin(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            GateError::Auth(AuthError::ServerMisconfigured) => "server_misconfigured",
            GateError::Auth(_) => "unauthorized",
            GateError::QuotaExceeded { .. } => "rate_limit_exceeded",
            GateError::StoreUnavailable(_) => "service_unavailable",
            GateError::Configuration(_) => "configuration_error",
            GateError::InvalidRequest(_) => "bad_request",
            GateError::Origin(_) | GateError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
            retry_after: None,
        }
    }

    pub fn from_gate_error(err: &GateError) -> Self {
        let mut body = Self::new(err.kind(), &err.to_string(), err.status_code().as_u16());
        if let GateError::QuotaExceeded { retry_after_secs } = err {
            body.retry_after = Some(*retry_after_secs);
        }
        body
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from_gate_error(&self);
        let mut response = (status, Json(body)).into_response();

        if let GateError::QuotaExceeded { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_unauthorized() {
        for err in [
            AuthError::MalformedHeader,
            AuthError::InvalidSignature,
            AuthError::InvalidOrExpiredToken,
            AuthError::MissingIdentityClaim,
        ] {
            assert_eq!(GateError::from(err).status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_misconfigured_verifier_is_server_error() {
        let err = GateError::from(AuthError::ServerMisconfigured);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_quota_exceeded_sets_retry_after() {
        let response = GateError::QuotaExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_store_error_is_service_unavailable() {
        let err = GateError::from(StoreError::Timeout);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let body = ErrorResponse::from_gate_error(&err);
        assert_eq!(body.code, 503);
        assert_eq!(body.error, "service_unavailable");
        assert!(body.retry_after.is_none());
    }
}
