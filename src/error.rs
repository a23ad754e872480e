//! Typed errors, storage-failure classification, and HTTP mapping.

use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Startup-time configuration errors. Raised while resolving model
/// declarations and composing route specs, never at request time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate model name: {0}")]
    DuplicateModel(String),
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("permissions: {0}")]
    Permissions(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("not acceptable: {0}")]
    NotAcceptable(String),
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("expectation failed: {0}")]
    ExpectationFailed(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Map a storage-layer failure onto the HTTP-facing taxonomy. Total: every
/// `StoreError` classifies to exactly one kind; unrecognized kinds land on
/// `Internal`. Nested driver causes classify by vendor code class (22 data
/// exception, 23 integrity constraint, 42 syntax/access), with detail and
/// hint text appended to the message when the driver supplies it.
pub fn classify(err: StoreError) -> AppError {
    match err {
        StoreError::Backend {
            code,
            message,
            detail,
            hint,
        } => {
            let mut message = message;
            if let Some(detail) = detail {
                message = format!("{message}: {detail}");
            }
            if let Some(hint) = hint {
                message = format!("{message} Hint: {hint}");
            }
            if code.starts_with("22") || code.starts_with("23") {
                AppError::NotAcceptable(message)
            } else if code.starts_with("42") {
                AppError::Unprocessable(message)
            } else {
                // fault is upstream in the storage engine, not this server
                AppError::BadGateway(message)
            }
        }
        StoreError::Validation(m) => AppError::Unprocessable(m),
        StoreError::Timeout(m) => AppError::GatewayTimeout(m),
        StoreError::HostUnreachable(m) => AppError::ServiceUnavailable(m),
        StoreError::UniqueViolation(m) => AppError::Conflict(m),
        StoreError::ForeignKeyViolation(m) => AppError::ExpectationFailed(m),
        StoreError::ExclusionViolation(m) => AppError::ExpectationFailed(m),
        StoreError::Connection(m) => AppError::BadGateway(m),
        StoreError::Other(m) => AppError::Internal(m),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        classify(err)
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExpectationFailed(_) => StatusCode::EXPECTATION_FAILED,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation_error",
            AppError::NotImplemented(_) => "not_implemented",
            AppError::NotAcceptable(_) => "not_acceptable",
            AppError::Unprocessable(_) => "unprocessable",
            AppError::Conflict(_) => "conflict",
            AppError::ExpectationFailed(_) => "expectation_failed",
            AppError::BadGateway(_) => "bad_gateway",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::GatewayTimeout(_) => "gateway_timeout",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
