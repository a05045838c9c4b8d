use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::identity::IdentityError;
use common::storage::StorageError;
use serde::Serialize;

use crate::avatar::{AvatarError, UpstreamError};

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `NOT_FOUND`, `LINK_INVALID`, `PAYLOAD_TOO_LARGE`,
    /// `CANCELLED`, `UPSTREAM_ERROR`, `IDENTITY_UNAVAILABLE`, `INTERNAL_ERROR`.
    #[schema(example = "NOT_FOUND")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "No avatar for user 'alice'")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    NotFound(String),
    /// Signed blob link failed verification or has expired.
    LinkInvalid,
    PayloadTooLarge {
        limit: u64,
    },
    Cancelled,
    /// A storage or metadata call failed. Detail is logged, not returned.
    Upstream(String),
    IdentityUnavailable(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::LinkInvalid => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "LINK_INVALID",
                    message: "Link signature is invalid or has expired".into(),
                },
            ),
            AppError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    code: "PAYLOAD_TOO_LARGE",
                    message: format!("File exceeds the {limit} byte limit"),
                },
            ),
            AppError::Cancelled => (
                StatusCode::REQUEST_TIMEOUT,
                ErrorBody {
                    code: "CANCELLED",
                    message: "Request was cancelled before it completed".into(),
                },
            ),
            AppError::Upstream(detail) => {
                tracing::error!("Upstream error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "UPSTREAM_ERROR",
                        message: "A storage backend failed".into(),
                    },
                )
            }
            AppError::IdentityUnavailable(detail) => {
                tracing::error!("Identity service error: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "IDENTITY_UNAVAILABLE",
                        message: "Unable to verify credentials right now".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<AvatarError> for AppError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::NotFound { owner } => {
                AppError::NotFound(format!("No avatar for user '{owner}'"))
            }
            AvatarError::InvalidInput(msg) => AppError::Validation(msg),
            AvatarError::Cancelled => AppError::Cancelled,
            AvatarError::UpstreamWriteFailed {
                source: UpstreamError::Storage(StorageError::SizeLimitExceeded { limit, .. }),
                ..
            } => AppError::PayloadTooLarge { limit },
            AvatarError::UpstreamWriteFailed {
                source: UpstreamError::Storage(StorageError::SizeMismatch { declared, actual }),
                ..
            } => AppError::Validation(format!(
                "Upload ended after {actual} of {declared} bytes"
            )),
            other => AppError::Upstream(describe_upstream(&other)),
        }
    }
}

fn describe_upstream(err: &AvatarError) -> String {
    match err {
        AvatarError::UpstreamWriteFailed { residual, .. } if !residual.is_empty() => {
            let left = residual
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{err} (left behind: {left})")
        }
        _ => err.to_string(),
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        if err.is_rejection() {
            tracing::debug!("Token rejected: {err}");
            AppError::TokenInvalid
        } else {
            AppError::IdentityUnavailable(err.to_string())
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidSignature | StorageError::LinkExpired => AppError::LinkInvalid,
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
                AppError::NotFound("Blob not found".into())
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}
