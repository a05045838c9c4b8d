use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::state::AppState;

/// Caller verified by the identity service from the `Authorization` header.
///
/// Add this as a handler parameter to require authentication. Only
/// `username` is used as the avatar owner.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl AuthUser {
    /// Verify the request's credential against the configured identity service.
    pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Self, AppError> {
        let token = credential(headers)?;
        let identity = state.identity.verify_token(&token).await?;
        Ok(AuthUser {
            id: identity.id,
            username: identity.username,
            email: identity.email,
        })
    }
}

/// The credential carried by `headers`.
///
/// An absent or blank `Authorization` header is `TokenMissing`. A header that
/// holds nothing once quotes and the prefix are removed is `TokenInvalid`.
fn credential(headers: &HeaderMap) -> Result<String, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or(AppError::TokenMissing)?;
    bearer_token(header).ok_or(AppError::TokenInvalid)
}

/// Extract the credential from an `Authorization` value.
///
/// Clients are inconsistent here: some quote the token, some omit the
/// `Bearer ` prefix. Quotes are removed anywhere in the value.
fn bearer_token(header: &str) -> Option<String> {
    let unquoted = header.replace('"', "");
    let value = unquoted.trim_start();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        AuthUser::authenticate(state, &parts.headers).await
    }
}
