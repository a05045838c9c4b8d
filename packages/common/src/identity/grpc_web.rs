use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use tracing::{debug, warn};

use super::error::IdentityError;
use super::traits::{Identity, IdentityVerifier};
use super::wire::{self, FLAG_DATA, UserResponse};

const GRPC_WEB_PROTO: &str = "application/grpc-web+proto";
const GRPC_WEB_TEXT: &str = "application/grpc-web-text";
const VALIDATE_TOKEN_PATH: &str = "/user.UserService/ValidateToken";

/// Verifies tokens against the user directory's `ValidateToken` RPC over
/// gRPC-Web.
pub struct GrpcWebVerifier {
    endpoint: String,
    client: reqwest::Client,
}

impl GrpcWebVerifier {
    /// `address` without a scheme is treated as `https://`.
    pub fn new(address: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(address, client))
    }

    pub fn with_client(address: &str, client: reqwest::Client) -> Self {
        let base = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", address.trim_end_matches('/'))
        };
        Self {
            endpoint: format!("{base}{VALIDATE_TOKEN_PATH}"),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Non-zero `grpc-status` in `headers`, with its message.
fn header_status(headers: &HeaderMap) -> Option<(u32, String)> {
    let status: u32 = headers.get("grpc-status")?.to_str().ok()?.trim().parse().ok()?;
    if status == 0 {
        return None;
    }
    let message = headers
        .get("grpc-message")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Some((status, message))
}

/// Decode a gRPC-Web response body into the caller identity.
fn decode_response(body: &[u8], text_encoded: bool) -> Result<Identity, IdentityError> {
    let raw;
    let body = if text_encoded {
        let trimmed: Vec<u8> = body
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        raw = STANDARD
            .decode(trimmed)
            .map_err(|e| IdentityError::Protocol(format!("invalid base64 body: {e}")))?;
        raw.as_slice()
    } else {
        body
    };

    let frames = wire::decode_frames(body).map_err(|e| IdentityError::Protocol(e.0))?;

    for frame in frames.iter().filter(|f| f.is_trailer()) {
        let (status, message) = wire::parse_trailer(&frame.payload);
        match status {
            Some(0) | None => {}
            Some(status) => {
                return Err(IdentityError::Rejected(format!(
                    "grpc-status {status}: {}",
                    message.unwrap_or_default()
                )));
            }
        }
    }

    let data = frames
        .iter()
        .find(|f| f.flag == FLAG_DATA)
        .ok_or_else(|| IdentityError::Protocol("no data frame in response".into()))?;
    let user = UserResponse::decode(&data.payload).map_err(|e| IdentityError::Protocol(e.0))?;

    if user.username.is_empty() {
        return Err(IdentityError::Rejected("directory returned no username".into()));
    }

    Ok(Identity {
        id: user.id,
        username: user.username,
        email: user.email,
    })
}

#[async_trait]
impl IdentityVerifier for GrpcWebVerifier {
    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError> {
        let body = wire::encode_frame(FLAG_DATA, &wire::encode_token_request(token));

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, GRPC_WEB_PROTO)
            .header(ACCEPT, GRPC_WEB_PROTO)
            .header("x-grpc-web", "1")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Identity service request failed");
                e
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(IdentityError::Rejected(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Identity service returned an error status");
            return Err(IdentityError::Status(status.as_u16()));
        }

        if let Some((code, message)) = header_status(response.headers()) {
            return Err(IdentityError::Rejected(format!("grpc-status {code}: {message}")));
        }

        let text_encoded = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains(GRPC_WEB_TEXT));
        let bytes = response.bytes().await?;

        let identity = decode_response(&bytes, text_encoded)?;
        debug!(username = %identity.username, "Token validated");
        Ok(identity)
    }
}
