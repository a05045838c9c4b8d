use std::collections::BTreeSet;
use std::time::Duration;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use reqwest::Url;
use tracing::{info, instrument, warn};

use crate::avatar::{OpContext, Upload};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::avatar::{
    AvatarUrls, BatchRequest, GuidResponse, UploadFromUrlRequest, UrlResponse, UsernameQuery,
};
use crate::state::AppState;
use crate::utils::filename::{filename_from_url, sanitize_upload_name};
use crate::utils::spool::SpooledUpload;

/// Multipart field carrying the image.
const AVATAR_FIELD: &str = "avatar";

fn request_context(state: &AppState) -> OpContext {
    OpContext::new().with_timeout(Duration::from_secs(state.config.server.request_timeout_secs))
}

/// Map multipart failures, surfacing body-limit hits as 413.
fn multipart_error(limit: u64) -> impl Fn(MultipartError) -> AppError {
    move |err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::Validation(format!("Multipart error: {}", err.body_text()))
        }
    }
}

#[utoipa::path(
    post,
    path = "/avatar",
    tag = "Avatars",
    operation_id = "uploadAvatar",
    summary = "Upload the caller's avatar",
    description = "Stores the `avatar` multipart file and points the caller's username at it. \
        Re-uploading replaces the mapping; the previous image is kept unless retirement is enabled.",
    request_body(content_type = "multipart/form-data", description = "Image in the `avatar` field"),
    responses(
        (status = 200, description = "Avatar stored", body = GuidResponse),
        (status = 400, description = "Missing or malformed file (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(owner = %auth_user.username))]
pub async fn upload_avatar(
    auth_user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GuidResponse>, AppError> {
    let spool = SpooledUpload::new()?;
    store_multipart(&state, &auth_user.username, multipart, &spool).await
}

async fn store_multipart(
    state: &AppState,
    owner: &str,
    mut multipart: Multipart,
    spool: &SpooledUpload,
) -> Result<Json<GuidResponse>, AppError> {
    let max_size = state.config.server.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error(max_size))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let filename = sanitize_upload_name(field.file_name());
        let content_type = field.content_type().map(str::to_string);
        let size = spool
            .fill(field, max_size, multipart_error(max_size))
            .await?;

        let upload = Upload {
            payload: spool.open().await?,
            filename,
            content_type,
            size,
        };
        let id = state
            .avatars
            .add(&request_context(state), owner, upload)
            .await?;
        return Ok(Json(GuidResponse { guid: id.to_string() }));
    }

    Err(AppError::Validation(format!(
        "Missing '{AVATAR_FIELD}' file field"
    )))
}

#[utoipa::path(
    get,
    path = "/avatar",
    tag = "Avatars",
    operation_id = "getAvatar",
    summary = "Get a user's avatar URL",
    params(UsernameQuery),
    responses(
        (status = 200, description = "Time-limited avatar URL", body = UrlResponse),
        (status = 400, description = "Missing username (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User has no avatar (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_avatar(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UrlResponse>, AppError> {
    let username = query
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation("Query parameter 'username' is required".into()))?;

    let url = state
        .avatars
        .get_url(&request_context(&state), username)
        .await?;
    Ok(Json(UrlResponse { url }))
}

#[utoipa::path(
    get,
    path = "/avatar/me",
    tag = "Avatars",
    operation_id = "getMyAvatar",
    summary = "Get the caller's avatar URL",
    responses(
        (status = 200, description = "Time-limited avatar URL", body = UrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Caller has no avatar (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner = %auth_user.username))]
pub async fn get_my_avatar(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UrlResponse>, AppError> {
    let url = state
        .avatars
        .get_url(&request_context(&state), &auth_user.username)
        .await?;
    Ok(Json(UrlResponse { url }))
}

#[utoipa::path(
    delete,
    path = "/avatar/me",
    tag = "Avatars",
    operation_id = "deleteMyAvatar",
    summary = "Delete the caller's avatar",
    responses(
        (status = 204, description = "Avatar deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Caller has no avatar (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Image could not be removed (UPSTREAM_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner = %auth_user.username))]
pub async fn delete_my_avatar(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .avatars
        .delete(&request_context(&state), &auth_user.username)
        .await?;
    if !outcome.residual.is_empty() {
        warn!(avatar_id = %outcome.id, residual = ?outcome.residual, "Avatar deleted with leftovers");
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/avatars",
    tag = "Avatars",
    operation_id = "getAvatars",
    summary = "Look up avatar URLs for many users",
    description = "Returns only the users that have an avatar. Users whose mapping could not be \
        read or whose URL could not be generated are omitted.",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Username to URL map", body = AvatarUrls),
        (status = 400, description = "Empty or oversized list (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized when public lookup is disabled", body = ErrorBody),
    ),
    security((), ("jwt" = [])),
)]
#[instrument(skip(state, headers, body), fields(count = body.usernames.len()))]
pub async fn get_avatars(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(body): AppJson<BatchRequest>,
) -> Result<Json<AvatarUrls>, AppError> {
    if !state.config.avatar.public_batch_lookup {
        AuthUser::authenticate(&state, &headers).await?;
    }

    let owners: BTreeSet<String> = body
        .usernames
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    if owners.is_empty() {
        return Err(AppError::Validation("usernames must not be empty".into()));
    }
    let max = state.config.avatar.max_batch_size;
    if owners.len() > max {
        return Err(AppError::Validation(format!(
            "At most {max} usernames per request"
        )));
    }

    let urls = state
        .avatars
        .get_urls(&request_context(&state), &owners)
        .await?;
    Ok(Json(AvatarUrls(urls.into_iter().collect())))
}

#[utoipa::path(
    post,
    path = "/avatar/url",
    tag = "Avatars",
    operation_id = "uploadAvatarFromUrl",
    summary = "Set the caller's avatar from a remote image",
    description = "Downloads the image at `url` and stores it exactly like a multipart upload.",
    request_body = UploadFromUrlRequest,
    responses(
        (status = 200, description = "Avatar stored", body = GuidResponse),
        (status = 400, description = "Bad URL or download failed (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "Remote file too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 502, description = "Storage failure (UPSTREAM_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, body), fields(owner = %auth_user.username))]
pub async fn upload_avatar_from_url(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<UploadFromUrlRequest>,
) -> Result<Json<GuidResponse>, AppError> {
    let url = Url::parse(body.url.trim())
        .map_err(|e| AppError::Validation(format!("Invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "URL scheme must be http or https".into(),
        ));
    }

    let response = state.http.get(url.clone()).send().await.map_err(|e| {
        warn!(error = %e, "Remote image download failed");
        AppError::Validation("Failed to download image".into())
    })?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(AppError::Validation(format!(
            "Remote server answered {}",
            response.status().as_u16()
        )));
    }

    let max_size = state.config.server.max_upload_bytes;
    if response.content_length().is_some_and(|len| len > max_size) {
        return Err(AppError::PayloadTooLarge { limit: max_size });
    }
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = filename_from_url(&url);

    let spool = SpooledUpload::new()?;
    let size = spool
        .fill(response.bytes_stream(), max_size, |e| {
            AppError::Validation(format!("Image download interrupted: {e}"))
        })
        .await?;
    let upload = Upload {
        payload: spool.open().await?,
        filename,
        content_type,
        size,
    };
    let id = state
        .avatars
        .add(&request_context(&state), &auth_user.username, upload)
        .await?;
    info!(avatar_id = %id, size, "Avatar stored from remote URL");
    Ok(Json(GuidResponse { guid: id.to_string() }))
}
