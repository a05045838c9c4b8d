use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use common::storage::BlobStore;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::error::AppError;
use crate::models::avatar::BlobLinkQuery;
use crate::state::AppState;

/// Serve a blob from the local store behind a signed, expiring link.
#[instrument(skip(state, query))]
pub async fn serve_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<BlobLinkQuery>,
) -> Result<Response, AppError> {
    let store = state
        .local_blobs
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Blob not found".into()))?;

    let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
        return Err(AppError::LinkInvalid);
    };
    store.verify_url(&key, expires, signature)?;

    let info = store
        .head(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("Blob not found".into()))?;
    let reader = store.get_stream(&key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let max_age = (expires - Utc::now().timestamp()).max(0);
    Ok((
        [
            (header::CONTENT_TYPE, info.content_type),
            (header::CONTENT_LENGTH, info.size.to_string()),
            (header::CACHE_CONTROL, format!("private, max-age={max_age}")),
        ],
        body,
    )
        .into_response())
}
