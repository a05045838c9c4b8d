use axum::{Router, routing::get};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::handlers;
use crate::state::AppState;

/// Routes mounted under `/api`.
pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::avatar::upload_avatar,
            handlers::avatar::get_avatar
        ))
        .routes(routes!(
            handlers::avatar::get_my_avatar,
            handlers::avatar::delete_my_avatar
        ))
        .routes(routes!(handlers::avatar::upload_avatar_from_url))
        .routes(routes!(handlers::avatar::get_avatars))
}

/// Top-level routes outside `/api`.
pub fn root_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::health::health))
}

/// Signed links issued by the filesystem blob store.
pub fn blob_routes() -> Router<AppState> {
    Router::new().route("/blobs/{*key}", get(handlers::blob::serve_blob))
}
