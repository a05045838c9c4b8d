/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "health",
    responses((status = 200, description = "Service is running", body = String)),
)]
pub async fn health() -> &'static str {
    "OK"
}
