//! Health check endpoints. These sit outside versioning and authorization.

use crate::AppResources;
use axum::{Extension, http::StatusCode};

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

#[tracing::instrument(skip_all)]
#[utoipa::path(
    method(get, head),
    path = "/status",
    tag = MISC_TAG,
    operation_id = "Status",
    summary = "Service readiness",
    description = "Returns `ok` once the database answers a ping. Supports GET and HEAD.",
    responses(
        (status = 200, description = "Service is ready", body = str, content_type = "text/plain", example = "ok"),
        (status = 503, description = "Database unavailable", body = str, content_type = "text/plain")
    )
)]
pub async fn status(
    Extension(resources): Extension<AppResources>,
) -> (StatusCode, &'static str) {
    match resources.db.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(
                name = "api.status.db_ping_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = ?e,
                message = "Database ping failed"
            );
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

#[tracing::instrument()]
#[utoipa::path(
    get,
    path = "/liveness",
    tag = MISC_TAG,
    operation_id = "Liveness",
    summary = "Process liveness",
    responses(
        (status = 200, description = "Process is running", body = str, content_type = "text/plain", example = "ok")
    )
)]
pub async fn liveness() -> &'static str {
    "ok"
}
