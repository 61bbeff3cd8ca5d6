use crate::AppResources;
use crate::api::auth_client::CLIENT_TAG;
use crate::entity::auth_authorize;
use crate::error::ApiError;
use crate::response::Output;
use axum::{Extension, Json, extract::Path};
use sea_orm::EntityTrait;
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(get_authorization))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/auth-authorize/{id}",
    tag = CLIENT_TAG,
    operation_id = "Get Authorization",
    summary = "Inspect an authorization attempt",
    description = "The authorization code itself is never returned.",
    params(("id" = String, Path, description = "Authorization id")),
    responses(
        (status = 200, description = "The authorization", body = Output<auth_authorize::Model>),
        (status = 404, description = "Unknown authorization")
    )
)]
pub async fn get_authorization(
    Extension(resources): Extension<AppResources>,
    Path(id): Path<String>,
) -> Result<Json<Output<auth_authorize::Model>>, ApiError> {
    let found = auth_authorize::Entity::find_by_id(id)
        .one(resources.db.as_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("authorization".into()))?;
    Ok(Json(Output::data(found)))
}
