use crate::AppResources;
use crate::api::auth_client::{CLIENT_TAG, find_client};
use crate::entity::auth_refresh;
use crate::error::ApiError;
use crate::response::Output;
use axum::{Extension, Json, extract::Path};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(list_refresh_tokens))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/auth-refresh/{client_id}",
    tag = CLIENT_TAG,
    operation_id = "List Refresh Tokens",
    summary = "Refresh tokens issued to a client, newest first",
    description = "Token values are stored as digests and are not returned.",
    params(("client_id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "Issued refresh tokens", body = Output<Vec<auth_refresh::Model>>),
        (status = 404, description = "Unknown client")
    )
)]
pub async fn list_refresh_tokens(
    Extension(resources): Extension<AppResources>,
    Path(client_id): Path<String>,
) -> Result<Json<Output<Vec<auth_refresh::Model>>>, ApiError> {
    find_client(resources.db.as_ref(), &client_id).await?;
    let rows = auth_refresh::Entity::find()
        .filter(auth_refresh::Column::ClientId.eq(client_id.as_str()))
        .order_by_desc(auth_refresh::Column::CreatedAt)
        .all(resources.db.as_ref())
        .await?;
    let total = rows.len() as u64;
    Ok(Json(Output::list(rows, total)))
}
