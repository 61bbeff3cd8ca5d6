use crate::AppResources;
use crate::api::{Payload, auth_client::{CLIENT_TAG, MAX_URL_LEN, allow_callback, find_client}};
use crate::audit::{self, Action, AuditRecord};
use crate::entity::auth_client_callback;
use crate::error::ApiError;
use crate::response::{Created, Output};
use crate::util::require;
use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NewCallback {
    pub client_id: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CallbackFilter {
    pub client_id: Option<String>,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_callback, list_callbacks))
        .routes(routes!(delete_callback))
}

#[tracing::instrument(skip(resources, payload), fields(client_id = ?payload.client_id))]
#[utoipa::path(
    post,
    path = "/auth-client-callback",
    tag = CLIENT_TAG,
    operation_id = "Allow Callback",
    summary = "Allow a redirect target for a client",
    request_body = NewCallback,
    responses(
        (status = 201, description = "Callback allowed", body = Output<auth_client_callback::Model>),
        (status = 404, description = "Unknown client"),
        (status = 409, description = "Already allowed")
    )
)]
pub async fn create_callback(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<NewCallback>,
) -> Result<Created<auth_client_callback::Model>, ApiError> {
    let client_id = require("ClientId", payload.client_id.as_deref(), 32)?;
    let callback_url = require("CallbackUrl", payload.callback_url.as_deref(), MAX_URL_LEN)?;
    find_client(resources.db.as_ref(), &client_id).await?;

    if !allow_callback(resources.db.as_ref(), &client_id, &callback_url).await? {
        return Err(ApiError::Conflict(format!("callback {callback_url}")));
    }
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "auth_client_callback",
            json!({"client_id": client_id, "callback_url": callback_url}),
            Action::Create,
            None,
        ),
    );
    Ok(Created(Output::data(auth_client_callback::Model {
        client_id,
        callback_url,
    })))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/auth-client-callback",
    tag = CLIENT_TAG,
    operation_id = "List Callbacks",
    params(CallbackFilter),
    responses((status = 200, description = "Allowed redirect targets", body = Output<Vec<auth_client_callback::Model>>))
)]
pub async fn list_callbacks(
    Extension(resources): Extension<AppResources>,
    Query(filter): Query<CallbackFilter>,
) -> Result<Json<Output<Vec<auth_client_callback::Model>>>, ApiError> {
    let mut select = auth_client_callback::Entity::find()
        .order_by_asc(auth_client_callback::Column::ClientId)
        .order_by_asc(auth_client_callback::Column::CallbackUrl);
    if let Some(client_id) = filter.client_id.as_deref() {
        select = select.filter(auth_client_callback::Column::ClientId.eq(client_id));
    }
    let rows = select.all(resources.db.as_ref()).await?;
    let total = rows.len() as u64;
    Ok(Json(Output::list(rows, total)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    delete,
    path = "/auth-client-callback/{client_id}/callback_url/{callback_url}",
    tag = CLIENT_TAG,
    operation_id = "Remove Callback",
    params(
        ("client_id" = String, Path, description = "Client id"),
        ("callback_url" = String, Path, description = "Percent-encoded callback URL")
    ),
    responses(
        (status = 200, description = "Callback removed"),
        (status = 404, description = "Not allowed for this client")
    )
)]
pub async fn delete_callback(
    Extension(resources): Extension<AppResources>,
    Path((client_id, callback_url)): Path<(String, String)>,
) -> Result<Json<Output<()>>, ApiError> {
    let removed =
        auth_client_callback::Entity::delete_by_id((client_id.clone(), callback_url.clone()))
            .exec(resources.db.as_ref())
            .await?;
    if removed.rows_affected == 0 {
        return Err(ApiError::NotFound(format!("callback {callback_url}")));
    }
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "auth_client_callback",
            json!({"client_id": client_id, "callback_url": callback_url}),
            Action::Delete,
            None,
        ),
    );
    Ok(Json(Output::empty()))
}
