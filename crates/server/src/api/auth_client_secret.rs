//! Client secrets. The plaintext secret is returned once, when it is created.

use crate::AppResources;
use crate::api::{Payload, auth_client::{CLIENT_TAG, find_client}};
use crate::audit::{self, Action, AuditRecord};
use crate::entity::auth_client_secret;
use crate::error::ApiError;
use crate::response::{Created, Output};
use crate::util::{generate_random_string, require};
use axum::{Extension, Json, extract::Path};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

pub const SECRET_LEN: usize = 32;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NewSecret {
    pub client_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchSecret {
    pub client_id: Option<String>,
    pub secret: Option<String>,
    pub active: Option<bool>,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_secret, patch_secret))
        .routes(routes!(delete_secret))
}

#[tracing::instrument(skip(resources, payload), fields(client_id = ?payload.client_id))]
#[utoipa::path(
    post,
    path = "/auth-client-secret",
    tag = CLIENT_TAG,
    operation_id = "Create Client Secret",
    summary = "Generate an active secret for a client",
    request_body = NewSecret,
    responses(
        (status = 201, description = "Secret created", body = Output<auth_client_secret::Model>),
        (status = 404, description = "Unknown client")
    )
)]
pub async fn create_secret(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<NewSecret>,
) -> Result<Created<auth_client_secret::Model>, ApiError> {
    let client_id = require("ClientId", payload.client_id.as_deref(), 32)?;
    find_client(resources.db.as_ref(), &client_id).await?;

    let created = auth_client_secret::ActiveModel {
        client_id: Set(client_id),
        secret: Set(generate_random_string(SECRET_LEN)),
        active: Set(true),
        created_at: Set(OffsetDateTime::now_utc()),
    }
    .insert(resources.db.as_ref())
    .await?;
    tracing::info!(client_id = %created.client_id, "client secret created");
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "auth_client_secret",
            json!({"client_id": created.client_id}),
            Action::Create,
            None,
        ),
    );
    Ok(Created(Output::data(created)))
}

#[tracing::instrument(skip(resources, payload), fields(client_id = ?payload.client_id, active = ?payload.active))]
#[utoipa::path(
    patch,
    path = "/auth-client-secret",
    tag = CLIENT_TAG,
    operation_id = "Patch Client Secret",
    summary = "Activate or deactivate a secret",
    request_body = PatchSecret,
    responses(
        (status = 200, description = "Updated secret", body = Output<auth_client_secret::Model>),
        (status = 404, description = "Unknown secret")
    )
)]
pub async fn patch_secret(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<PatchSecret>,
) -> Result<Json<Output<auth_client_secret::Model>>, ApiError> {
    let client_id = require("ClientId", payload.client_id.as_deref(), 32)?;
    let secret = require("Secret", payload.secret.as_deref(), 255)?;
    let active = payload.active.ok_or_else(|| ApiError::missing("Active"))?;

    let existing = auth_client_secret::Entity::find_by_id((client_id.clone(), secret))
        .one(resources.db.as_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("secret for client {client_id}")))?;
    let was_active = existing.active;
    let mut model: auth_client_secret::ActiveModel = existing.into();
    model.active = Set(active);
    let updated = model.update(resources.db.as_ref()).await?;

    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "auth_client_secret",
            json!({"client_id": client_id}),
            Action::Update,
            Some(json!({"active": was_active})),
        ),
    );
    Ok(Json(Output::data(updated)))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    delete,
    path = "/auth-client-secret/{client_id}/secret/{secret}",
    tag = CLIENT_TAG,
    operation_id = "Delete Client Secret",
    params(
        ("client_id" = String, Path, description = "Client id"),
        ("secret" = String, Path, description = "The secret")
    ),
    responses(
        (status = 200, description = "Secret deleted"),
        (status = 404, description = "Unknown secret")
    )
)]
pub async fn delete_secret(
    Extension(resources): Extension<AppResources>,
    Path((client_id, secret)): Path<(String, String)>,
) -> Result<Json<Output<()>>, ApiError> {
    let removed = auth_client_secret::Entity::delete_by_id((client_id.clone(), secret))
        .exec(resources.db.as_ref())
        .await?;
    if removed.rows_affected == 0 {
        return Err(ApiError::NotFound(format!("secret for client {client_id}")));
    }
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "auth_client_secret",
            json!({"client_id": client_id}),
            Action::Delete,
            None,
        ),
    );
    Ok(Json(Output::empty()))
}
