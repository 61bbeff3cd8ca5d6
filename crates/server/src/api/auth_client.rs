//! OAuth2 client registrations.

use crate::AppResources;
use crate::api::{Page, Payload, fetch_page};
use crate::audit::{self, Action, AuditRecord};
use crate::entity::{
    auth_authorize, auth_client, auth_client_callback, auth_client_secret, auth_refresh,
};
use crate::error::ApiError;
use crate::response::{Created, Output};
use crate::util::{check_length, generate_random_string, require};
use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const CLIENT_TAG: &str = "OAuth2 Clients";

pub const CLIENT_ID_LEN: usize = 32;
pub const MAX_CLIENT_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_URL_LEN: usize = 500;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NewClient {
    pub name: Option<String>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchClient {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub callback_url: Option<String>,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_client, patch_client, list_clients))
        .routes(routes!(get_client, delete_client))
}

pub async fn find_client(db: &DatabaseConnection, id: &str) -> Result<auth_client::Model, ApiError> {
    auth_client::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("client {id}")))
}

/// Adds `callback_url` to the client's allow-list unless it is already there.
pub async fn allow_callback<C: ConnectionTrait>(
    db: &C,
    client_id: &str,
    callback_url: &str,
) -> Result<bool, ApiError> {
    let exists = auth_client_callback::Entity::find_by_id((
        client_id.to_string(),
        callback_url.to_string(),
    ))
    .one(db)
    .await?
    .is_some();
    if exists {
        return Ok(false);
    }
    auth_client_callback::ActiveModel {
        client_id: Set(client_id.to_string()),
        callback_url: Set(callback_url.to_string()),
    }
    .insert(db)
    .await?;
    Ok(true)
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/auth-client",
    tag = CLIENT_TAG,
    operation_id = "Create Client",
    summary = "Register an OAuth2 client",
    description = "The callback URL is also added to the client's allowed redirect targets.",
    request_body = NewClient,
    responses(
        (status = 201, description = "Client created", body = Output<auth_client::Model>),
        (status = 400, description = "Missing or overlong field")
    )
)]
pub async fn create_client(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<NewClient>,
) -> Result<Created<auth_client::Model>, ApiError> {
    let name = require("Name", payload.name.as_deref(), MAX_CLIENT_NAME_LEN)?;
    let homepage_url = require("HomepageUrl", payload.homepage_url.as_deref(), MAX_URL_LEN)?;
    let callback_url = require("CallbackUrl", payload.callback_url.as_deref(), MAX_URL_LEN)?;
    if let Some(description) = payload.description.as_deref() {
        check_length("Description", description, MAX_DESCRIPTION_LEN)?;
    }

    let txn = resources.db.begin().await?;
    let created = auth_client::ActiveModel {
        id: Set(generate_random_string(CLIENT_ID_LEN)),
        name: Set(name),
        description: Set(payload.description),
        homepage_url: Set(homepage_url),
        callback_url: Set(callback_url.clone()),
        created_at: Set(OffsetDateTime::now_utc()),
    }
    .insert(&txn)
    .await?;
    allow_callback(&txn, &created.id, &callback_url).await?;
    txn.commit().await?;

    tracing::info!(client_id = %created.id, "client registered");
    audit::record(
        &resources.config.audit,
        AuditRecord::new("auth_client", json!({"id": created.id}), Action::Create, None),
    );
    Ok(Created(Output::data(created)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/auth-client/{id}",
    tag = CLIENT_TAG,
    operation_id = "Get Client",
    params(("id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "The client", body = Output<auth_client::Model>),
        (status = 404, description = "Unknown client")
    )
)]
pub async fn get_client(
    Extension(resources): Extension<AppResources>,
    Path(id): Path<String>,
) -> Result<Json<Output<auth_client::Model>>, ApiError> {
    Ok(Json(Output::data(
        find_client(resources.db.as_ref(), &id).await?,
    )))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/auth-client",
    tag = CLIENT_TAG,
    operation_id = "List Clients",
    params(Page),
    responses((status = 200, description = "Clients ordered by name", body = Output<Vec<auth_client::Model>>))
)]
pub async fn list_clients(
    Extension(resources): Extension<AppResources>,
    Query(page): Query<Page>,
) -> Result<Json<Output<Vec<auth_client::Model>>>, ApiError> {
    let select = auth_client::Entity::find().order_by_asc(auth_client::Column::Name);
    let (rows, total) = fetch_page(resources.db.as_ref(), select, &page).await?;
    Ok(Json(Output::list(rows, total)))
}

#[tracing::instrument(skip(resources, payload), fields(id = ?payload.id))]
#[utoipa::path(
    patch,
    path = "/auth-client",
    tag = CLIENT_TAG,
    operation_id = "Patch Client",
    request_body = PatchClient,
    responses(
        (status = 200, description = "Updated client", body = Output<auth_client::Model>),
        (status = 404, description = "Unknown client")
    )
)]
pub async fn patch_client(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<PatchClient>,
) -> Result<Json<Output<auth_client::Model>>, ApiError> {
    let id = require("Id", payload.id.as_deref(), CLIENT_ID_LEN)?;
    let existing = find_client(resources.db.as_ref(), &id).await?;
    let mut model: auth_client::ActiveModel = existing.clone().into();

    if let Some(name) = payload.name.as_deref() {
        model.name = Set(require("Name", Some(name), MAX_CLIENT_NAME_LEN)?);
    }
    if let Some(description) = payload.description {
        check_length("Description", &description, MAX_DESCRIPTION_LEN)?;
        model.description = Set(Some(description));
    }
    if let Some(homepage_url) = payload.homepage_url.as_deref() {
        model.homepage_url = Set(require("HomepageUrl", Some(homepage_url), MAX_URL_LEN)?);
    }
    let callback_url = match payload.callback_url.as_deref() {
        Some(url) => Some(require("CallbackUrl", Some(url), MAX_URL_LEN)?),
        None => None,
    };

    let txn = resources.db.begin().await?;
    if let Some(url) = callback_url {
        allow_callback(&txn, &id, &url).await?;
        model.callback_url = Set(url);
    }
    let updated = model.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "auth_client",
            json!({"id": id}),
            Action::Update,
            audit::snapshot(&existing),
        ),
    );
    Ok(Json(Output::data(updated)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    delete,
    path = "/auth-client/{id}",
    tag = CLIENT_TAG,
    operation_id = "Delete Client",
    summary = "Delete a client with its callbacks, secrets and grants",
    params(("id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client deleted"),
        (status = 404, description = "Unknown client")
    )
)]
pub async fn delete_client(
    Extension(resources): Extension<AppResources>,
    Path(id): Path<String>,
) -> Result<Json<Output<()>>, ApiError> {
    let existing = find_client(resources.db.as_ref(), &id).await?;

    let txn = resources.db.begin().await?;
    auth_client_callback::Entity::delete_many()
        .filter(auth_client_callback::Column::ClientId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    auth_client_secret::Entity::delete_many()
        .filter(auth_client_secret::Column::ClientId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    auth_refresh::Entity::delete_many()
        .filter(auth_refresh::Column::ClientId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    auth_authorize::Entity::delete_many()
        .filter(auth_authorize::Column::ClientId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    auth_client::Entity::delete_by_id(id.as_str())
        .exec(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!(client_id = %id, "client deleted");
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "auth_client",
            json!({"id": id}),
            Action::Delete,
            audit::snapshot(&existing),
        ),
    );
    Ok(Json(Output::empty()))
}
