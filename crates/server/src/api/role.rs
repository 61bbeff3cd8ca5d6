use crate::AppResources;
use crate::api::{Page, Payload, fetch_page};
use crate::audit::{self, Action, AuditRecord};
use crate::entity::{login_role, role};
use crate::error::ApiError;
use crate::response::{Created, Output};
use crate::util::{check_length, generate_random_string, require};
use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ROLE_TAG: &str = "Role";

pub const ROLE_ID_LEN: usize = 12;
pub const MAX_ROLE_NAME_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NewRole {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchRole {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_role, patch_role, list_roles))
        .routes(routes!(get_role, delete_role))
}

async fn ensure_unique_name(db: &DatabaseConnection, name: &str) -> Result<(), ApiError> {
    let taken = role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await?
        .is_some();
    if taken {
        return Err(ApiError::Conflict(format!("role {name}")));
    }
    Ok(())
}

async fn find_role(db: &DatabaseConnection, id: &str) -> Result<role::Model, ApiError> {
    role::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("role {id}")))
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/role",
    tag = ROLE_TAG,
    operation_id = "Create Role",
    request_body = NewRole,
    responses(
        (status = 201, description = "Role created", body = Output<role::Model>),
        (status = 400, description = "Missing or overlong name"),
        (status = 409, description = "Name already in use")
    )
)]
pub async fn create_role(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<NewRole>,
) -> Result<Created<role::Model>, ApiError> {
    let name = require("Name", payload.name.as_deref(), MAX_ROLE_NAME_LEN)?;
    if let Some(description) = payload.description.as_deref() {
        check_length("Description", description, MAX_DESCRIPTION_LEN)?;
    }
    ensure_unique_name(resources.db.as_ref(), &name).await?;

    let created = role::ActiveModel {
        id: Set(generate_random_string(ROLE_ID_LEN)),
        name: Set(name),
        description: Set(payload.description),
    }
    .insert(resources.db.as_ref())
    .await?;
    audit::record(
        &resources.config.audit,
        AuditRecord::new("role", json!({"id": created.id}), Action::Create, None),
    );
    Ok(Created(Output::data(created)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/role/{id}",
    tag = ROLE_TAG,
    operation_id = "Get Role",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "The role", body = Output<role::Model>),
        (status = 404, description = "Unknown role")
    )
)]
pub async fn get_role(
    Extension(resources): Extension<AppResources>,
    Path(id): Path<String>,
) -> Result<Json<Output<role::Model>>, ApiError> {
    Ok(Json(Output::data(
        find_role(resources.db.as_ref(), &id).await?,
    )))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/role",
    tag = ROLE_TAG,
    operation_id = "List Roles",
    params(Page),
    responses((status = 200, description = "Roles ordered by name", body = Output<Vec<role::Model>>))
)]
pub async fn list_roles(
    Extension(resources): Extension<AppResources>,
    Query(page): Query<Page>,
) -> Result<Json<Output<Vec<role::Model>>>, ApiError> {
    let select = role::Entity::find().order_by_asc(role::Column::Name);
    let (rows, total) = fetch_page(resources.db.as_ref(), select, &page).await?;
    Ok(Json(Output::list(rows, total)))
}

#[tracing::instrument(skip(resources, payload), fields(id = ?payload.id))]
#[utoipa::path(
    patch,
    path = "/role",
    tag = ROLE_TAG,
    operation_id = "Patch Role",
    request_body = PatchRole,
    responses(
        (status = 200, description = "Updated role", body = Output<role::Model>),
        (status = 404, description = "Unknown role"),
        (status = 409, description = "Name already in use")
    )
)]
pub async fn patch_role(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<PatchRole>,
) -> Result<Json<Output<role::Model>>, ApiError> {
    let id = require("Id", payload.id.as_deref(), ROLE_ID_LEN)?;
    let db = resources.db.as_ref();
    let existing = find_role(db, &id).await?;
    let mut model: role::ActiveModel = existing.clone().into();

    if let Some(name) = payload.name.as_deref().map(str::trim)
        && name != existing.name
    {
        let name = require("Name", Some(name), MAX_ROLE_NAME_LEN)?;
        ensure_unique_name(db, &name).await?;
        model.name = Set(name);
    }
    if let Some(description) = payload.description {
        check_length("Description", &description, MAX_DESCRIPTION_LEN)?;
        model.description = Set(Some(description));
    }
    let updated = model.update(db).await?;

    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "role",
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
    path = "/role/{id}",
    tag = ROLE_TAG,
    operation_id = "Delete Role",
    summary = "Delete a role and every assignment of it",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 404, description = "Unknown role")
    )
)]
pub async fn delete_role(
    Extension(resources): Extension<AppResources>,
    Path(id): Path<String>,
) -> Result<Json<Output<()>>, ApiError> {
    let existing = find_role(resources.db.as_ref(), &id).await?;

    let txn = resources.db.begin().await?;
    login_role::Entity::delete_many()
        .filter(login_role::Column::RoleId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    role::Entity::delete_by_id(id.as_str()).exec(&txn).await?;
    txn.commit().await?;

    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "role",
            json!({"id": id}),
            Action::Delete,
            audit::snapshot(&existing),
        ),
    );
    Ok(Json(Output::empty()))
}
