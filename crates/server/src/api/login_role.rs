//! Role assignments.
//!
//! `POST /login-role/bulk` reconciles a login's roles with a target set: missing
//! pairs are inserted, surplus pairs deleted. Each row change commits on its
//! own, so a failure part way leaves a subset applied without duplicates.

use crate::AppResources;
use crate::api::{Page, Payload, fetch_page};
use crate::audit::{self, Action, AuditRecord};
use crate::entity::{login, login_role, role};
use crate::error::ApiError;
use crate::response::{Created, Output};
use crate::util::require;
use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::login::LOGIN_TAG;

const MAX_ID_LEN: usize = 36;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NewLoginRole {
    pub login_id: Option<String>,
    pub role_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BulkLoginRole {
    pub login_id: Option<String>,
    /// Complete set of role ids the login should hold
    #[serde(default)]
    pub role_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LoginRoleFilter {
    pub login_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Changes applied by a bulk sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl RoleDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Roles to add and remove to turn `current` into `target`.
pub fn diff_roles(current: &[String], target: &[String]) -> RoleDiff {
    let current: BTreeSet<&String> = current.iter().collect();
    let target: BTreeSet<&String> = target.iter().collect();
    RoleDiff {
        added: target.difference(&current).map(|r| r.to_string()).collect(),
        removed: current.difference(&target).map(|r| r.to_string()).collect(),
    }
}

/// Reconciles the roles of `login_id` with `role_ids`.
pub async fn sync_roles(
    db: &DatabaseConnection,
    login_id: &str,
    role_ids: &[String],
) -> Result<RoleDiff, ApiError> {
    if role_ids.is_empty() {
        return Err(ApiError::missing("RoleIds"));
    }
    if login::Entity::find_by_id(login_id).one(db).await?.is_none() {
        return Err(ApiError::NotFound(format!("login {login_id}")));
    }
    let target: BTreeSet<&String> = role_ids.iter().collect();
    let known = role::Entity::find()
        .filter(role::Column::Id.is_in(target.iter().map(|r| r.as_str())))
        .count(db)
        .await?;
    if known != target.len() as u64 {
        return Err(ApiError::NotFound("one or more roles".into()));
    }

    let current: Vec<String> = login_role::Entity::find()
        .filter(login_role::Column::LoginId.eq(login_id))
        .all(db)
        .await?
        .into_iter()
        .map(|lr| lr.role_id)
        .collect();
    let diff = diff_roles(&current, role_ids);

    for role_id in &diff.added {
        login_role::ActiveModel {
            login_id: Set(login_id.to_string()),
            role_id: Set(role_id.clone()),
        }
        .insert(db)
        .await?;
    }
    for role_id in &diff.removed {
        login_role::Entity::delete_by_id((login_id.to_string(), role_id.clone()))
            .exec(db)
            .await?;
    }
    Ok(diff)
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_login_role, list_login_roles))
        .routes(routes!(get_login_role, delete_login_role))
        .routes(routes!(bulk_login_role))
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/login-role",
    tag = LOGIN_TAG,
    operation_id = "Assign Role",
    request_body = NewLoginRole,
    responses(
        (status = 201, description = "Role assigned", body = Output<login_role::Model>),
        (status = 404, description = "Unknown login or role"),
        (status = 409, description = "Already assigned")
    )
)]
pub async fn create_login_role(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<NewLoginRole>,
) -> Result<Created<login_role::Model>, ApiError> {
    let login_id = require("LoginId", payload.login_id.as_deref(), MAX_ID_LEN)?;
    let role_id = require("RoleId", payload.role_id.as_deref(), MAX_ID_LEN)?;
    let db = resources.db.as_ref();

    if login::Entity::find_by_id(login_id.as_str()).one(db).await?.is_none() {
        return Err(ApiError::NotFound(format!("login {login_id}")));
    }
    if role::Entity::find_by_id(role_id.as_str()).one(db).await?.is_none() {
        return Err(ApiError::NotFound(format!("role {role_id}")));
    }
    if login_role::Entity::find_by_id((login_id.clone(), role_id.clone()))
        .one(db)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!("login role {login_id}/{role_id}")));
    }

    let created = login_role::ActiveModel {
        login_id: Set(login_id),
        role_id: Set(role_id),
    }
    .insert(db)
    .await?;
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "login_role",
            json!({"login_id": created.login_id, "role_id": created.role_id}),
            Action::Create,
            None,
        ),
    );
    Ok(Created(Output::data(created)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/login-role/{login_id}/role_id/{role_id}",
    tag = LOGIN_TAG,
    operation_id = "Get Role Assignment",
    params(
        ("login_id" = String, Path, description = "Login id"),
        ("role_id" = String, Path, description = "Role id")
    ),
    responses(
        (status = 200, description = "The assignment", body = Output<login_role::Model>),
        (status = 404, description = "Not assigned")
    )
)]
pub async fn get_login_role(
    Extension(resources): Extension<AppResources>,
    Path((login_id, role_id)): Path<(String, String)>,
) -> Result<Json<Output<login_role::Model>>, ApiError> {
    let found = login_role::Entity::find_by_id((login_id.clone(), role_id.clone()))
        .one(resources.db.as_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("login role {login_id}/{role_id}")))?;
    Ok(Json(Output::data(found)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/login-role",
    tag = LOGIN_TAG,
    operation_id = "List Role Assignments",
    params(LoginRoleFilter),
    responses((status = 200, description = "Assignments, optionally for one login", body = Output<Vec<login_role::Model>>))
)]
pub async fn list_login_roles(
    Extension(resources): Extension<AppResources>,
    Query(filter): Query<LoginRoleFilter>,
) -> Result<Json<Output<Vec<login_role::Model>>>, ApiError> {
    let mut select = login_role::Entity::find()
        .order_by_asc(login_role::Column::LoginId)
        .order_by_asc(login_role::Column::RoleId);
    if let Some(login_id) = filter.login_id.as_deref() {
        select = select.filter(login_role::Column::LoginId.eq(login_id));
    }
    let page = Page {
        limit: filter.limit,
        offset: filter.offset,
    };
    let (rows, total) = fetch_page(resources.db.as_ref(), select, &page).await?;
    Ok(Json(Output::list(rows, total)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    delete,
    path = "/login-role/{login_id}/role_id/{role_id}",
    tag = LOGIN_TAG,
    operation_id = "Remove Role Assignment",
    params(
        ("login_id" = String, Path, description = "Login id"),
        ("role_id" = String, Path, description = "Role id")
    ),
    responses(
        (status = 200, description = "Assignment removed"),
        (status = 404, description = "Not assigned")
    )
)]
pub async fn delete_login_role(
    Extension(resources): Extension<AppResources>,
    Path((login_id, role_id)): Path<(String, String)>,
) -> Result<Json<Output<()>>, ApiError> {
    let removed = login_role::Entity::delete_by_id((login_id.clone(), role_id.clone()))
        .exec(resources.db.as_ref())
        .await?;
    if removed.rows_affected == 0 {
        return Err(ApiError::NotFound(format!("login role {login_id}/{role_id}")));
    }
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "login_role",
            json!({"login_id": login_id, "role_id": role_id}),
            Action::Delete,
            None,
        ),
    );
    Ok(Json(Output::empty()))
}

#[tracing::instrument(skip(resources, payload), fields(login_id = ?payload.login_id, roles = payload.role_ids.len()))]
#[utoipa::path(
    post,
    path = "/login-role/bulk",
    tag = LOGIN_TAG,
    operation_id = "Sync Roles",
    summary = "Make a login hold exactly the given roles",
    request_body = BulkLoginRole,
    responses(
        (status = 200, description = "Applied changes", body = Output<RoleDiff>),
        (status = 400, description = "Missing login id or empty role list"),
        (status = 404, description = "Unknown login or role")
    )
)]
pub async fn bulk_login_role(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<BulkLoginRole>,
) -> Result<Json<Output<RoleDiff>>, ApiError> {
    let login_id = require("LoginId", payload.login_id.as_deref(), MAX_ID_LEN)?;
    let diff = sync_roles(resources.db.as_ref(), &login_id, &payload.role_ids).await?;

    if !diff.is_empty() {
        tracing::info!(%login_id, added = ?diff.added, removed = ?diff.removed, "roles synced");
        audit::record(
            &resources.config.audit,
            AuditRecord::new(
                "login_role",
                json!({"login_id": login_id}),
                Action::Update,
                None,
            ),
        );
    }
    Ok(Json(Output::data(diff)))
}
