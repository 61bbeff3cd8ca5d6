//! Administration of stored route/role mappings.
//!
//! Edits are persisted immediately. The running registry is a startup snapshot,
//! so they take effect on the next start.

use crate::AppResources;
use crate::api::{Page, Payload, fetch_page};
use crate::audit::{self, Action, AuditRecord};
use crate::entity::register_route::{self, encode_roles};
use crate::error::ApiError;
use crate::response::Output;
use crate::route::registry::MAX_PATH_LEN;
use crate::util::require;
use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, QueryOrder};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ROUTE_TAG: &str = "Register Route";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchRoute {
    /// `METHOD/path/with/:params`
    pub raw_path: Option<String>,
    /// Replacement role list; empty makes the route public
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BulkRoute {
    #[serde(default)]
    pub raw_paths: Vec<String>,
    #[serde(default)]
    pub add_roles: Vec<String>,
    #[serde(default)]
    pub remove_roles: Vec<String>,
}

/// `roles` with `add` appended (skipping ones already held) and `remove` taken out.
pub fn apply_role_changes(roles: Vec<String>, add: &[String], remove: &[String]) -> Vec<String> {
    let mut roles = roles;
    for role in add {
        if !roles.contains(role) {
            roles.push(role.clone());
        }
    }
    roles.retain(|r| !remove.contains(r));
    roles
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_routes, patch_route))
        .routes(routes!(get_route))
        .routes(routes!(bulk_routes))
}

async fn find_route(db: &DatabaseConnection, raw_path: &str) -> Result<register_route::Model, ApiError> {
    register_route::Entity::find_by_id(raw_path)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("route {raw_path}")))
}

async fn store_roles(
    resources: &AppResources,
    existing: register_route::Model,
    roles: &[String],
) -> Result<register_route::Model, ApiError> {
    let raw_path = existing.raw_path.clone();
    let before = audit::snapshot(&existing);
    let mut model: register_route::ActiveModel = existing.into();
    model.roles = Set(encode_roles(roles));
    let updated = model.update(resources.db.as_ref()).await?;
    tracing::info!(%raw_path, ?roles, "route roles changed");
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "register_route",
            json!({"raw_path": raw_path}),
            Action::Update,
            before,
        ),
    );
    Ok(updated)
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/register-route",
    tag = ROUTE_TAG,
    operation_id = "List Routes",
    params(Page),
    responses((status = 200, description = "Stored routes", body = Output<Vec<register_route::Model>>))
)]
pub async fn list_routes(
    Extension(resources): Extension<AppResources>,
    Query(page): Query<Page>,
) -> Result<Json<Output<Vec<register_route::Model>>>, ApiError> {
    let select = register_route::Entity::find().order_by_asc(register_route::Column::RawPath);
    let (rows, total) = fetch_page(resources.db.as_ref(), select, &page).await?;
    Ok(Json(Output::list(rows, total)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/register-route/{raw_path}",
    tag = ROUTE_TAG,
    operation_id = "Get Route",
    params(("raw_path" = String, Path, description = "Percent-encoded raw path, e.g. `GET%2Frole%2F:id`")),
    responses(
        (status = 200, description = "The route", body = Output<register_route::Model>),
        (status = 404, description = "Unknown route")
    )
)]
pub async fn get_route(
    Extension(resources): Extension<AppResources>,
    Path(raw_path): Path<String>,
) -> Result<Json<Output<register_route::Model>>, ApiError> {
    Ok(Json(Output::data(
        find_route(resources.db.as_ref(), &raw_path).await?,
    )))
}

#[tracing::instrument(skip(resources, payload), fields(raw_path = ?payload.raw_path))]
#[utoipa::path(
    patch,
    path = "/register-route",
    tag = ROUTE_TAG,
    operation_id = "Patch Route",
    summary = "Replace the roles of one route",
    request_body = PatchRoute,
    responses(
        (status = 200, description = "Updated route", body = Output<register_route::Model>),
        (status = 404, description = "Unknown route")
    )
)]
pub async fn patch_route(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<PatchRoute>,
) -> Result<Json<Output<register_route::Model>>, ApiError> {
    let raw_path = require("RawPath", payload.raw_path.as_deref(), MAX_PATH_LEN)?;
    let roles = payload.roles.ok_or_else(|| ApiError::missing("Roles"))?;
    let existing = find_route(resources.db.as_ref(), &raw_path).await?;
    let updated = store_roles(&resources, existing, &roles).await?;
    Ok(Json(Output::data(updated)))
}

#[tracing::instrument(skip(resources, payload), fields(routes = payload.raw_paths.len()))]
#[utoipa::path(
    post,
    path = "/register-route/bulk",
    tag = ROUTE_TAG,
    operation_id = "Bulk Route Roles",
    summary = "Add and remove roles across several routes",
    request_body = BulkRoute,
    responses(
        (status = 200, description = "Updated routes", body = Output<Vec<register_route::Model>>),
        (status = 400, description = "No raw paths given"),
        (status = 404, description = "Unknown route")
    )
)]
pub async fn bulk_routes(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<BulkRoute>,
) -> Result<Json<Output<Vec<register_route::Model>>>, ApiError> {
    let raw_paths: Vec<&String> = payload.raw_paths.iter().filter(|p| !p.is_empty()).collect();
    if raw_paths.is_empty() {
        return Err(ApiError::missing("RawPaths"));
    }

    let mut updated = Vec::with_capacity(raw_paths.len());
    for raw_path in raw_paths {
        let existing = find_route(resources.db.as_ref(), raw_path).await?;
        let roles = apply_role_changes(
            existing.roles_list(),
            &payload.add_roles,
            &payload.remove_roles,
        );
        updated.push(store_roles(&resources, existing, &roles).await?);
    }
    let total = updated.len() as u64;
    Ok(Json(Output::list(updated, total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn adds_without_duplicates_and_removes() {
        let result = apply_role_changes(
            roles(&["admin", "user"]),
            &roles(&["user", "auditor"]),
            &roles(&["admin"]),
        );
        assert_eq!(result, roles(&["user", "auditor"]));
    }

    #[test]
    fn removing_everything_leaves_public_route() {
        assert!(apply_role_changes(roles(&["admin"]), &[], &roles(&["admin"])).is_empty());
    }
}
