//! Login lifecycle: registration, profile edits, password reset and sign-in.
//!
//! A login is created without a password and with a reset token. The owner
//! chooses a password through `/login/reset/pwd`, after which `set_pwd` is
//! cleared and sign-in becomes possible.

use crate::AppResources;
use crate::api::{Page, Payload, fetch_page};
use crate::audit::{self, Action, AuditRecord};
use crate::auth::{PasswordHasher, validate_password};
use crate::entity::{login, login_reset, login_role, role};
use crate::error::ApiError;
use crate::mailer;
use crate::response::{Created, Output};
use crate::route::Authenticated;
use crate::util::{check_length, generate_uuid, require, validate_email};
use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const LOGIN_TAG: &str = "Login";

pub const MAX_EMAIL_LEN: usize = 100;
pub const MAX_FIRST_NAME_LEN: usize = 50;
pub const MAX_LAST_NAME_LEN: usize = 100;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegisterLogin {
    pub email_addr: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchLogin {
    pub id: Option<String>,
    pub email_addr: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ChangePassword {
    pub id: Option<String>,
    pub pwd: Option<String>,
    pub confirm_pwd: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PasswordReset {
    pub email_addr: Option<String>,
    pub reset_token: Option<String>,
    pub pwd: Option<String>,
    pub confirm_pwd: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginSignIn {
    pub email_addr: Option<String>,
    pub pwd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignInToken {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginWithRoles {
    pub id: String,
    pub email_addr: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register_login, patch_login, list_logins))
        .routes(routes!(get_login, delete_login))
        .routes(routes!(login_roles))
        .routes(routes!(patch_pwd))
        .routes(routes!(reset_pwd))
        .routes(routes!(forgot_password))
        .routes(routes!(sign_in))
}

async fn find_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<login::Model>, ApiError> {
    Ok(login::Entity::find()
        .filter(login::Column::EmailAddr.eq(email))
        .one(db)
        .await?)
}

async fn find_login(db: &DatabaseConnection, id: &str) -> Result<login::Model, ApiError> {
    login::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("login {id}")))
}

/// Role names held by a login.
pub async fn role_names(db: &DatabaseConnection, login_id: &str) -> Result<Vec<String>, ApiError> {
    let role_ids: Vec<String> = login_role::Entity::find()
        .filter(login_role::Column::LoginId.eq(login_id))
        .all(db)
        .await?
        .into_iter()
        .map(|lr| lr.role_id)
        .collect();
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(role::Entity::find()
        .filter(role::Column::Id.is_in(role_ids))
        .order_by_asc(role::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect())
}

fn optional_name(field: &str, value: Option<String>, max: usize) -> Result<Option<String>, ApiError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => {
            check_length(field, &v, max)?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

fn send_reset(resources: &AppResources, email: &str, token: &str) {
    mailer::send_reset_email(
        resources.mailer.clone(),
        resources.config.smtp.as_ref(),
        email,
        mailer::reset_link(&resources.config.reset_url, token),
    );
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/login",
    tag = LOGIN_TAG,
    operation_id = "Register Login",
    summary = "Register a login",
    description = "Creates an active login without a password and emails a reset link so the owner \
                   can choose one.",
    request_body = RegisterLogin,
    responses(
        (status = 201, description = "Login created", body = Output<login::Model>),
        (status = 400, description = "Invalid or duplicate email address")
    )
)]
pub async fn register_login(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<RegisterLogin>,
) -> Result<Created<login::Model>, ApiError> {
    let email = require("EmailAddress", payload.email_addr.as_deref(), MAX_EMAIL_LEN)?;
    validate_email(&email)?;
    let first_name = optional_name("FirstName", payload.first_name, MAX_FIRST_NAME_LEN)?;
    let last_name = optional_name("LastName", payload.last_name, MAX_LAST_NAME_LEN)?;

    // Not atomic with the insert; email has no unique index.
    if find_by_email(resources.db.as_ref(), &email).await?.is_some() {
        return Err(ApiError::DuplicateEmail(email));
    }

    let now = OffsetDateTime::now_utc();
    let reset_token = generate_uuid();
    let txn = resources.db.begin().await?;
    let created = login::ActiveModel {
        id: Set(generate_uuid()),
        email_addr: Set(email.clone()),
        first_name: Set(first_name),
        last_name: Set(last_name),
        pwd: Set(String::new()),
        active: Set(true),
        set_pwd: Set(true),
        created_at: Set(now),
        updated_at: Set(None),
    }
    .insert(&txn)
    .await?;
    login_reset::ActiveModel {
        login_id: Set(created.id.clone()),
        reset_token: Set(reset_token.clone()),
        created_at: Set(now),
        updated_at: Set(None),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(login_id = %created.id, "login registered");
    send_reset(&resources, &email, &reset_token);
    audit::record(
        &resources.config.audit,
        AuditRecord::new("login", json!({"id": created.id}), Action::Create, None),
    );
    Ok(Created(Output::data(created)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/login/{id}",
    tag = LOGIN_TAG,
    operation_id = "Get Login",
    params(("id" = String, Path, description = "Login id")),
    responses(
        (status = 200, description = "The login", body = Output<login::Model>),
        (status = 404, description = "Unknown login")
    )
)]
pub async fn get_login(
    Extension(resources): Extension<AppResources>,
    Path(id): Path<String>,
) -> Result<Json<Output<login::Model>>, ApiError> {
    let found = find_login(resources.db.as_ref(), &id).await?;
    Ok(Json(Output::data(found)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/login",
    tag = LOGIN_TAG,
    operation_id = "List Logins",
    params(Page),
    responses((status = 200, description = "Logins ordered by email address", body = Output<Vec<login::Model>>))
)]
pub async fn list_logins(
    Extension(resources): Extension<AppResources>,
    Query(page): Query<Page>,
) -> Result<Json<Output<Vec<login::Model>>>, ApiError> {
    let select = login::Entity::find().order_by_asc(login::Column::EmailAddr);
    let (rows, total) = fetch_page(resources.db.as_ref(), select, &page).await?;
    Ok(Json(Output::list(rows, total)))
}

#[tracing::instrument(skip(resources, payload), fields(id = ?payload.id))]
#[utoipa::path(
    patch,
    path = "/login",
    tag = LOGIN_TAG,
    operation_id = "Patch Login",
    summary = "Update profile fields or the active flag",
    request_body = PatchLogin,
    responses(
        (status = 200, description = "Updated login", body = Output<login::Model>),
        (status = 400, description = "Validation failure or email already in use"),
        (status = 404, description = "Unknown login")
    )
)]
pub async fn patch_login(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<PatchLogin>,
) -> Result<Json<Output<login::Model>>, ApiError> {
    let id = require("Id", payload.id.as_deref(), 36)?;
    let db = resources.db.as_ref();
    let existing = find_login(db, &id).await?;
    let mut model: login::ActiveModel = existing.clone().into();

    if let Some(email) = payload.email_addr.map(|e| e.trim().to_string())
        && email != existing.email_addr
    {
        validate_email(&email)?;
        if find_by_email(db, &email).await?.is_some() {
            return Err(ApiError::DuplicateEmail(email));
        }
        model.email_addr = Set(email);
    }
    if let Some(first_name) = payload.first_name {
        check_length("FirstName", &first_name, MAX_FIRST_NAME_LEN)?;
        model.first_name = Set(Some(first_name));
    }
    if let Some(last_name) = payload.last_name {
        check_length("LastName", &last_name, MAX_LAST_NAME_LEN)?;
        model.last_name = Set(Some(last_name));
    }
    if let Some(active) = payload.active {
        model.active = Set(active);
    }
    model.updated_at = Set(Some(OffsetDateTime::now_utc()));
    let updated = model.update(db).await?;

    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "login",
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
    path = "/login/{id}",
    tag = LOGIN_TAG,
    operation_id = "Delete Login",
    summary = "Delete a login with its role assignments and reset tokens",
    params(("id" = String, Path, description = "Login id")),
    responses(
        (status = 200, description = "Login deleted"),
        (status = 404, description = "Unknown login")
    )
)]
pub async fn delete_login(
    Extension(resources): Extension<AppResources>,
    Path(id): Path<String>,
) -> Result<Json<Output<()>>, ApiError> {
    let existing = find_login(resources.db.as_ref(), &id).await?;

    let txn = resources.db.begin().await?;
    login_role::Entity::delete_many()
        .filter(login_role::Column::LoginId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    login_reset::Entity::delete_many()
        .filter(login_reset::Column::LoginId.eq(id.as_str()))
        .exec(&txn)
        .await?;
    login::Entity::delete_by_id(id.as_str()).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(login_id = %id, "login deleted");
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "login",
            json!({"id": id}),
            Action::Delete,
            audit::snapshot(&existing),
        ),
    );
    Ok(Json(Output::empty()))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/login/roles",
    tag = LOGIN_TAG,
    operation_id = "Logins With Roles",
    summary = "Active logins with the names of their roles",
    responses((status = 200, description = "Active logins", body = Output<Vec<LoginWithRoles>>))
)]
pub async fn login_roles(
    Extension(resources): Extension<AppResources>,
) -> Result<Json<Output<Vec<LoginWithRoles>>>, ApiError> {
    let db = resources.db.as_ref();
    let logins = login::Entity::find()
        .filter(login::Column::Active.eq(true))
        .order_by_asc(login::Column::EmailAddr)
        .all(db)
        .await?;
    let role_names: HashMap<String, String> = role::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();
    let mut held: HashMap<String, Vec<String>> = HashMap::new();
    for assignment in login_role::Entity::find().all(db).await? {
        if let Some(name) = role_names.get(&assignment.role_id) {
            held.entry(assignment.login_id)
                .or_default()
                .push(name.clone());
        }
    }

    let rows: Vec<LoginWithRoles> = logins
        .into_iter()
        .map(|l| {
            let mut roles = held.remove(&l.id).unwrap_or_default();
            roles.sort();
            LoginWithRoles {
                id: l.id,
                email_addr: l.email_addr,
                first_name: l.first_name,
                last_name: l.last_name,
                roles,
            }
        })
        .collect();
    let total = rows.len() as u64;
    Ok(Json(Output::list(rows, total)))
}

#[tracing::instrument(skip(resources, caller, payload), fields(id = ?payload.id))]
#[utoipa::path(
    patch,
    path = "/login/pwd",
    tag = LOGIN_TAG,
    operation_id = "Change Password",
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Password does not meet the policy"),
        (status = 404, description = "Unknown login")
    )
)]
pub async fn patch_pwd(
    Extension(resources): Extension<AppResources>,
    Authenticated(caller): Authenticated,
    Payload(payload): Payload<ChangePassword>,
) -> Result<Json<Output<()>>, ApiError> {
    let id = require("Id", payload.id.as_deref(), 36)?;
    let pwd = payload.pwd.unwrap_or_default();
    validate_password(&pwd, payload.confirm_pwd.as_deref().unwrap_or_default())?;
    let existing = find_login(resources.db.as_ref(), &id).await?;

    let hash = PasswordHasher::new(resources.config.auth.pwd_cost)
        .hash(&pwd)
        .await?;
    let mut model: login::ActiveModel = existing.into();
    model.pwd = Set(hash);
    model.set_pwd = Set(false);
    model.updated_at = Set(Some(OffsetDateTime::now_utc()));
    model.update(resources.db.as_ref()).await?;

    audit::record(
        &resources.config.audit,
        AuditRecord::new("login", json!({"id": id}), Action::Update, None).by(caller.subject),
    );
    Ok(Json(Output::empty()))
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/login/reset/pwd",
    tag = LOGIN_TAG,
    operation_id = "Reset Password",
    summary = "Choose a password with a reset token",
    request_body = PasswordReset,
    responses(
        (status = 200, description = "Password set"),
        (status = 400, description = "Reset token invalid or password does not meet the policy"),
        (status = 403, description = "Login is not active")
    )
)]
pub async fn reset_pwd(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<PasswordReset>,
) -> Result<Json<Output<()>>, ApiError> {
    let email = require("EmailAddress", payload.email_addr.as_deref(), MAX_EMAIL_LEN)?;
    let token = require("ResetToken", payload.reset_token.as_deref(), 36)?;
    let db = resources.db.as_ref();

    let account = find_by_email(db, &email)
        .await?
        .ok_or(ApiError::ResetTokenInvalid)?;
    let reset = login_reset::Entity::find_by_id((account.id.clone(), token))
        .one(db)
        .await?
        .ok_or(ApiError::ResetTokenInvalid)?;
    let now = OffsetDateTime::now_utc();
    if reset.is_spent() || reset.is_expired(now, resources.config.auth.reset_duration_days) {
        return Err(ApiError::ResetTokenInvalid);
    }
    if !account.active {
        return Err(ApiError::LoginInactive);
    }
    if !account.set_pwd {
        return Err(ApiError::ResetTokenInvalid);
    }

    let pwd = payload.pwd.unwrap_or_default();
    validate_password(&pwd, payload.confirm_pwd.as_deref().unwrap_or_default())?;
    let hash = PasswordHasher::new(resources.config.auth.pwd_cost)
        .hash(&pwd)
        .await?;

    let login_id = account.id.clone();
    let txn = resources.db.begin().await?;
    let mut model: login::ActiveModel = account.into();
    model.pwd = Set(hash);
    model.set_pwd = Set(false);
    model.updated_at = Set(Some(now));
    model.update(&txn).await?;
    login_reset::Entity::update_many()
        .col_expr(login_reset::Column::UpdatedAt, Expr::value(now))
        .filter(login_reset::Column::LoginId.eq(login_id.as_str()))
        .filter(login_reset::Column::UpdatedAt.is_null())
        .exec(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!(%login_id, "password set through reset token");
    audit::record(
        &resources.config.audit,
        AuditRecord::new(
            "login",
            json!({"id": login_id}),
            Action::Update,
            Some(json!({"set_pwd": true})),
        ),
    );
    Ok(Json(Output::empty()))
}

#[tracing::instrument(skip(resources, email_addr))]
#[utoipa::path(
    get,
    path = "/login/forgot-password/{email_addr}",
    tag = LOGIN_TAG,
    operation_id = "Forgot Password",
    summary = "Email a password reset link",
    description = "Always succeeds for well-formed requests so callers cannot probe which addresses \
                   exist. Active logins receive a new reset token by email; older tokens are retired.",
    params(("email_addr" = String, Path, description = "Email address of the login")),
    responses((status = 200, description = "Request accepted"))
)]
pub async fn forgot_password(
    Extension(resources): Extension<AppResources>,
    Path(email_addr): Path<String>,
) -> Result<Json<Output<()>>, ApiError> {
    let email = require("EmailAddress", Some(email_addr.as_str()), MAX_EMAIL_LEN)?;
    let account = match find_by_email(resources.db.as_ref(), &email).await? {
        Some(account) if account.active => account,
        _ => return Ok(Json(Output::empty())),
    };

    let now = OffsetDateTime::now_utc();
    let token = generate_uuid();
    let txn = resources.db.begin().await?;
    login_reset::Entity::update_many()
        .col_expr(login_reset::Column::UpdatedAt, Expr::value(now))
        .filter(login_reset::Column::LoginId.eq(account.id.as_str()))
        .filter(login_reset::Column::UpdatedAt.is_null())
        .exec(&txn)
        .await?;
    login_reset::ActiveModel {
        login_id: Set(account.id.clone()),
        reset_token: Set(token.clone()),
        created_at: Set(now),
        updated_at: Set(None),
    }
    .insert(&txn)
    .await?;
    let mut model: login::ActiveModel = account.clone().into();
    model.set_pwd = Set(true);
    model.updated_at = Set(Some(now));
    model.update(&txn).await?;
    txn.commit().await?;

    send_reset(&resources, &account.email_addr, &token);
    Ok(Json(Output::empty()))
}

#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/login/sign-in",
    tag = LOGIN_TAG,
    operation_id = "Sign In",
    summary = "Exchange email and password for an access token",
    description = "The token carries the login id as subject and the login's role names in the \
                   `roles` claim.",
    request_body = LoginSignIn,
    responses(
        (status = 200, description = "Signed in", body = Output<SignInToken>),
        (status = 401, description = "Unknown email address or wrong password"),
        (status = 403, description = "Login is not active")
    )
)]
pub async fn sign_in(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<LoginSignIn>,
) -> Result<Json<Output<SignInToken>>, ApiError> {
    let email = require("EmailAddress", payload.email_addr.as_deref(), MAX_EMAIL_LEN)?;
    let pwd = payload
        .pwd
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::missing("Pwd"))?;
    let db = resources.db.as_ref();

    let account = find_by_email(db, &email)
        .await?
        .ok_or(ApiError::EmailPasswordCombo)?;
    let hasher = PasswordHasher::new(resources.config.auth.pwd_cost);
    if !account.has_password() || !hasher.verify(&pwd, &account.pwd).await {
        return Err(ApiError::EmailPasswordCombo);
    }
    if !account.active {
        return Err(ApiError::LoginInactive);
    }

    let roles = role_names(db, &account.id).await?;
    let token = resources.signer.build(&account.id, &roles)?;
    tracing::info!(login_id = %account.id, roles = roles.len(), "login signed in");
    Ok(Json(Output::data(SignInToken { token })))
}
