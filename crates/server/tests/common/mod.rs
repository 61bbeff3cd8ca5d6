//! Shared setup for the HTTP level tests: an in-memory database with all
//! migrations applied and a router built exactly as the server builds it.
#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use migration::MigratorTrait;
use sea_orm::{ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{Value, json};
use std::sync::Arc;
use tithe_declare::AppResources;
use tithe_declare::api::build_router;
use tithe_declare::config::{AppConfig, AuditConfig, AuthConfig, SigningAlg};
use tithe_declare::entity::login_reset;

pub const ACCEPT_V1: &str = "application/vnd.tithe-declare.v1+json";
pub const ADMIN_USER: &str = "root";
pub const ADMIN_PASS: &str = "s3cret-admin";
pub const PASSWORD: &str = "Tithe!2024pass";

pub fn test_config() -> AppConfig {
    AppConfig {
        app_name: "tithe-declare".into(),
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        run_migrations: true,
        known_versions: vec!["v1".into()],
        consent_url: "//localhost/consent".into(),
        reset_url: "http://localhost/reset".into(),
        auth: AuthConfig {
            alg: SigningAlg::HMAC,
            secret: STANDARD.encode("integration-test-hmac-secret"),
            public: None,
            token_ttl_hours: 1,
            authorization_expires_minutes: 60,
            refresh_token_expires: 0,
            pwd_cost: 4,
            reset_duration_days: 7,
            basic_auth_user: Some(ADMIN_USER.into()),
            basic_auth_pass: Some(ADMIN_PASS.into()),
        },
        smtp: None,
        audit: AuditConfig::default(),
    }
}

pub async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("connect");
    migration::Migrator::up(&db, None).await.expect("migrate");
    db
}

pub async fn test_resources(config: AppConfig) -> AppResources {
    let db = Arc::new(test_db().await);
    AppResources::new(db, Arc::new(config), None).expect("resources")
}

/// Server with the versioned `Accept` header set on every request.
pub async fn test_server_with(config: AppConfig) -> (TestServer, AppResources) {
    let resources = test_resources(config).await;
    let router = build_router(resources.clone()).await.expect("router");
    let mut server = TestServer::new(router).expect("server");
    server.add_header(header::ACCEPT, HeaderValue::from_static(ACCEPT_V1));
    (server, resources)
}

pub async fn test_server() -> (TestServer, AppResources) {
    test_server_with(test_config()).await
}

pub fn basic_admin() -> (HeaderName, HeaderValue) {
    let encoded = STANDARD.encode(format!("{ADMIN_USER}:{ADMIN_PASS}"));
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {encoded}")).expect("header"),
    )
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
    )
}

/// Registers a login as admin and returns its id.
pub async fn register_login(server: &TestServer, email: &str) -> String {
    let (name, value) = basic_admin();
    let response = server
        .post("/login")
        .add_header(name, value)
        .json(&json!({"email_addr": email, "first_name": "Test"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["id"].as_str().expect("login id").to_string()
}

/// The unspent reset token the registration or forgot-password flow stored.
pub async fn pending_reset_token(db: &DatabaseConnection, login_id: &str) -> String {
    login_reset::Entity::find()
        .filter(login_reset::Column::LoginId.eq(login_id))
        .filter(login_reset::Column::UpdatedAt.is_null())
        .one(db)
        .await
        .expect("query")
        .expect("pending reset token")
        .reset_token
}

/// Registers a login and sets its password through the reset flow.
pub async fn login_with_password(
    server: &TestServer,
    resources: &AppResources,
    email: &str,
) -> String {
    let login_id = register_login(server, email).await;
    let token = pending_reset_token(resources.db.as_ref(), &login_id).await;
    server
        .post("/login/reset/pwd")
        .json(&json!({
            "email_addr": email,
            "reset_token": token,
            "pwd": PASSWORD,
            "confirm_pwd": PASSWORD,
        }))
        .await
        .assert_status_ok();
    login_id
}

/// Creates a role as admin and returns its id.
pub async fn create_role(server: &TestServer, name: &str) -> String {
    let (header_name, value) = basic_admin();
    let response = server
        .post("/role")
        .add_header(header_name, value)
        .json(&json!({"name": name}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["id"].as_str().expect("role id").to_string()
}
