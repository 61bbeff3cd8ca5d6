//! Login lifecycle over HTTP: registration, password reset, sign-in.

mod common;

use axum::http::StatusCode;
use common::*;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{Value, json};
use tithe_declare::entity::{login, login_reset};

#[tokio::test]
async fn registration_creates_passwordless_login_with_reset_token() {
    let (server, resources) = test_server().await;
    let login_id = register_login(&server, "alice@example.com").await;

    let stored = login::Entity::find_by_id(login_id.as_str())
        .one(resources.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.active);
    assert!(stored.set_pwd);
    assert!(!stored.has_password());

    let pending = login_reset::Entity::find()
        .filter(login_reset::Column::LoginId.eq(login_id.as_str()))
        .count(resources.db.as_ref())
        .await
        .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let (server, _) = test_server().await;
    register_login(&server, "bob@example.com").await;

    let (name, value) = basic_admin();
    let response = server
        .post("/login")
        .add_header(name, value)
        .json(&json!({"email_addr": "bob@example.com"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["Id"], "duplicate_email");
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let (server, _) = test_server().await;
    let (name, value) = basic_admin();

    let response = server
        .post("/login")
        .add_header(name, value)
        .json(&json!({"email_addr": "not an address"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["Id"], "invalid_email");
}

#[tokio::test]
async fn reset_then_sign_in_returns_token_with_roles() {
    let (server, resources) = test_server().await;
    let login_id = login_with_password(&server, &resources, "carol@example.com").await;
    let role_id = create_role(&server, "treasurer").await;

    let (name, value) = basic_admin();
    server
        .post("/login-role")
        .add_header(name, value)
        .json(&json!({"login_id": login_id, "role_id": role_id}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/login/sign-in")
        .json(&json!({"email_addr": "carol@example.com", "pwd": PASSWORD}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let token = body["data"]["token"].as_str().unwrap();
    let claims = resources.signer.verify(token).unwrap();
    assert_eq!(claims.sub, login_id);
    assert_eq!(claims.roles, vec!["treasurer".to_string()]);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (server, resources) = test_server().await;
    login_with_password(&server, &resources, "dave@example.com").await;

    let response = server
        .post("/login/sign-in")
        .json(&json!({"email_addr": "dave@example.com", "pwd": "Wrong!pass1"}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["Id"], "email_password_combo");
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let (server, resources) = test_server().await;
    let login_id = register_login(&server, "erin@example.com").await;
    let token = pending_reset_token(resources.db.as_ref(), &login_id).await;
    let reset = json!({
        "email_addr": "erin@example.com",
        "reset_token": token,
        "pwd": PASSWORD,
        "confirm_pwd": PASSWORD,
    });

    server.post("/login/reset/pwd").json(&reset).await.assert_status_ok();
    let response = server.post("/login/reset/pwd").json(&reset).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["Id"], "reset_token_invalid");
}

#[tokio::test]
async fn weak_password_lists_every_problem() {
    let (server, resources) = test_server().await;
    let login_id = register_login(&server, "frank@example.com").await;
    let token = pending_reset_token(resources.db.as_ref(), &login_id).await;

    let response = server
        .post("/login/reset/pwd")
        .json(&json!({
            "email_addr": "frank@example.com",
            "reset_token": token,
            "pwd": "short",
            "confirm_pwd": "short",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["Id"], "password_validation");
    let detail = body["error"]["Detail"].as_str().unwrap();
    assert!(detail.contains("8 characters"));
    assert!(detail.contains("uppercase"));
}

#[tokio::test]
async fn forgot_password_retires_old_tokens() {
    let (server, resources) = test_server().await;
    let login_id = login_with_password(&server, &resources, "gina@example.com").await;

    server
        .get("/login/forgot-password/gina@example.com")
        .await
        .assert_status_ok();

    let stored = login::Entity::find_by_id(login_id.as_str())
        .one(resources.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.set_pwd);
    let pending = login_reset::Entity::find()
        .filter(login_reset::Column::LoginId.eq(login_id.as_str()))
        .filter(login_reset::Column::UpdatedAt.is_null())
        .count(resources.db.as_ref())
        .await
        .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn forgot_password_for_unknown_email_still_succeeds() {
    let (server, _) = test_server().await;
    server
        .get("/login/forgot-password/ghost@example.com")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn inactive_login_cannot_sign_in() {
    let (server, resources) = test_server().await;
    let login_id = login_with_password(&server, &resources, "hank@example.com").await;

    let (name, value) = basic_admin();
    server
        .patch("/login")
        .add_header(name, value)
        .json(&json!({"id": login_id, "active": false}))
        .await
        .assert_status_ok();

    let response = server
        .post("/login/sign-in")
        .json(&json!({"email_addr": "hank@example.com", "pwd": PASSWORD}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_login_removes_its_assignments() {
    let (server, resources) = test_server().await;
    let login_id = register_login(&server, "ivy@example.com").await;
    let role_id = create_role(&server, "auditor").await;

    let (name, value) = basic_admin();
    server
        .post("/login-role")
        .add_header(name.clone(), value.clone())
        .json(&json!({"login_id": login_id, "role_id": role_id}))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .delete(&format!("/login/{login_id}"))
        .add_header(name.clone(), value.clone())
        .await
        .assert_status_ok();

    server
        .get(&format!("/login/{login_id}"))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let remaining = tithe_declare::entity::login_role::Entity::find()
        .count(resources.db.as_ref())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn login_list_reports_total() {
    let (server, _) = test_server().await;
    register_login(&server, "a1@example.com").await;
    register_login(&server, "a2@example.com").await;
    register_login(&server, "a3@example.com").await;

    let (name, value) = basic_admin();
    let response = server
        .get("/login")
        .add_query_param("limit", 2)
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["total_count"], 3);
}
