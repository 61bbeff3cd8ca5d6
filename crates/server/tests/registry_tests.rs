//! Route registry bootstrap and route role administration.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{Value, json};
use tithe_declare::api::build_router;
use tithe_declare::entity::register_route;
use tithe_declare::route::RouteRegistry;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn build_router_persists_every_route_once() {
    let resources = test_resources(test_config()).await;
    build_router(resources.clone()).await.unwrap();
    let first = register_route::Entity::find()
        .count(resources.db.as_ref())
        .await
        .unwrap();
    assert!(first > 20);

    // a restart registers nothing new
    build_router(resources.clone()).await.unwrap();
    let second = register_route::Entity::find()
        .count(resources.db.as_ref())
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn public_and_admin_defaults() {
    let resources = test_resources(test_config()).await;
    build_router(resources.clone()).await.unwrap();
    let registry = RouteRegistry::load(resources.db.as_ref()).await.unwrap();

    assert!(registry.roles_for("POST", "/login/sign-in").unwrap().is_empty());
    assert!(
        registry
            .roles_for("GET", "/login/forgot-password/a@b.c")
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        registry.roles_for("GET", "/role/abc").unwrap(),
        ["admin".to_string()]
    );
    assert!(registry.roles_for("GET", "/unknown").is_err());
}

#[tokio::test]
async fn stored_roles_survive_restart() {
    let resources = test_resources(test_config()).await;
    let router = build_router(resources.clone()).await.unwrap();
    let mut server = axum_test::TestServer::new(router).unwrap();
    server.add_header(
        axum::http::header::ACCEPT,
        axum::http::HeaderValue::from_static(ACCEPT_V1),
    );
    let (name, value) = basic_admin();

    server
        .patch("/register-route")
        .add_header(name, value)
        .json(&json!({"raw_path": "GET/role", "roles": []}))
        .await
        .assert_status_ok();

    // the running server still uses its startup snapshot
    server.get("/role").await.assert_status(StatusCode::UNAUTHORIZED);

    let restarted = axum_test::TestServer::new(build_router(resources).await.unwrap()).unwrap();
    restarted
        .get("/role")
        .add_header(
            axum::http::header::ACCEPT,
            axum::http::HeaderValue::from_static(ACCEPT_V1),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn route_can_be_fetched_by_raw_path() {
    let (server, _) = test_server().await;
    let (name, value) = basic_admin();

    let response = server
        .get("/register-route/GET%2Frole%2F:id")
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["raw_path"], "GET/role/:id");
    assert_eq!(body["data"]["transformed_path"], "GET/role/.+");
}

#[tokio::test]
async fn bulk_adds_and_removes_roles() {
    let (server, resources) = test_server().await;
    let (name, value) = basic_admin();

    let response = server
        .post("/register-route/bulk")
        .add_header(name.clone(), value.clone())
        .json(&json!({
            "raw_paths": ["GET/role", "GET/role/:id", ""],
            "add_roles": ["auditor"],
            "remove_roles": ["admin"],
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["meta"]["total_count"], 2);

    let registry = RouteRegistry::load(resources.db.as_ref()).await.unwrap();
    assert_eq!(
        registry.roles_for("GET", "/role").unwrap(),
        ["auditor".to_string()]
    );

    server
        .post("/register-route/bulk")
        .add_header(name.clone(), value.clone())
        .json(&json!({"raw_paths": ["GET/nowhere"], "add_roles": ["x"]}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post("/register-route/bulk")
        .add_header(name, value)
        .json(&json!({"raw_paths": [], "add_roles": ["x"]}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
