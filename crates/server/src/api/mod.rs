//! HTTP surface.
//!
//! - `oauth` - OAuth2 authorization code flow (/auth/oauth2/*)
//! - `login`, `login_role`, `role` - identities and their roles
//! - `auth_client*`, `auth_authorize`, `auth_refresh` - OAuth2 client administration
//! - `register_route` - route to role mappings
//! - `health` - /status and /liveness
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod auth_authorize;
pub mod auth_client;
pub mod auth_client_callback;
pub mod auth_client_secret;
pub mod auth_refresh;
pub mod health;
pub mod login;
pub mod login_role;
pub mod oauth;
pub mod openapi;
pub mod register_route;
pub mod role;

use crate::AppResources;
use crate::error::ApiError;
use crate::route::{AuthState, RouteRegistry, middleware as gates};
use axum::{
    Extension, Json, Router,
    extract::{FromRequest, Request},
    middleware,
};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QuerySelect, Select};
use serde::{Deserialize, de::DeserializeOwned};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Paging for list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct Page {
    /// Defaults to 100, capped at 1000
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Page {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

/// One page of `select` plus the total number of matching rows.
pub async fn fetch_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    page: &Page,
) -> Result<(Vec<E::Model>, u64), ApiError>
where
    E: EntityTrait,
    E::Model: Send + Sync,
{
    let total = select.clone().count(db).await?;
    let rows = select
        .limit(page.limit())
        .offset(page.offset())
        .all(db)
        .await?;
    Ok((rows, total))
}

/// JSON body whose rejections render as the API error envelope.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Payload(value))
            .map_err(|e| ApiError::Parse(e.body_text()))
    }
}

/// `{name}` path segments in router syntax become `:name` route keys.
pub fn to_route_key(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            match segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
            {
                Some(name) => format!(":{name}"),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Every (method, route key) pair the document describes.
pub fn documented_routes(api: &utoipa::openapi::OpenApi) -> Vec<(&'static str, String)> {
    let mut routes = Vec::new();
    for (path, item) in &api.paths.paths {
        let key = to_route_key(path);
        let methods = [
            ("GET", item.get.is_some()),
            ("POST", item.post.is_some()),
            ("PUT", item.put.is_some()),
            ("PATCH", item.patch.is_some()),
            ("DELETE", item.delete.is_some()),
        ];
        for (method, present) in methods {
            if present {
                routes.push((method, key.clone()));
            }
        }
    }
    routes
}

fn api_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(oauth::router())
        .merge(login::router())
        .merge(role::router())
        .merge(login_role::router())
        .merge(auth_client::router())
        .merge(auth_client_callback::router())
        .merge(auth_client_secret::router())
        .merge(auth_authorize::router())
        .merge(auth_refresh::router())
        .merge(register_route::router())
}

/// Assembles the application.
///
/// Every documented API route is registered with the route registry before
/// the registry is frozen and handed to the authorization gate.
#[tracing::instrument(skip_all)]
pub async fn build_router(resources: AppResources) -> Result<Router, ApiError> {
    let (router, mut api) = api_router().split_for_parts();

    let mut registry = RouteRegistry::load(resources.db.as_ref()).await?;
    for (method, path) in documented_routes(&api) {
        registry
            .register(resources.db.as_ref(), method, &path)
            .await?;
    }
    tracing::info!(routes = registry.len(), "route registry ready");
    let registry = Arc::new(registry);

    let resources = AppResources {
        registry: registry.clone(),
        ..resources
    };
    let auth_state = AuthState {
        registry,
        signer: resources.signer.clone(),
        config: resources.config.clone(),
    };

    let (health_router, health_api) = OpenApiRouter::new()
        .routes(routes!(health::status))
        .routes(routes!(health::liveness))
        .split_for_parts();
    api.merge(health_api);

    let router = router
        // runs after the version gate
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            gates::authorize,
        ))
        .layer(middleware::from_fn_with_state(
            auth_state,
            gates::require_version,
        ))
        .merge(health_router)
        .merge(Redoc::with_url("/api-docs", api))
        .layer(Extension(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());
    Ok(router)
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(resources))]
pub async fn start_webserver(resources: AppResources) -> color_eyre::Result<()> {
    let addr = resources.config.listen_addr.clone();
    let router = build_router(resources)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to build router: {e}")))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "server running");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    tracing::info!("server stopped");
    Ok(())
}

/// Waits for SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_keys_use_colon_params() {
        assert_eq!(to_route_key("/role/{id}"), "/role/:id");
        assert_eq!(
            to_route_key("/login-role/{login_id}/role_id/{role_id}"),
            "/login-role/:login_id/role_id/:role_id"
        );
        assert_eq!(to_route_key("/login/sign-in"), "/login/sign-in");
    }

    #[test]
    fn every_api_route_is_documented() {
        let (_, api) = api_router().split_for_parts();
        let routes = documented_routes(&api);
        assert!(routes.contains(&("GET", "/role/:id".to_string())));
        assert!(routes.contains(&("POST", "/login/sign-in".to_string())));
        assert!(routes.contains(&("POST", "/auth/oauth2/token-exchange".to_string())));
        assert!(routes.contains(&("GET", "/login/forgot-password/:email_addr".to_string())));
        assert!(!routes.iter().any(|(_, p)| p == "/status"));
    }

    #[test]
    fn page_is_clamped() {
        let page = Page {
            limit: Some(5000),
            offset: None,
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
        assert_eq!(Page::default().limit(), DEFAULT_PAGE_SIZE);
    }
}
