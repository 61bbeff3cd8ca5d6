//! Login, role and OAuth2 authorization backend.
//!
//! Accounts sign in with bcrypt passwords and receive signed JWTs. Third party
//! clients use the authorization code flow with PKCE and rotating refresh tokens.
//! Every API route is mapped to the roles allowed to call it.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::TokenSigner;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::route::RouteRegistry;

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod mailer;
pub mod response;
pub mod route;
pub mod util;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub signer: Arc<TokenSigner>,
    /// Empty until `api::build_router` has registered every route.
    pub registry: Arc<RouteRegistry>,
    /// `None` when SMTP is not configured; reset emails are then only logged.
    pub mailer: Option<Mailer>,
}

impl AppResources {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        mailer: Option<Mailer>,
    ) -> Result<Self, ApiError> {
        let signer = Arc::new(TokenSigner::from_config(&config.auth)?);
        Ok(Self {
            db,
            config,
            signer,
            registry: Arc::new(RouteRegistry::new()),
            mailer,
        })
    }
}
