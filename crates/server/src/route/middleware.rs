//! Request gates applied in front of every API route.
//!
//! `require_version` checks the vendor media type in `Accept`, `authorize`
//! resolves the roles a route needs and checks them against the caller.

use crate::auth::signer::TokenSigner;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::route::registry::{DEFAULT_ROLE, RouteRegistry};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Method, header, request::Parts},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

/// Everything the gates need, shared read-only after startup.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub registry: Arc<RouteRegistry>,
    pub signer: Arc<TokenSigner>,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    Basic,
    Bearer,
}

/// Caller identity attached to requests that passed a protected route.
#[derive(Clone, Debug)]
pub struct Identity {
    pub subject: String,
    pub roles: Vec<String>,
    pub method: AuthMethod,
}

/// True when the caller holds at least one of the required roles.
pub fn has_any_role(required: &[String], held: &[String]) -> bool {
    required.iter().any(|r| held.contains(r))
}

/// Version from `application/vnd.<app>.<version>+json`, if one of `known` matches.
pub fn accepted_version(accept: &str, app_name: &str, known: &[String]) -> Option<String> {
    let prefix = format!("application/vnd.{app_name}.");
    accept
        .split(',')
        .map(|part| part.split(';').next().unwrap_or_default().trim())
        .filter_map(|media| media.strip_prefix(&prefix)?.strip_suffix("+json"))
        .find(|version| known.iter().any(|k| k == version))
        .map(str::to_string)
}

pub async fn require_version(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let version = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .and_then(|accept| {
            accepted_version(accept, &state.config.app_name, &state.config.known_versions)
        })
        .ok_or(ApiError::MissingAcceptHeader)?;
    tracing::trace!(%version, "accepted api version");
    Ok(next.run(request).await)
}

pub async fn authorize(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = if request.method() == Method::HEAD {
        Method::GET
    } else {
        request.method().clone()
    };
    let path = request.uri().path().to_string();
    let required = state.registry.roles_for(method.as_str(), &path)?;

    if required.is_empty() {
        return Ok(next.run(request).await);
    }

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let identity = match header_value
        .strip_prefix("Basic ")
        .and_then(|encoded| basic_identity(&state.config, encoded))
    {
        Some(identity) => identity,
        None => bearer_identity(&state.signer, header_value)?,
    };

    if !has_any_role(required, &identity.roles) {
        tracing::info!(
            subject = %identity.subject,
            %method,
            path,
            ?required,
            "caller lacks a required role"
        );
        return Err(ApiError::unauthorized("insufficient role"));
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Basic credentials matching the configured pair act as `admin`.
fn basic_identity(config: &AppConfig, encoded: &str) -> Option<Identity> {
    let user = config.auth.basic_auth_user.as_deref()?;
    let pass = config.auth.basic_auth_pass.as_deref()?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())?;
    match decoded.split_once(':') {
        Some((u, p)) if u == user && p == pass => Some(Identity {
            subject: u.to_string(),
            roles: vec![DEFAULT_ROLE.to_string()],
            method: AuthMethod::Basic,
        }),
        _ => {
            tracing::debug!("basic credentials rejected, trying bearer token");
            None
        }
    }
}

fn bearer_identity(signer: &TokenSigner, header_value: &str) -> Result<Identity, ApiError> {
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let claims = signer.verify(token.trim())?;
    Ok(Identity {
        subject: claims.sub,
        roles: claims.roles,
        method: AuthMethod::Bearer,
    })
}

/// Extractor for handlers behind a protected route.
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| ApiError::unauthorized("no authenticated caller"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn role_intersection() {
        assert!(has_any_role(&roles(&["admin"]), &roles(&["user", "admin"])));
        assert!(!has_any_role(&roles(&["admin"]), &roles(&["user"])));
        assert!(!has_any_role(&roles(&["admin"]), &[]));
        assert!(!has_any_role(&[], &roles(&["admin"])));
    }

    #[test]
    fn version_is_taken_from_vendor_media_type() {
        let known = roles(&["v1", "v2"]);
        assert_eq!(
            accepted_version("application/vnd.tithe-declare.v1+json", "tithe-declare", &known),
            Some("v1".to_string())
        );
        assert_eq!(
            accepted_version(
                "text/html, application/vnd.tithe-declare.v2+json; q=0.9",
                "tithe-declare",
                &known
            ),
            Some("v2".to_string())
        );
    }

    #[test]
    fn unknown_or_foreign_versions_are_rejected() {
        let known = roles(&["v1"]);
        assert_eq!(
            accepted_version("application/vnd.tithe-declare.v9+json", "tithe-declare", &known),
            None
        );
        assert_eq!(
            accepted_version("application/vnd.other.v1+json", "tithe-declare", &known),
            None
        );
        assert_eq!(accepted_version("application/json", "tithe-declare", &known), None);
    }
}
