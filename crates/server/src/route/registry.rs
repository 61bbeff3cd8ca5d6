//! Route/role registry.
//!
//! Every API route is registered once while the router is assembled. Unknown
//! routes are persisted with the default `["admin"]` role list, or with no
//! roles when they are on the public allow-list. After startup the registry is
//! shared read-only behind an `Arc`; role edits made through the API are
//! persisted and take effect on the next start.

use crate::entity::register_route::{self, encode_roles};
use crate::error::ApiError;
use regex::Regex;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use std::collections::BTreeMap;

/// Routes reachable without any role.
pub const INSECURE_ROUTES: &[&str] = &[
    "POST/login/reset/pwd",
    "GET/login/forgot-password/:email_addr",
    "POST/login/sign-in",
    "POST/login/oauth2/authorize",
    "POST/login/oauth2/verify-consent",
    "GET/auth/oauth2/authorize",
    "POST/auth/oauth2/verify-consent",
    "POST/auth/oauth2/sign-in",
    "POST/auth/oauth2/token-exchange",
];

pub const DEFAULT_ROLE: &str = "admin";
pub const MAX_PATH_LEN: usize = 255;

/// `METHOD/path`, adding the leading slash when missing.
pub fn normalize_path(method: &str, path: &str) -> String {
    let method = method.to_ascii_uppercase();
    if path.is_empty() {
        format!("{method}/")
    } else if path.starts_with('/') {
        format!("{method}{path}")
    } else {
        format!("{method}/{path}")
    }
}

/// Replaces each `:param` segment with `.+` and escapes the literal ones.
pub fn transform_path_to_regex(raw_path: &str) -> String {
    raw_path
        .split('/')
        .map(|segment| {
            if segment.starts_with(':') {
                ".+".to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn default_roles_for(raw_path: &str) -> Vec<String> {
    if INSECURE_ROUTES.contains(&raw_path) {
        Vec::new()
    } else {
        vec![DEFAULT_ROLE.to_string()]
    }
}

#[derive(Debug, Clone)]
struct RouteEntry {
    pattern: Regex,
    literal_segments: usize,
    roles: Vec<String>,
}

impl RouteEntry {
    fn from_row(row: &register_route::Model) -> Option<Self> {
        match Regex::new(&format!("^{}$", row.transformed_path)) {
            Ok(pattern) => Some(Self {
                pattern,
                literal_segments: row
                    .raw_path
                    .split('/')
                    .filter(|s| !s.starts_with(':'))
                    .count(),
                roles: row.roles_list(),
            }),
            Err(e) => {
                tracing::error!(raw_path = %row.raw_path, error = %e, "unusable route pattern, skipping");
                None
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RouteRegistry {
    entries: BTreeMap<String, RouteEntry>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every persisted route.
    pub async fn load(db: &DatabaseConnection) -> Result<Self, ApiError> {
        let mut registry = Self::new();
        registry.refresh(db).await?;
        Ok(registry)
    }

    /// Rebuilds the map from storage.
    pub async fn refresh(&mut self, db: &DatabaseConnection) -> Result<(), ApiError> {
        let rows = register_route::Entity::find().all(db).await?;
        self.entries = rows
            .iter()
            .filter_map(|row| RouteEntry::from_row(row).map(|e| (row.raw_path.clone(), e)))
            .collect();
        Ok(())
    }

    /// Persists a route the first time it is seen. Known routes keep their stored roles.
    pub async fn register(
        &mut self,
        db: &DatabaseConnection,
        method: &str,
        path: &str,
    ) -> Result<(), ApiError> {
        let raw_path = normalize_path(method, path);
        if self.entries.contains_key(&raw_path) {
            return Ok(());
        }
        let transformed_path = transform_path_to_regex(&raw_path);
        if transformed_path.len() > MAX_PATH_LEN {
            return Err(ApiError::length("TransformedPath", MAX_PATH_LEN));
        }
        let roles = default_roles_for(&raw_path);
        register_route::ActiveModel {
            raw_path: Set(raw_path.clone()),
            transformed_path: Set(transformed_path),
            roles: Set(encode_roles(&roles)),
        }
        .insert(db)
        .await?;
        tracing::debug!(%raw_path, ?roles, "registered route");
        self.refresh(db).await
    }

    /// Roles required for a request. An exact raw-path match wins; otherwise
    /// the matching pattern with the most literal segments is used.
    pub fn roles_for(&self, method: &str, path: &str) -> Result<&[String], ApiError> {
        let key = normalize_path(method, path);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(&entry.roles);
        }
        self.entries
            .values()
            .filter(|entry| entry.pattern.is_match(&key))
            .max_by_key(|entry| entry.literal_segments)
            .map(|entry| entry.roles.as_slice())
            .ok_or(ApiError::MissingRoute(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
