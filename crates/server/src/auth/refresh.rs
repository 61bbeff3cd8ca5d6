//! Refresh token rotation.
//!
//! Tokens are handed to clients in plaintext and stored as hex SHA-256 digests.
//! Each rotation deactivates every active token of the client and inserts the
//! replacement inside one transaction, so a client never has two active tokens.

use crate::entity::auth_refresh;
use crate::error::ApiError;
use crate::util::generate_random_string;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, TransactionTrait,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

pub const REFRESH_TOKEN_LEN: usize = 32;

/// When an existing refresh token gets replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Tokens never expire and are never rotated.
    Never,
    /// Every use rotates the token.
    Always,
    /// Tokens older than this are rotated on use.
    After(Duration),
}

impl RefreshPolicy {
    /// `-1` never, `0` always, `n > 0` after `n` seconds.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s < 0 => RefreshPolicy::Never,
            0 => RefreshPolicy::Always,
            s => RefreshPolicy::After(Duration::seconds(s)),
        }
    }

    fn keeps(&self, created_at: OffsetDateTime, now: OffsetDateTime) -> bool {
        match self {
            RefreshPolicy::Never => true,
            RefreshPolicy::Always => false,
            RefreshPolicy::After(ttl) => created_at + *ttl > now,
        }
    }
}

/// Hex SHA-256 digest, the at-rest form of a refresh token.
pub fn hash_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[derive(Clone, Debug)]
pub struct RefreshRotator {
    db: Arc<DatabaseConnection>,
    policy: RefreshPolicy,
}

impl RefreshRotator {
    pub fn new(db: Arc<DatabaseConnection>, policy: RefreshPolicy) -> Self {
        Self { db, policy }
    }

    /// Looks up a presented token for `client_id`.
    pub async fn find(
        &self,
        client_id: &str,
        token: &str,
    ) -> Result<Option<auth_refresh::Model>, ApiError> {
        Ok(
            auth_refresh::Entity::find_by_id((client_id.to_string(), hash_token(token)))
                .one(self.db.as_ref())
                .await?,
        )
    }

    /// Issues the first refresh token for a client, retiring any it already had.
    pub async fn issue(&self, client_id: &str) -> Result<String, ApiError> {
        let txn = self.db.begin().await?;
        let token = self.issue_in(&txn, client_id).await?;
        txn.commit().await?;
        Ok(token)
    }

    /// Like [`RefreshRotator::issue`], inside a transaction owned by the caller.
    /// Nothing is stored unless the caller commits.
    pub async fn issue_in(
        &self,
        txn: &DatabaseTransaction,
        client_id: &str,
    ) -> Result<String, ApiError> {
        let token = replace_active(txn, client_id).await?;
        tracing::debug!(client_id, "issued refresh token");
        Ok(token)
    }

    /// Cycles a presented token according to the policy.
    ///
    /// Returns the presented token unchanged when the policy keeps it, or a
    /// fresh one after rotation. A token that is no longer active fails as a
    /// replay.
    pub async fn cycle(&self, client_id: &str, existing: &str) -> Result<String, ApiError> {
        let txn = self.db.begin().await?;

        let current = auth_refresh::Entity::find_by_id((client_id.to_string(), hash_token(existing)))
            .one(&txn)
            .await?;
        let current = match current {
            Some(row) if row.active => row,
            _ => {
                tracing::warn!(client_id, "refresh token replayed or unknown");
                return Err(ApiError::general("duplicate"));
            }
        };

        if self.policy.keeps(current.created_at, OffsetDateTime::now_utc()) {
            return Ok(existing.to_string());
        }

        let token = replace_active(&txn, client_id).await?;
        txn.commit().await?;
        tracing::debug!(client_id, "rotated refresh token");
        Ok(token)
    }
}

/// Deactivates every active token of `client_id` and stores a new one.
async fn replace_active(txn: &DatabaseTransaction, client_id: &str) -> Result<String, ApiError> {
    auth_refresh::Entity::update_many()
        .col_expr(auth_refresh::Column::Active, Expr::value(false))
        .filter(auth_refresh::Column::ClientId.eq(client_id))
        .filter(auth_refresh::Column::Active.eq(true))
        .exec(txn)
        .await?;

    let token = generate_random_string(REFRESH_TOKEN_LEN);
    auth_refresh::ActiveModel {
        client_id: Set(client_id.to_string()),
        token: Set(hash_token(&token)),
        active: Set(true),
        created_at: Set(OffsetDateTime::now_utc()),
    }
    .insert(txn)
    .await?;
    Ok(token)
}
