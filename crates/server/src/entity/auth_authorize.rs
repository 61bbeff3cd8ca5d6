//! One row per authorization attempt. The primary key doubles as the
//! authorization code handed to the client.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "auth_authorize")]
#[schema(as = AuthAuthorize)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub client_id: String,
    pub login_id: String,
    /// PKCE code challenge as sent by the client
    pub verifier: String,
    /// `S256` or `S512`
    pub verifier_encode_method: String,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub redirect_uri: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub authorized_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub auth_code_at: Option<OffsetDateTime>,
    /// Present while the code is redeemable; cleared on exchange
    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub auth_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The code is still inside its redemption window.
    pub fn is_code_fresh(&self, now: OffsetDateTime, lifetime_secs: i64) -> bool {
        match self.auth_code_at {
            Some(issued) => now - issued <= Duration::seconds(lifetime_secs),
            None => false,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.auth_code.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued_at(at: Option<OffsetDateTime>) -> Model {
        let now = OffsetDateTime::now_utc();
        Model {
            id: "code".into(),
            client_id: "client".into(),
            login_id: "login".into(),
            verifier: "challenge".into(),
            verifier_encode_method: "S256".into(),
            state: None,
            scope: None,
            redirect_uri: None,
            authorized_at: Some(now),
            auth_code_at: at,
            auth_code: Some("code".into()),
            created_at: now,
        }
    }

    #[test]
    fn code_is_fresh_up_to_its_lifetime() {
        let issued = OffsetDateTime::now_utc();
        let record = issued_at(Some(issued));
        assert!(record.is_code_fresh(issued, 3600));
        assert!(record.is_code_fresh(issued + Duration::seconds(3600), 3600));
        assert!(!record.is_code_fresh(issued + Duration::seconds(3601), 3600));
    }

    #[test]
    fn code_without_timestamp_is_never_fresh() {
        let record = issued_at(None);
        assert!(!record.is_code_fresh(OffsetDateTime::now_utc(), 3600));
    }
}
