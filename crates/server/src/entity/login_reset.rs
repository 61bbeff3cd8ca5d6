//! Password reset tokens. A token is spent once `updated_at` is set.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "login_reset")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub login_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub reset_token: String,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_spent(&self) -> bool {
        self.updated_at.is_some()
    }

    pub fn is_expired(&self, now: OffsetDateTime, valid_days: i64) -> bool {
        now > self.created_at + Duration::days(valid_days)
    }
}
