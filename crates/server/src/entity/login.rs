//! Login entity - an identity that can sign in.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "login")]
#[schema(as = Login)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub email_addr: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// bcrypt hash, empty until the owner sets a password
    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub pwd: String,
    pub active: bool,
    /// Password must be (re)set through the reset flow before sign-in
    pub set_pwd: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn has_password(&self) -> bool {
        !self.pwd.is_empty()
    }
}
