//! Route/role mapping rows backing the in-memory route registry.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "register_route")]
#[schema(as = RegisterRoute)]
pub struct Model {
    /// `METHOD/path/with/:params`
    #[sea_orm(primary_key, auto_increment = false)]
    pub raw_path: String,
    /// `raw_path` with each `:param` segment replaced by `.+`
    pub transformed_path: String,
    /// JSON array of role names
    pub roles: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn roles_list(&self) -> Vec<String> {
        serde_json::from_str(&self.roles).unwrap_or_default()
    }
}

/// Serialize a role list the way it is stored.
pub fn encode_roles(roles: &[String]) -> String {
    serde_json::to_string(roles).unwrap_or_else(|_| "[]".to_string())
}
