pub use sea_orm_migration::prelude::*;

mod m20250601_090000_add_login_tables;
mod m20250601_091500_add_auth_tables;
mod m20250601_093000_add_register_route;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_090000_add_login_tables::Migration),
            Box::new(m20250601_091500_add_auth_tables::Migration),
            Box::new(m20250601_093000_add_register_route::Migration),
        ]
    }
}
