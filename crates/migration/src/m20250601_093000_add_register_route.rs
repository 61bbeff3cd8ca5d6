//! Route/role registry table. `roles` holds a JSON array of role names.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RegisterRoute::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RegisterRoute::RawPath)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RegisterRoute::TransformedPath)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegisterRoute::Roles)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RegisterRoute::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RegisterRoute {
    Table,
    RawPath,
    TransformedPath,
    Roles,
}
