//! Creates the identity tables: logins, their password reset tokens, roles and
//! the login/role join table.
//!
//! `login.email_addr` is indexed but not unique; uniqueness is checked
//! by the service before insert.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Login::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Login::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Login::EmailAddr).string_len(100).not_null())
                    .col(ColumnDef::new(Login::FirstName).string_len(50).null())
                    .col(ColumnDef::new(Login::LastName).string_len(100).null())
                    .col(
                        ColumnDef::new(Login::Pwd)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Login::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Login::SetPwd)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Login::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Login::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_login_email_addr")
                    .table(Login::Table)
                    .col(Login::EmailAddr)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LoginReset::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LoginReset::LoginId).string().not_null())
                    .col(ColumnDef::new(LoginReset::ResetToken).string().not_null())
                    .col(
                        ColumnDef::new(LoginReset::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginReset::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(LoginReset::LoginId)
                            .col(LoginReset::ResetToken),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Role::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Role::Id).string_len(12).not_null().primary_key())
                    .col(
                        ColumnDef::new(Role::Name)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Role::Description).string_len(1000).null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LoginRole::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LoginRole::LoginId).string().not_null())
                    .col(ColumnDef::new(LoginRole::RoleId).string_len(12).not_null())
                    .primary_key(
                        Index::create()
                            .col(LoginRole::LoginId)
                            .col(LoginRole::RoleId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoginRole::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Role::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LoginReset::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_login_email_addr").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Login::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Login {
    Table,
    Id,
    EmailAddr,
    FirstName,
    LastName,
    Pwd,
    Active,
    SetPwd,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LoginReset {
    Table,
    LoginId,
    ResetToken,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Role {
    Table,
    Id,
    Name,
    Description,
}

#[derive(DeriveIden)]
enum LoginRole {
    Table,
    LoginId,
    RoleId,
}
