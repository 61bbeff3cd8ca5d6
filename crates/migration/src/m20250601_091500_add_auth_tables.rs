//! Creates the OAuth2 tables:
//! - auth_client: registered clients
//! - auth_client_callback: allow-listed redirect targets per client
//! - auth_client_secret: confidential client secrets
//! - auth_authorize: one row per authorization attempt, the id is the code
//! - auth_refresh: refresh tokens, stored as SHA-256 hex digests

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthClient::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthClient::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthClient::Name).string_len(100).not_null())
                    .col(ColumnDef::new(AuthClient::Description).string_len(1000).null())
                    .col(
                        ColumnDef::new(AuthClient::HomepageUrl)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthClient::CallbackUrl)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthClient::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthClientCallback::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthClientCallback::ClientId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthClientCallback::CallbackUrl)
                            .string_len(500)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(AuthClientCallback::ClientId)
                            .col(AuthClientCallback::CallbackUrl),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthClientSecret::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthClientSecret::ClientId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthClientSecret::Secret).string().not_null())
                    .col(
                        ColumnDef::new(AuthClientSecret::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AuthClientSecret::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(AuthClientSecret::ClientId)
                            .col(AuthClientSecret::Secret),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthAuthorize::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthAuthorize::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthAuthorize::ClientId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthAuthorize::LoginId).string().not_null())
                    .col(ColumnDef::new(AuthAuthorize::Verifier).string().not_null())
                    .col(
                        ColumnDef::new(AuthAuthorize::VerifierEncodeMethod)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthAuthorize::State).string().null())
                    .col(ColumnDef::new(AuthAuthorize::Scope).string().null())
                    .col(ColumnDef::new(AuthAuthorize::RedirectUri).string_len(500).null())
                    .col(
                        ColumnDef::new(AuthAuthorize::AuthorizedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthAuthorize::AuthCodeAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(AuthAuthorize::AuthCode).string().null())
                    .col(
                        ColumnDef::new(AuthAuthorize::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthRefresh::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthRefresh::ClientId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthRefresh::Token).string_len(64).not_null())
                    .col(
                        ColumnDef::new(AuthRefresh::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AuthRefresh::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(AuthRefresh::ClientId)
                            .col(AuthRefresh::Token),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_auth_refresh_client_active")
                    .table(AuthRefresh::Table)
                    .col(AuthRefresh::ClientId)
                    .col(AuthRefresh::Active)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_auth_refresh_client_active")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(AuthRefresh::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthAuthorize::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthClientSecret::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthClientCallback::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthClient::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum AuthClient {
    Table,
    Id,
    Name,
    Description,
    HomepageUrl,
    CallbackUrl,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AuthClientCallback {
    Table,
    ClientId,
    CallbackUrl,
}

#[derive(DeriveIden)]
enum AuthClientSecret {
    Table,
    ClientId,
    Secret,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AuthAuthorize {
    Table,
    Id,
    ClientId,
    LoginId,
    Verifier,
    VerifierEncodeMethod,
    State,
    Scope,
    RedirectUri,
    AuthorizedAt,
    AuthCodeAt,
    AuthCode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AuthRefresh {
    Table,
    ClientId,
    Token,
    Active,
    CreatedAt,
}
