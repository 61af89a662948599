use sea_orm_migration::prelude::*;

use crate::m20261016_000001_create_users::Users;
use crate::m20261016_000006_create_mock_tests::MockTests;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MockAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MockAttempts::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MockAttempts::UserId).string_len(36).not_null())
                    .col(ColumnDef::new(MockAttempts::TestId).string_len(36).not_null())
                    .col(ColumnDef::new(MockAttempts::Score).integer().not_null())
                    .col(
                        ColumnDef::new(MockAttempts::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MockAttempts::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-mock_attempts-user_id")
                            .from(MockAttempts::Table, MockAttempts::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-mock_attempts-test_id")
                            .from(MockAttempts::Table, MockAttempts::TestId)
                            .to(MockTests::Table, MockTests::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq-mock_attempts-user_id-test_id")
                    .table(MockAttempts::Table)
                    .col(MockAttempts::UserId)
                    .col(MockAttempts::TestId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MockAttempts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MockAttempts {
    Table,
    Id,
    UserId,
    TestId,
    Score,
    CreatedAt,
    UpdatedAt,
}
