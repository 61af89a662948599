use sea_orm_migration::prelude::*;

use crate::m20261016_000001_create_users::Users;
use crate::m20261016_000002_create_courses::Courses;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Certificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Certificates::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Certificates::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(Certificates::CourseId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Certificates::Grade).string_len(32).not_null())
                    .col(ColumnDef::new(Certificates::FileUrl).text().not_null())
                    .col(
                        ColumnDef::new(Certificates::IssuedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-certificates-user_id")
                            .from(Certificates::Table, Certificates::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-certificates-course_id")
                            .from(Certificates::Table, Certificates::CourseId)
                            .to(Courses::Table, Courses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq-certificates-user_id-course_id")
                    .table(Certificates::Table)
                    .col(Certificates::UserId)
                    .col(Certificates::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Certificates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Certificates {
    Table,
    Id,
    UserId,
    CourseId,
    Grade,
    FileUrl,
    IssuedAt,
}
