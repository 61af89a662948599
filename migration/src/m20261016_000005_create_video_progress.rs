use sea_orm_migration::prelude::*;

use crate::m20261016_000001_create_users::Users;
use crate::m20261016_000003_create_videos::Videos;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VideoProgress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VideoProgress::UserId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VideoProgress::VideoId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VideoProgress::Watched)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(VideoProgress::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(VideoProgress::UserId)
                            .col(VideoProgress::VideoId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-video_progress-user_id")
                            .from(VideoProgress::Table, VideoProgress::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-video_progress-video_id")
                            .from(VideoProgress::Table, VideoProgress::VideoId)
                            .to(Videos::Table, Videos::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VideoProgress::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum VideoProgress {
    Table,
    UserId,
    VideoId,
    Watched,
    UpdatedAt,
}
