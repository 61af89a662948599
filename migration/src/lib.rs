pub use sea_orm_migration::prelude::*;

mod m20261016_000001_create_users;
mod m20261016_000002_create_courses;
mod m20261016_000003_create_videos;
mod m20261016_000004_create_enrollments;
mod m20261016_000005_create_video_progress;
mod m20261016_000007_create_mock_attempts;
mod m20261016_000008_create_certificates;
mod m20261016_000009_create_revoked_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261016_000001_create_users::Migration),
            Box::new(m20261016_000002_create_courses::Migration),
            Box::new(m20261016_000003_create_videos::Migration),
            Box::new(m20261016_000004_create_enrollments::Migration),
            Box::new(m20261016_000005_create_video_progress::Migration),
            Box::new(m20261016_000006_create_mock_tests::Migration),
            Box::new(m20261016_000007_create_mock_attempts::Migration),
            Box::new(m20261016_000008_create_certificates::Migration),
            Box::new(m20261016_000009_create_revoked_tokens::Migration),
        ]
    }
}
