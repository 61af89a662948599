use chrono::Utc;
use entity::enrollment::{self, EnrollmentStatus};
use entity::course;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::db::pool::Db;
use crate::db::queries::{courses, progress};
use crate::error::{is_unique_violation, AppError};

/// Enrolls `user_id` in `course_id`. The `(user_id, course_id)` unique
/// index decides duplicates, so two racing requests still yield one row.
/// The initial progress reflects videos already watched.
pub async fn enroll(db: &Db, user_id: &str, course_id: &str) -> Result<enrollment::Model, AppError> {
    let txn = db.begin().await?;

    courses::get(&txn, course_id).await?;

    let now = Utc::now().naive_utc();
    let model = enrollment::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(user_id.to_string()),
        course_id: Set(course_id.to_string()),
        progress: Set(0),
        status: Set(EnrollmentStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let created = model.insert(&txn).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyEnrolled
        } else {
            AppError::Database(e)
        }
    })?;

    let synced = progress::sync_enrollment(&txn, user_id, course_id)
        .await?
        .unwrap_or(created);

    txn.commit().await?;
    Ok(synced)
}

pub async fn find<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    course_id: &str,
) -> Result<Option<enrollment::Model>, AppError> {
    Ok(enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .one(db)
        .await?)
}

pub async fn list_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> Result<Vec<enrollment::Model>, AppError> {
    Ok(enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .order_by_desc(enrollment::Column::CreatedAt)
        .all(db)
        .await?)
}

/// The caller's enrollments joined with their courses.
pub async fn enrolled_courses<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> Result<Vec<(enrollment::Model, course::Model)>, AppError> {
    let rows = enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .find_also_related(course::Entity)
        .order_by_desc(enrollment::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(e, c)| c.map(|c| (e, c)))
        .collect())
}

pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, AppError> {
    Ok(enrollment::Entity::find().count(db).await?)
}

pub async fn count_for_courses<C: ConnectionTrait>(db: &C, course_ids: &[String]) -> Result<u64, AppError> {
    if course_ids.is_empty() {
        return Ok(0);
    }
    Ok(enrollment::Entity::find()
        .filter(enrollment::Column::CourseId.is_in(course_ids.iter().cloned()))
        .count(db)
        .await?)
}
