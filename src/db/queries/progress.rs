use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use entity::enrollment::{self, EnrollmentStatus};
use entity::{video, video_progress};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;

use crate::db::pool::Db;
use crate::db::queries::{courses, videos};
use crate::error::AppError;

/// Percentage of watched videos rounded to one decimal. A course without
/// videos is 0.0.
pub fn completion_rate(watched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = watched as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

pub fn format_rate(rate: f64) -> String {
    format!("{rate:.1}")
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VideoWatch {
    pub id: String,
    pub title: String,
    pub watched: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    pub completion_rate: String,
    pub progress: Vec<VideoWatch>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoProgressView {
    pub video_id: String,
    pub watched: bool,
    pub updated_at: Option<NaiveDateTime>,
}

/// Marks a video watched for `user_id`. Creates the progress row or updates
/// the existing one, then refreshes the caller's enrollment aggregate for
/// the video's course. Repeating the call leaves the same state.
pub async fn mark_watched(
    db: &Db,
    user_id: &str,
    video_id: &str,
) -> Result<video_progress::Model, AppError> {
    let txn = db.begin().await?;

    let video = video::Entity::find_by_id(video_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Video"))?;

    let row = video_progress::ActiveModel {
        user_id: Set(user_id.to_string()),
        video_id: Set(video_id.to_string()),
        watched: Set(true),
        updated_at: Set(Utc::now().naive_utc()),
    };
    video_progress::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([video_progress::Column::UserId, video_progress::Column::VideoId])
                .update_columns([video_progress::Column::Watched, video_progress::Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    sync_enrollment(&txn, user_id, &video.course_id).await?;

    let progress = video_progress::Entity::find_by_id((user_id.to_string(), video_id.to_string()))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Internal("progress row missing after upsert".to_string()))?;

    txn.commit().await?;
    Ok(progress)
}

/// Watched/total counts restricted to the course's own videos.
async fn watched_counts<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    course_id: &str,
) -> Result<(usize, usize), AppError> {
    let video_ids = videos::ids_for_course(db, course_id).await?;
    if video_ids.is_empty() {
        return Ok((0, 0));
    }
    let total = video_ids.len();
    let watched = video_progress::Entity::find()
        .filter(video_progress::Column::UserId.eq(user_id))
        .filter(video_progress::Column::Watched.eq(true))
        .filter(video_progress::Column::VideoId.is_in(video_ids))
        .count(db)
        .await?;
    Ok((watched as usize, total))
}

/// Recomputes `progress` and `status` of the enrollment for
/// `(user_id, course_id)`, if one exists.
pub async fn sync_enrollment<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    course_id: &str,
) -> Result<Option<enrollment::Model>, AppError> {
    let Some(existing) = enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let (watched, total) = watched_counts(db, user_id, course_id).await?;
    let percent = completion_rate(watched, total).round() as i32;
    let status = if percent >= 100 {
        EnrollmentStatus::Completed
    } else {
        EnrollmentStatus::Active
    };

    if existing.progress == percent && existing.status == status {
        return Ok(Some(existing));
    }

    let mut active: enrollment::ActiveModel = existing.into();
    active.progress = Set(percent);
    active.status = Set(status);
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(Some(active.update(db).await?))
}

/// Per-video watched flags for every video currently in the course, oldest
/// video first, plus the completion rate over that set.
pub async fn course_progress<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    course_id: &str,
) -> Result<CourseProgress, AppError> {
    let course = courses::get(db, course_id).await?;

    let course_videos = video::Entity::find()
        .filter(video::Column::CourseId.eq(&course.id))
        .order_by_asc(video::Column::CreatedAt)
        .order_by_asc(video::Column::Id)
        .all(db)
        .await?;

    let watched: HashMap<String, bool> = if course_videos.is_empty() {
        HashMap::new()
    } else {
        video_progress::Entity::find()
            .filter(video_progress::Column::UserId.eq(user_id))
            .filter(video_progress::Column::VideoId.is_in(course_videos.iter().map(|v| v.id.clone())))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.video_id, p.watched))
            .collect()
    };

    let progress: Vec<VideoWatch> = course_videos
        .into_iter()
        .map(|v| VideoWatch {
            watched: watched.get(&v.id).copied().unwrap_or(false),
            id: v.id,
            title: v.title,
        })
        .collect();

    let watched_count = progress.iter().filter(|p| p.watched).count();
    let rate = completion_rate(watched_count, progress.len());

    Ok(CourseProgress {
        course_id: course.id,
        completion_rate: format_rate(rate),
        progress,
    })
}

pub async fn video_progress<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    video_id: &str,
) -> Result<VideoProgressView, AppError> {
    videos::find_by_id(db, video_id)
        .await?
        .ok_or(AppError::NotFound("Video"))?;

    let row = video_progress::Entity::find_by_id((user_id.to_string(), video_id.to_string()))
        .one(db)
        .await?;

    Ok(VideoProgressView {
        video_id: video_id.to_string(),
        watched: row.as_ref().is_some_and(|r| r.watched),
        updated_at: row.map(|r| r.updated_at),
    })
}
