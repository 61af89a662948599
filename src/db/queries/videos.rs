use chrono::Utc;
use entity::{course, video, video_progress};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::db::pagination::PageRequest;
use crate::db::pool::Db;
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub course_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub link: String,
    pub img: Option<String>,
    pub description: String,
    pub views: i64,
    pub course_id: String,
}

/// A video together with the course it belongs to. Videos carry no owner
/// column, so every mutation path derives ownership from here.
#[derive(Debug, Clone)]
pub struct OwnedVideo {
    pub video: video::Model,
    pub course: course::Model,
}

impl OwnedVideo {
    pub fn owner_id(&self) -> &str {
        &self.course.teacher_id
    }
}

pub async fn effective_owner<C: ConnectionTrait>(db: &C, video_id: &str) -> Result<OwnedVideo, AppError> {
    let (video, course) = video::Entity::find_by_id(video_id)
        .find_also_related(course::Entity)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Video"))?;
    let course = course.ok_or(AppError::NotFound("Course"))?;
    Ok(OwnedVideo { video, course })
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    filter: &VideoFilter,
    page: PageRequest,
) -> Result<(Vec<video::Model>, u64), AppError> {
    let mut find = video::Entity::find();

    if let Some(course_id) = filter.course_id.as_deref().filter(|s| !s.is_empty()) {
        find = find.filter(video::Column::CourseId.eq(course_id));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        find = find.filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(video::Column::Title))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(video::Column::Description))).like(pattern)),
        );
    }

    let paginator = find
        .order_by_desc(video::Column::CreatedAt)
        .order_by_asc(video::Column::Id)
        .paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.index()).await?;
    Ok((items, total))
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: &str) -> Result<Option<video::Model>, AppError> {
    Ok(video::Entity::find_by_id(id).one(db).await?)
}

/// Videos of a course, newest first.
pub async fn list_for_course<C: ConnectionTrait>(
    db: &C,
    course_id: &str,
) -> Result<Vec<video::Model>, AppError> {
    Ok(video::Entity::find()
        .filter(video::Column::CourseId.eq(course_id))
        .order_by_desc(video::Column::CreatedAt)
        .order_by_asc(video::Column::Id)
        .all(db)
        .await?)
}

pub async fn ids_for_course<C: ConnectionTrait>(db: &C, course_id: &str) -> Result<Vec<String>, AppError> {
    Ok(video::Entity::find()
        .select_only()
        .column(video::Column::Id)
        .filter(video::Column::CourseId.eq(course_id))
        .into_tuple()
        .all(db)
        .await?)
}

pub async fn insert<C: ConnectionTrait>(db: &C, new: NewVideo) -> Result<video::Model, AppError> {
    let now = Utc::now().naive_utc();
    let model = video::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        title: Set(new.title),
        link: Set(new.link),
        img: Set(new.img),
        description: Set(new.description),
        views: Set(new.views),
        course_id: Set(new.course_id),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

pub async fn update<C: ConnectionTrait>(
    db: &C,
    mut active: video::ActiveModel,
) -> Result<video::Model, AppError> {
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

/// Deletes a video and its progress rows together.
pub async fn delete_with_progress(db: &Db, video_id: &str) -> Result<(), AppError> {
    let txn = db.begin().await?;

    video_progress::Entity::delete_many()
        .filter(video_progress::Column::VideoId.eq(video_id))
        .exec(&txn)
        .await?;
    let deleted = video::Entity::delete_by_id(video_id).exec(&txn).await?;
    if deleted.rows_affected == 0 {
        return Err(AppError::NotFound("Video"));
    }

    txn.commit().await?;
    Ok(())
}

pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, AppError> {
    Ok(video::Entity::find().count(db).await?)
}
