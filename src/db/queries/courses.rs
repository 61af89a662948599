use std::collections::HashMap;

use chrono::Utc;
use entity::{certificate, course, enrollment, mock_attempt, mock_test, user, video, video_progress};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::policy::OwnerScope;
use crate::db::pagination::PageRequest;
use crate::db::pool::Db;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CourseSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

impl CourseSort {
    /// Accepts both `asc|desc` (price order) and the long forms. Anything
    /// else sorts newest-first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") | Some("price_asc") => CourseSort::PriceAsc,
            Some("desc") | Some("price_desc") => CourseSort::PriceDesc,
            _ => CourseSort::Newest,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: CourseSort,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub teacher_id: String,
}

/// Rows removed by a course cascade.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCourse {
    pub videos: u64,
    pub enrollments: u64,
    pub mock_tests: u64,
    pub certificates: u64,
}

fn lower_like(col: course::Column, pattern: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(col))).like(pattern.to_string())
}

fn filtered(filter: &CourseFilter) -> Select<course::Entity> {
    let mut find = course::Entity::find();

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        find = find.filter(
            Condition::any()
                .add(lower_like(course::Column::Title, &pattern))
                .add(lower_like(course::Column::Description, &pattern))
                .add(lower_like(course::Column::Category, &pattern)),
        );
    }
    if let Some(category) = filter
        .category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        find = find.filter(
            Expr::expr(Func::lower(Expr::col(course::Column::Category)))
                .eq(category.to_lowercase()),
        );
    }
    if let Some(min) = filter.min_price {
        find = find.filter(course::Column::Price.gte(min));
    }
    if let Some(max) = filter.max_price {
        find = find.filter(course::Column::Price.lte(max));
    }

    let sorted = match filter.sort {
        CourseSort::Newest => find.order_by_desc(course::Column::CreatedAt),
        CourseSort::PriceAsc => find.order_by_asc(course::Column::Price),
        CourseSort::PriceDesc => find.order_by_desc(course::Column::Price),
    };
    sorted.order_by_asc(course::Column::Id)
}

pub async fn list<C: ConnectionTrait>(
    db: &C,
    filter: &CourseFilter,
    page: PageRequest,
) -> Result<(Vec<course::Model>, u64), AppError> {
    let paginator = filtered(filter).paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.index()).await?;
    Ok((items, total))
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: &str) -> Result<Option<course::Model>, AppError> {
    Ok(course::Entity::find_by_id(id).one(db).await?)
}

/// Like [`find_by_id`] but a missing course is an error.
pub async fn get<C: ConnectionTrait>(db: &C, id: &str) -> Result<course::Model, AppError> {
    find_by_id(db, id).await?.ok_or(AppError::NotFound("Course"))
}

/// Courses visible under `scope`, oldest first.
pub async fn list_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: &OwnerScope,
) -> Result<Vec<course::Model>, AppError> {
    let mut find = course::Entity::find();
    if let Some(owner) = scope.owner_id() {
        find = find.filter(course::Column::TeacherId.eq(owner));
    }
    Ok(find
        .order_by_asc(course::Column::CreatedAt)
        .order_by_asc(course::Column::Id)
        .all(db)
        .await?)
}

pub async fn ids_in_scope<C: ConnectionTrait>(db: &C, scope: &OwnerScope) -> Result<Vec<String>, AppError> {
    let mut find = course::Entity::find()
        .select_only()
        .column(course::Column::Id);
    if let Some(owner) = scope.owner_id() {
        find = find.filter(course::Column::TeacherId.eq(owner));
    }
    Ok(find.into_tuple::<String>().all(db).await?)
}

/// Validates that `teacher_id` names a user allowed to own courses.
pub async fn resolve_owner<C: ConnectionTrait>(db: &C, teacher_id: &str) -> Result<user::Model, AppError> {
    let owner = user::Entity::find_by_id(teacher_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Teacher"))?;
    if !owner.role.can_own_courses() {
        return Err(AppError::bad_request(
            "Course owner must be a teacher or admin",
        ));
    }
    Ok(owner)
}

pub async fn insert<C: ConnectionTrait>(db: &C, new: NewCourse) -> Result<course::Model, AppError> {
    let now = Utc::now().naive_utc();
    let model = course::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        title: Set(new.title),
        description: Set(new.description),
        category: Set(new.category),
        price: Set(new.price),
        teacher_id: Set(new.teacher_id),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(model.insert(db).await?)
}

pub async fn update<C: ConnectionTrait>(
    db: &C,
    mut active: course::ActiveModel,
) -> Result<course::Model, AppError> {
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

/// Deletes a course and everything that exists only in relation to it as
/// one unit. Children go first so foreign keys hold at every step.
pub async fn delete_cascade(db: &Db, course_id: &str) -> Result<DeletedCourse, AppError> {
    let txn = db.begin().await?;

    let video_ids: Vec<String> = video::Entity::find()
        .select_only()
        .column(video::Column::Id)
        .filter(video::Column::CourseId.eq(course_id))
        .into_tuple()
        .all(&txn)
        .await?;
    let test_ids: Vec<String> = mock_test::Entity::find()
        .select_only()
        .column(mock_test::Column::Id)
        .filter(mock_test::Column::CourseId.eq(course_id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !test_ids.is_empty() {
        mock_attempt::Entity::delete_many()
            .filter(mock_attempt::Column::TestId.is_in(test_ids))
            .exec(&txn)
            .await?;
    }
    let mock_tests = mock_test::Entity::delete_many()
        .filter(mock_test::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?
        .rows_affected;

    if !video_ids.is_empty() {
        video_progress::Entity::delete_many()
            .filter(video_progress::Column::VideoId.is_in(video_ids))
            .exec(&txn)
            .await?;
    }
    let certificates = certificate::Entity::delete_many()
        .filter(certificate::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?
        .rows_affected;
    let enrollments = enrollment::Entity::delete_many()
        .filter(enrollment::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?
        .rows_affected;
    let videos = video::Entity::delete_many()
        .filter(video::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let deleted = course::Entity::delete_by_id(course_id).exec(&txn).await?;
    if deleted.rows_affected == 0 {
        return Err(AppError::NotFound("Course"));
    }

    txn.commit().await?;

    Ok(DeletedCourse {
        videos,
        enrollments,
        mock_tests,
        certificates,
    })
}

/// `course_id -> number of videos`, optionally restricted to `course_ids`.
pub async fn video_counts<C: ConnectionTrait>(
    db: &C,
    course_ids: Option<&[String]>,
) -> Result<HashMap<String, u64>, AppError> {
    let mut find = video::Entity::find()
        .select_only()
        .column(video::Column::CourseId)
        .column_as(Expr::col(video::Column::Id).count(), "count")
        .group_by(video::Column::CourseId);
    if let Some(ids) = course_ids {
        find = find.filter(video::Column::CourseId.is_in(ids.iter().cloned()));
    }
    let rows: Vec<(String, i64)> = find.into_tuple().all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(id, n)| (id, n.max(0) as u64))
        .collect())
}

/// `course_id -> number of enrollments`, optionally restricted to `course_ids`.
pub async fn enrollment_counts<C: ConnectionTrait>(
    db: &C,
    course_ids: Option<&[String]>,
) -> Result<HashMap<String, u64>, AppError> {
    let mut find = enrollment::Entity::find()
        .select_only()
        .column(enrollment::Column::CourseId)
        .column_as(Expr::col(enrollment::Column::Id).count(), "count")
        .group_by(enrollment::Column::CourseId);
    if let Some(ids) = course_ids {
        find = find.filter(enrollment::Column::CourseId.is_in(ids.iter().cloned()));
    }
    let rows: Vec<(String, i64)> = find.into_tuple().all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(id, n)| (id, n.max(0) as u64))
        .collect())
}

pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, AppError> {
    Ok(course::Entity::find().count(db).await?)
}
