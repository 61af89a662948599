use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use entity::{course, enrollment, user};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::policy::{authorize, Action};
use crate::db::pagination::{PageRequest, Paged, Pagination};
use crate::db::queries;
use crate::db::queries::courses::{CourseFilter, CourseSort, DeletedCourse, NewCourse};
use crate::db::queries::progress::CourseProgress;
use crate::error::AppError;
use crate::handlers::extract::{AppJson, AppQuery};
use crate::handlers::mock_tests::MockTestResponse;
use crate::handlers::videos::VideoResponse;
use crate::handlers::{optional_text, query_number, required};
use crate::AppState;

const DEFAULT_COURSE_PAGE_SIZE: u64 = 6;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCoursesQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub teacher_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub teacher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<user::Model> for TeacherSummary {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub teacher_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<course::Model> for CourseResponse {
    fn from(c: course::Model) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            category: c.category,
            price: c.price,
            teacher_id: c.teacher_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListItem {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub teacher: Option<TeacherSummary>,
    pub video_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub teacher: Option<TeacherSummary>,
    pub videos: Vec<VideoResponse>,
    pub video_count: u64,
    pub enrollment_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub progress: i32,
    pub status: entity::enrollment::EnrollmentStatus,
    pub created_at: NaiveDateTime,
}

impl From<enrollment::Model> for EnrollmentResponse {
    fn from(e: enrollment::Model) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            course_id: e.course_id,
            progress: e.progress,
            status: e.status,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub enrollment: EnrollmentResponse,
}

#[derive(Debug, Serialize)]
pub struct DeleteCourseResponse {
    pub message: String,
    pub deleted: DeletedCourse,
}

fn validate_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::bad_request("price must be a non-negative number"));
    }
    Ok(price)
}

// --- Handlers ---

pub async fn list_courses(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListCoursesQuery>,
) -> Result<Json<Paged<CourseListItem>>, AppError> {
    authorize(None, Action::ListCourses, None)?;

    let page = PageRequest::from_query(
        query.page.as_deref(),
        query.limit.as_deref(),
        DEFAULT_COURSE_PAGE_SIZE,
    );
    let filter = CourseFilter {
        search: query.search,
        category: query.category,
        min_price: query_number(query.min_price.as_deref()),
        max_price: query_number(query.max_price.as_deref()),
        sort: CourseSort::parse(query.order.as_deref()),
    };

    let (items, total) = queries::courses::list(&state.db, &filter, page).await?;

    let course_ids: Vec<String> = items.iter().map(|c| c.id.clone()).collect();
    let video_counts = queries::courses::video_counts(&state.db, Some(&course_ids)).await?;

    let mut teacher_ids: Vec<String> = items.iter().map(|c| c.teacher_id.clone()).collect();
    teacher_ids.sort();
    teacher_ids.dedup();
    let teachers: HashMap<String, TeacherSummary> = if teacher_ids.is_empty() {
        HashMap::new()
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(teacher_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), TeacherSummary::from(u)))
            .collect()
    };

    let data = items
        .into_iter()
        .map(|c| CourseListItem {
            teacher: teachers.get(&c.teacher_id).cloned(),
            video_count: video_counts.get(&c.id).copied().unwrap_or(0),
            course: CourseResponse::from(c),
        })
        .collect();

    Ok(Json(Paged {
        data,
        pagination: Pagination::new(page, total),
    }))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseDetail>, AppError> {
    authorize(None, Action::ReadCourse, None)?;

    let course = queries::courses::get(&state.db, &id).await?;
    let teacher = queries::users::find_by_id(&state.db, &course.teacher_id)
        .await?
        .map(TeacherSummary::from);
    let videos: Vec<VideoResponse> = queries::videos::list_for_course(&state.db, &course.id)
        .await?
        .into_iter()
        .map(VideoResponse::from)
        .collect();
    let ids = [course.id.clone()];
    let enrollment_count = queries::courses::enrollment_counts(&state.db, Some(&ids))
        .await?
        .get(&course.id)
        .copied()
        .unwrap_or(0);

    Ok(Json(CourseDetail {
        video_count: videos.len() as u64,
        course: CourseResponse::from(course),
        teacher,
        videos,
        enrollment_count,
    }))
}

pub async fn create_course(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), AppError> {
    let who = caller.caller();
    authorize(Some(&who), Action::CreateCourse, None)?;

    let title = required(req.title, "title")?;
    let price = validate_price(req.price.unwrap_or(0.0))?;

    // Teachers always own what they create; only an admin may name another owner.
    let teacher_id = match optional_text(req.teacher_id) {
        Some(requested) if requested != who.id => {
            authorize(Some(&who), Action::TransferCourse, None)?;
            requested
        }
        _ => who.id.clone(),
    };
    queries::courses::resolve_owner(&state.db, &teacher_id).await?;

    let course = queries::courses::insert(
        &state.db,
        NewCourse {
            title,
            description: req.description.unwrap_or_default(),
            category: req.category.map(|c| c.trim().to_string()).unwrap_or_default(),
            price,
            teacher_id,
        },
    )
    .await?;

    tracing::info!(course_id = %course.id, teacher_id = %course.teacher_id, "Course created");

    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

pub async fn update_course(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    let who = caller.caller();
    let course = queries::courses::get(&state.db, &id).await?;
    authorize(Some(&who), Action::UpdateCourse, Some(&course.teacher_id))?;

    let new_owner = match optional_text(req.teacher_id) {
        Some(requested) if requested != course.teacher_id => {
            authorize(Some(&who), Action::TransferCourse, Some(&course.teacher_id))?;
            queries::courses::resolve_owner(&state.db, &requested).await?;
            Some(requested)
        }
        _ => None,
    };

    let mut active: course::ActiveModel = course.into();
    if let Some(title) = req.title {
        active.title = Set(required(Some(title), "title")?);
    }
    if let Some(description) = req.description {
        active.description = Set(description);
    }
    if let Some(category) = req.category {
        active.category = Set(category.trim().to_string());
    }
    if let Some(price) = req.price {
        active.price = Set(validate_price(price)?);
    }
    if let Some(owner) = new_owner {
        tracing::info!(course_id = %id, new_owner = %owner, "Course ownership transferred");
        active.teacher_id = Set(owner);
    }

    let updated = queries::courses::update(&state.db, active).await?;
    Ok(Json(CourseResponse::from(updated)))
}

pub async fn delete_course(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteCourseResponse>, AppError> {
    let course = queries::courses::get(&state.db, &id).await?;
    authorize(Some(&caller.caller()), Action::DeleteCourse, Some(&course.teacher_id))?;

    let deleted = queries::courses::delete_cascade(&state.db, &course.id).await?;

    tracing::info!(
        course_id = %course.id,
        deleted_by = %caller.id(),
        videos = deleted.videos,
        enrollments = deleted.enrollments,
        certificates = deleted.certificates,
        mock_tests = deleted.mock_tests,
        "Course deleted"
    );

    Ok(Json(DeleteCourseResponse {
        message: "Course deleted".to_string(),
        deleted,
    }))
}

pub async fn enroll(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<EnrollResponse>), AppError> {
    authorize(Some(&caller.caller()), Action::Enroll, None)?;

    let enrollment = queries::enrollments::enroll(&state.db, caller.id(), &id).await?;

    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            enrollment: EnrollmentResponse::from(enrollment),
        }),
    ))
}

pub async fn course_progress(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseProgress>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewOwnProgress, None)?;

    let progress = queries::progress::course_progress(&state.db, caller.id(), &id).await?;
    Ok(Json(progress))
}

pub async fn course_mock_tests(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MockTestResponse>>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewCourseMockTests, None)?;

    let course = queries::courses::get(&state.db, &id).await?;
    let tests = queries::mock_tests::list_for_course(&state.db, &course.id).await?;

    Ok(Json(
        tests
            .into_iter()
            .map(|t| MockTestResponse::new(t, Some(course.title.clone())))
            .collect(),
    ))
}
