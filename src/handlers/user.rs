use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;
use entity::enrollment::EnrollmentStatus;
use entity::user::{self, Role};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::policy::{authorize, Action};
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::extract::AppJson;
use crate::handlers::courses::TeacherSummary;
use crate::handlers::{optional_text, valid_email};
use crate::AppState;

// --- Request / Response types ---

/// Public view of a user; never includes the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub age: Option<i32>,
    pub place: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            age: u.age,
            place: u.place,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub place: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub teacher: Option<TeacherSummary>,
    pub progress: i32,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentProgress {
    pub id: String,
    pub course_id: String,
    pub progress: i32,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub course_title: Option<String>,
    pub grade: String,
    pub file_url: String,
    pub issued_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    pub id: String,
    pub user_id: String,
    pub test_id: String,
    pub test_title: Option<String>,
    pub course_id: Option<String>,
    pub score: i32,
    pub updated_at: NaiveDateTime,
}

// --- Handlers ---

pub async fn get_profile(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::from(user.user))
}

pub async fn get_user(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewUser, None)?;

    let user = queries::users::find_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn update_user(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let who = caller.caller();
    authorize(Some(&who), Action::UpdateProfile, Some(&id))?;

    let target = queries::users::find_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    // Echoing the current role back is not a role change.
    let role = match optional_text(req.role) {
        Some(raw) => {
            let requested =
                Role::parse(&raw).ok_or_else(|| AppError::bad_request("Invalid role"))?;
            if requested == target.role {
                None
            } else {
                authorize(Some(&who), Action::ChangeRole, Some(&id))?;
                Some(requested)
            }
        }
        None => None,
    };

    let mut active: user::ActiveModel = target.into();

    if let Some(name) = optional_text(req.name) {
        active.name = Set(name);
    }
    if let Some(email) = optional_text(req.email) {
        if !valid_email(&email) {
            return Err(AppError::bad_request("A valid email is required"));
        }
        active.email = Set(queries::users::normalize_email(&email));
    }
    if let Some(age) = req.age {
        if age < 0 {
            return Err(AppError::bad_request("age must not be negative"));
        }
        active.age = Set(Some(age));
    }
    if let Some(place) = req.place {
        active.place = Set(optional_text(Some(place)));
    }
    if let Some(role) = role {
        active.role = Set(role);
        tracing::info!(user_id = %id, role = %role, changed_by = %who.id, "User role changed");
    }

    let updated = queries::users::update(&state.db, active).await?;
    Ok(Json(UserResponse::from(updated)))
}

pub async fn enrolled_courses(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<EnrolledCourse>>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewOwnProgress, None)?;

    let rows = queries::enrollments::enrolled_courses(&state.db, caller.id()).await?;

    let mut courses = Vec::with_capacity(rows.len());
    for (enrollment, course) in rows {
        let teacher = queries::users::find_by_id(&state.db, &course.teacher_id)
            .await?
            .map(TeacherSummary::from);
        courses.push(EnrolledCourse {
            id: course.id,
            title: course.title,
            description: course.description,
            price: course.price,
            category: course.category,
            teacher,
            progress: enrollment.progress,
            status: enrollment.status,
        });
    }

    Ok(Json(courses))
}

pub async fn enrollment_progress(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<EnrollmentProgress>>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewOwnProgress, None)?;

    let enrollments = queries::enrollments::list_for_user(&state.db, caller.id()).await?;

    Ok(Json(
        enrollments
            .into_iter()
            .map(|e| EnrollmentProgress {
                id: e.id,
                course_id: e.course_id,
                progress: e.progress,
                status: e.status,
            })
            .collect(),
    ))
}

pub async fn my_certificates(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateResponse>>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewOwnCertificates, None)?;

    let rows = queries::certificates::list_for_user(&state.db, caller.id()).await?;
    Ok(Json(rows.into_iter().map(CertificateResponse::from).collect()))
}

pub async fn my_results(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewOwnProgress, None)?;

    let rows = queries::mock_tests::results_for_user(&state.db, caller.id()).await?;
    Ok(Json(rows.into_iter().map(AttemptResponse::from).collect()))
}

impl From<(entity::certificate::Model, Option<entity::course::Model>)> for CertificateResponse {
    fn from((c, course): (entity::certificate::Model, Option<entity::course::Model>)) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            course_id: c.course_id,
            course_title: course.map(|course| course.title),
            grade: c.grade,
            file_url: c.file_url,
            issued_at: c.issued_at,
        }
    }
}

impl From<(entity::mock_attempt::Model, Option<entity::mock_test::Model>)> for AttemptResponse {
    fn from((a, test): (entity::mock_attempt::Model, Option<entity::mock_test::Model>)) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            test_id: a.test_id,
            test_title: test.as_ref().map(|t| t.title.clone()),
            course_id: test.map(|t| t.course_id),
            score: a.score,
            updated_at: a.updated_at,
        }
    }
}
