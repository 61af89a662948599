use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::policy::{authorize, Action, OwnerScope};
use crate::db::queries;
use crate::db::queries::certificates::{Issued, NewCertificate};
use crate::db::queries::stats::TeacherStats;
use crate::error::AppError;
use crate::handlers::extract::AppJson;
use crate::handlers::required;
use crate::handlers::user::CertificateResponse;
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCertificateRequest {
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub grade: Option<String>,
    pub file_url: Option<String>,
}

// --- Handlers ---

pub async fn stats(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<TeacherStats>, AppError> {
    let who = caller.caller();
    authorize(Some(&who), Action::ViewTeacherDashboard, None)?;

    let stats = queries::stats::teacher_stats(&state.db, &OwnerScope::for_caller(&who)).await?;
    Ok(Json(stats))
}

pub async fn list_certificates(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateResponse>>, AppError> {
    let who = caller.caller();
    authorize(Some(&who), Action::ViewTeacherDashboard, None)?;

    let rows =
        queries::certificates::list_in_scope(&state.db, &OwnerScope::for_caller(&who)).await?;
    Ok(Json(rows.into_iter().map(CertificateResponse::from).collect()))
}

/// Issues a certificate once per student and course. Returns 201 for a new
/// certificate and 200 with the existing one otherwise.
pub async fn issue_certificate(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<IssueCertificateRequest>,
) -> Result<(StatusCode, Json<CertificateResponse>), AppError> {
    let who = caller.caller();
    authorize(Some(&who), Action::IssueCertificate, None)?;

    let user_id = required(req.user_id, "userId")?;
    let course_id = required(req.course_id, "courseId")?;
    let grade = required(req.grade, "grade")?;
    let file_url = required(req.file_url, "fileUrl")?;

    let course = queries::courses::get(&state.db, &course_id).await?;
    authorize(Some(&who), Action::IssueCertificate, Some(&course.teacher_id))?;

    queries::users::find_by_id(&state.db, &user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let (certificate, issued) = queries::certificates::issue(
        &state.db,
        NewCertificate {
            user_id,
            course_id: course.id.clone(),
            grade,
            file_url,
        },
    )
    .await?;

    let status = match issued {
        Issued::Created => {
            tracing::info!(
                certificate_id = %certificate.id,
                course_id = %course.id,
                issued_by = %who.id,
                "Certificate issued"
            );
            StatusCode::CREATED
        }
        Issued::AlreadyIssued => StatusCode::OK,
    };

    Ok((
        status,
        Json(CertificateResponse::from((certificate, Some(course)))),
    ))
}
