use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use entity::user::Role;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthenticatedUser;
use crate::auth::policy::{authorize, Action};
use crate::db::queries;
use crate::db::queries::stats::AdminStats;
use crate::error::AppError;
use crate::handlers::extract::AppQuery;
use crate::handlers::optional_text;
use crate::handlers::user::UserResponse;
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub window_days: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    pub message: String,
}

// --- Handlers ---

pub async fn stats(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<StatsQuery>,
) -> Result<Json<AdminStats>, AppError> {
    authorize(Some(&caller.caller()), Action::ViewStats, None)?;

    let window = queries::stats::window_days(query.window_days.as_deref());
    let today = Utc::now().date_naive();
    let stats = queries::stats::admin_stats(&state.db, window, today).await?;

    Ok(Json(stats))
}

pub async fn list_users(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    authorize(Some(&caller.caller()), Action::ListUsers, None)?;

    let role = match optional_text(query.role) {
        Some(raw) => Some(Role::parse(&raw).ok_or_else(|| AppError::bad_request("Invalid role"))?),
        None => None,
    };

    let users = queries::users::list(&state.db, query.search.as_deref(), role).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Removes a user and their learning records. Users who still own courses
/// are refused until ownership is transferred or the courses are deleted.
pub async fn delete_user(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteUserResponse>, AppError> {
    authorize(Some(&caller.caller()), Action::DeleteUser, Some(&id))?;

    if id == caller.id() {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }

    let target = queries::users::find_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let owned = queries::users::count_owned_courses(&state.db, &target.id).await?;
    if owned > 0 {
        return Err(AppError::Conflict(format!(
            "User still owns {owned} course(s); transfer or delete them first"
        )));
    }

    queries::users::delete_with_learning_records(&state.db, &target.id).await?;
    tracing::info!(user_id = %target.id, deleted_by = %caller.id(), "User deleted");

    Ok(Json(DeleteUserResponse {
        message: "User deleted".to_string(),
    }))
}
