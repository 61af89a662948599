use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use entity::user::Role;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::TokenKind;
use crate::auth::middleware::{bearer_token, AuthenticatedUser};
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::policy::{authorize, Action};
use crate::db::queries;
use crate::db::queries::users::NewUser;
use crate::error::AppError;
use crate::handlers::extract::AppJson;
use crate::handlers::user::UserResponse;
use crate::handlers::{optional_text, required, valid_email};
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub age: Option<i32>,
    pub place: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// --- Handlers ---

pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let email = required(req.email, "email")?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("password is required"))?;
    let name = required(req.name, "name")?;

    if !valid_email(&email) {
        return Err(AppError::bad_request("A valid email is required"));
    }
    validate_password(&password)?;

    let role = match optional_text(req.role) {
        Some(raw) => Role::parse(&raw).ok_or_else(|| AppError::bad_request("Invalid role"))?,
        None => Role::User,
    };
    if matches!(req.age, Some(age) if age < 0) {
        return Err(AppError::bad_request("age must not be negative"));
    }

    let user = queries::users::insert(
        &state.db,
        NewUser {
            email,
            password_hash: hash_password(&password)?,
            name,
            role,
            age: req.age,
            place: optional_text(req.place),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = required(req.email, "email")?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("password is required"))?;

    let Some(user) = queries::users::find_by_email(&state.db, &email).await? else {
        tracing::warn!("Login failed: unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Login failed: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.jwt.issue_access_token(&user)?;
    let refresh_token = state.jwt.issue_refresh_token(&user)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        user: UserResponse::from(user),
        token,
        refresh_token,
    }))
}

/// Revokes the presented access token and, when supplied, the matching
/// refresh token.
pub async fn logout(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    body: Option<AppJson<LogoutRequest>>,
) -> Result<Json<MessageResponse>, AppError> {
    authorize(Some(&caller.caller()), Action::Logout, None)?;

    let refresh_token = body.and_then(|AppJson(req)| optional_text(req.refresh_token));
    let refresh_claims = match refresh_token {
        Some(token) => {
            let claims = state
                .jwt
                .verify(&token, TokenKind::Refresh)
                .map_err(|_| AppError::InvalidRefreshToken)?;
            if claims.sub.as_deref() != Some(caller.id()) {
                return Err(AppError::InvalidRefreshToken);
            }
            Some(claims)
        }
        None => None,
    };

    queries::revoked_tokens::revoke(&state.db, &caller.claims.jti, caller.id(), caller.claims.exp)
        .await?;
    if let Some(claims) = refresh_claims {
        queries::revoked_tokens::revoke(&state.db, &claims.jti, caller.id(), claims.exp).await?;
    }
    let purged = queries::revoked_tokens::purge_expired(&state.db).await?;

    tracing::info!(user_id = %caller.id(), purged, "User logged out");

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Exchanges the refresh token carried as the Bearer credential for a new
/// access token.
pub async fn regenerate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let token = bearer_token(&headers).ok_or(AppError::InvalidRefreshToken)?;
    let refreshed = state.jwt.refresh(token)?;

    if queries::revoked_tokens::is_revoked(&state.db, &refreshed.refresh_claims.jti).await? {
        return Err(AppError::InvalidRefreshToken);
    }

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token: refreshed.access_token,
        }),
    ))
}
