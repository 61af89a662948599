use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use entity::user;

use crate::auth::jwt::{Claims, TokenKind};
use crate::auth::policy::Caller;
use crate::db::queries;
use crate::error::AppError;

/// Pulls the raw token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extracts the caller from a Bearer access token and resolves it to the
/// current user row. The role used for authorization is the stored one, so
/// a demotion takes effect before the token expires.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: user::Model,
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn caller(&self) -> Caller {
        Caller {
            id: self.user.id.clone(),
            role: self.user.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync + AsRef<crate::AppState>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state: &crate::AppState = state.as_ref();

        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let claims = app_state.jwt.verify(token, TokenKind::Access)?;

        if queries::revoked_tokens::is_revoked(&app_state.db, &claims.jti).await? {
            return Err(AppError::TokenRevoked);
        }

        let user = resolve_identity(&app_state.db, &claims).await?;

        Ok(AuthenticatedUser { user, claims })
    }
}

/// Looks the token subject up by id, falling back to email for tokens that
/// only carry the secondary key. A claim that no longer matches a row is a
/// 404, not a 401.
pub async fn resolve_identity(
    db: &crate::db::pool::Db,
    claims: &Claims,
) -> Result<user::Model, AppError> {
    let found = match (&claims.sub, &claims.email) {
        (Some(id), _) => queries::users::find_by_id(db, id).await?,
        (None, Some(email)) => queries::users::find_by_email(db, email).await?,
        (None, None) => return Err(AppError::InvalidToken),
    };
    found.ok_or(AppError::UserNotFound)
}
