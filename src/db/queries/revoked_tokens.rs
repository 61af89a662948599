use chrono::{DateTime, Utc};
use entity::revoked_token;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::error::{is_unique_violation, AppError};

/// Records `jti` as revoked until `expires_at` (unix seconds). Revoking the
/// same token twice is a no-op.
pub async fn revoke<C: ConnectionTrait>(
    db: &C,
    jti: &str,
    user_id: &str,
    expires_at: i64,
) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();
    let expires_at = DateTime::from_timestamp(expires_at, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(now);

    let model = revoked_token::ActiveModel {
        jti: Set(jti.to_string()),
        user_id: Set(user_id.to_string()),
        expires_at: Set(expires_at),
        revoked_at: Set(now),
    };

    match model.insert(db).await {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn is_revoked<C: ConnectionTrait>(db: &C, jti: &str) -> Result<bool, AppError> {
    Ok(revoked_token::Entity::find_by_id(jti)
        .one(db)
        .await?
        .is_some())
}

/// Drops rows whose token would have expired anyway.
pub async fn purge_expired<C: ConnectionTrait>(db: &C) -> Result<u64, AppError> {
    let result = revoked_token::Entity::delete_many()
        .filter(revoked_token::Column::ExpiresAt.lt(Utc::now().naive_utc()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
