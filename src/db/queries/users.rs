use chrono::Utc;
use entity::user::{self, Role};
use entity::{certificate, course, enrollment, mock_attempt, revoked_token, video_progress};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::db::pool::Db;
use crate::error::{is_unique_violation, AppError};

/// Emails are compared case-insensitively; the stored form is the
/// normalized one.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub age: Option<i32>,
    pub place: Option<String>,
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: &str) -> Result<Option<user::Model>, AppError> {
    Ok(user::Entity::find_by_id(id).one(db).await?)
}

pub async fn find_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<user::Model>, AppError> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?)
}

/// Inserts a user. A duplicate email is reported by the unique index and
/// surfaces as `UserAlreadyExists`.
pub async fn insert<C: ConnectionTrait>(db: &C, new: NewUser) -> Result<user::Model, AppError> {
    let now = Utc::now().naive_utc();
    let model = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(normalize_email(&new.email)),
        password_hash: Set(new.password_hash),
        name: Set(new.name),
        role: Set(new.role),
        age: Set(new.age),
        place: Set(new.place),
        created_at: Set(now),
        updated_at: Set(now),
    };

    model.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::UserAlreadyExists
        } else {
            AppError::Database(e)
        }
    })
}

pub async fn update<C: ConnectionTrait>(
    db: &C,
    mut active: user::ActiveModel,
) -> Result<user::Model, AppError> {
    active.updated_at = Set(Utc::now().naive_utc());
    active.update(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already in use".to_string())
        } else {
            AppError::Database(e)
        }
    })
}

/// Newest-first listing with optional name/email search and role filter.
pub async fn list<C: ConnectionTrait>(
    db: &C,
    search: Option<&str>,
    role: Option<Role>,
) -> Result<Vec<user::Model>, AppError> {
    let mut find = user::Entity::find();

    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        find = find.filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(user::Column::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(user::Column::Email))).like(pattern)),
        );
    }
    if let Some(role) = role {
        find = find.filter(user::Column::Role.eq(role));
    }

    Ok(find
        .order_by_desc(user::Column::CreatedAt)
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?)
}

pub async fn count_owned_courses<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<u64, AppError> {
    Ok(course::Entity::find()
        .filter(course::Column::TeacherId.eq(user_id))
        .count(db)
        .await?)
}

/// Removes a user together with the learning records that exist only in
/// relation to them. Callers must have ruled out owned courses first; the
/// foreign key on `courses.teacher_id` would otherwise abort the commit.
pub async fn delete_with_learning_records(db: &Db, user_id: &str) -> Result<(), AppError> {
    let txn = db.begin().await?;

    video_progress::Entity::delete_many()
        .filter(video_progress::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    mock_attempt::Entity::delete_many()
        .filter(mock_attempt::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    certificate::Entity::delete_many()
        .filter(certificate::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    enrollment::Entity::delete_many()
        .filter(enrollment::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    revoked_token::Entity::delete_many()
        .filter(revoked_token::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(user_id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}

pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, AppError> {
    Ok(user::Entity::find().count(db).await?)
}
