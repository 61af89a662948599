use chrono::Utc;
use entity::{certificate, course};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::auth::policy::OwnerScope;
use crate::db::queries::courses;
use crate::error::{is_unique_violation, AppError};

#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub user_id: String,
    pub course_id: String,
    pub grade: String,
    pub file_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issued {
    Created,
    AlreadyIssued,
}

pub async fn find<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    course_id: &str,
) -> Result<Option<certificate::Model>, AppError> {
    Ok(certificate::Entity::find()
        .filter(certificate::Column::UserId.eq(user_id))
        .filter(certificate::Column::CourseId.eq(course_id))
        .one(db)
        .await?)
}

/// Persists a certificate at most once per `(user_id, course_id)`. The
/// first issued certificate wins; later calls return it unchanged. A
/// concurrent insert that loses on the unique index reads back the winner.
pub async fn issue<C: ConnectionTrait>(
    db: &C,
    new: NewCertificate,
) -> Result<(certificate::Model, Issued), AppError> {
    if let Some(existing) = find(db, &new.user_id, &new.course_id).await? {
        return Ok((existing, Issued::AlreadyIssued));
    }

    let model = certificate::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(new.user_id.clone()),
        course_id: Set(new.course_id.clone()),
        grade: Set(new.grade),
        file_url: Set(new.file_url),
        issued_at: Set(Utc::now().naive_utc()),
    };

    match model.insert(db).await {
        Ok(created) => Ok((created, Issued::Created)),
        Err(e) if is_unique_violation(&e) => {
            let existing = find(db, &new.user_id, &new.course_id)
                .await?
                .ok_or(AppError::Database(e))?;
            Ok((existing, Issued::AlreadyIssued))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn list_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> Result<Vec<(certificate::Model, Option<course::Model>)>, AppError> {
    Ok(certificate::Entity::find()
        .filter(certificate::Column::UserId.eq(user_id))
        .find_also_related(course::Entity)
        .order_by_desc(certificate::Column::IssuedAt)
        .all(db)
        .await?)
}

/// Certificates for courses visible under `scope`.
pub async fn list_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: &OwnerScope,
) -> Result<Vec<(certificate::Model, Option<course::Model>)>, AppError> {
    let mut find = certificate::Entity::find().find_also_related(course::Entity);
    if let OwnerScope::Only(_) = scope {
        let ids = courses::ids_in_scope(db, scope).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        find = find.filter(certificate::Column::CourseId.is_in(ids));
    }
    Ok(find
        .order_by_desc(certificate::Column::IssuedAt)
        .all(db)
        .await?)
}

pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, AppError> {
    Ok(certificate::Entity::find().count(db).await?)
}

pub async fn count_for_courses<C: ConnectionTrait>(db: &C, course_ids: &[String]) -> Result<u64, AppError> {
    if course_ids.is_empty() {
        return Ok(0);
    }
    Ok(certificate::Entity::find()
        .filter(certificate::Column::CourseId.is_in(course_ids.iter().cloned()))
        .count(db)
        .await?)
}
