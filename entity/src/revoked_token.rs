use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Token ids (`jti`) invalidated by logout. Rows become irrelevant once
/// `expires_at` passes and are purged opportunistically.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revoked_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub jti: String,
    pub user_id: String,
    pub expires_at: chrono::NaiveDateTime,
    pub revoked_at: chrono::NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
