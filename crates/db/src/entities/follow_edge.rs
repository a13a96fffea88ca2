//! Follow edge entity (directed follow relationships, pending or accepted).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Follow edge status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    /// Awaiting approval by the followed (private) user.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Approved, or created against a public account.
    #[sea_orm(string_value = "accepted")]
    Accepted,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow_edge")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user who follows (or asked to)
    pub follower_id: String,

    /// The user being followed
    pub followed_id: String,

    pub status: FollowStatus,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the edge still awaits approval.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == FollowStatus::Pending
    }

    /// Whether the edge grants follower access.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == FollowStatus::Accepted
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FollowerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Follower,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FollowedId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Followed,
}

impl ActiveModelBehavior for ActiveModel {}
