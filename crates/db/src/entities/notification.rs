//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[sea_orm(string_value = "like")]
    Like,
    #[sea_orm(string_value = "comment")]
    Comment,
    #[sea_orm(string_value = "comment_reply")]
    CommentReply,
    #[sea_orm(string_value = "follow")]
    Follow,
    #[sea_orm(string_value = "follow_request")]
    FollowRequest,
    #[sea_orm(string_value = "mention")]
    Mention,
    #[sea_orm(string_value = "review")]
    Review,
    #[sea_orm(string_value = "review_reply")]
    ReviewReply,
    #[sea_orm(string_value = "message")]
    Message,
}

impl NotificationType {
    /// Every notification type, in display order.
    pub const ALL: [Self; 9] = [
        Self::Like,
        Self::Comment,
        Self::CommentReply,
        Self::Follow,
        Self::FollowRequest,
        Self::Mention,
        Self::Review,
        Self::ReviewReply,
        Self::Message,
    ];

    /// Stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::CommentReply => "comment_reply",
            Self::Follow => "follow",
            Self::FollowRequest => "follow_request",
            Self::Mention => "mention",
            Self::Review => "review",
            Self::ReviewReply => "review_reply",
            Self::Message => "message",
        }
    }

    /// Parse a stored string value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

/// Canonical encoding of the dedup tuple `(recipient, sender, type, subject)`.
///
/// Encoded as a JSON array so an absent subject is an explicit `null` and
/// never collides with any real identifier.
#[must_use]
pub fn dedup_key(
    recipient_id: &str,
    sender_id: &str,
    notification_type: NotificationType,
    subject_id: Option<&str>,
) -> String {
    serde_json::json!([
        recipient_id,
        sender_id,
        notification_type.as_str(),
        subject_id
    ])
    .to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user receiving the notification
    pub recipient_id: String,

    /// The user who triggered the notification
    pub sender_id: String,

    pub notification_type: NotificationType,

    /// Publication, review or comment the notification concerns
    #[sea_orm(nullable)]
    pub subject_id: Option<String>,

    /// Unique encoding of the dedup tuple, see [`dedup_key`]
    #[sea_orm(unique, column_type = "Text")]
    pub dedup_key: String,

    #[sea_orm(nullable)]
    pub read_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the recipient has read this notification.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Sender,
}

impl ActiveModelBehavior for ActiveModel {}
