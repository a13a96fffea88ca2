//! Notification repository.

use std::sync::Arc;

use crate::entities::{
    Notification,
    notification::{self, NotificationType},
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, OnConflict},
};
use vitrine_common::{AppError, AppResult};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a notification by its dedup key.
    pub async fn find_by_dedup_key(&self, key: &str) -> AppResult<Option<notification::Model>> {
        Notification::find()
            .filter(notification::Column::DedupKey.eq(key))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a notification unless its dedup key is taken, then return the stored row.
    ///
    /// The flag is `true` when this call created the row. An existing row is
    /// returned untouched, `read_at` included.
    pub async fn insert_or_get(
        &self,
        id: &str,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        subject_id: Option<&str>,
    ) -> AppResult<(notification::Model, bool)> {
        let key = notification::dedup_key(recipient_id, sender_id, notification_type, subject_id);

        let model = notification::ActiveModel {
            id: Set(id.to_string()),
            recipient_id: Set(recipient_id.to_string()),
            sender_id: Set(sender_id.to_string()),
            notification_type: Set(notification_type),
            subject_id: Set(subject_id.map(ToString::to_string)),
            dedup_key: Set(key.clone()),
            read_at: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let created = match Notification::insert(model)
            .on_conflict(
                OnConflict::column(notification::Column::DedupKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await
        {
            Ok(_) => true,
            Err(DbErr::RecordNotInserted) => false,
            Err(e) => return Err(AppError::Database(e.to_string())),
        };

        let stored = self
            .find_by_dedup_key(&key)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Notification {key} vanished")))?;

        Ok((stored, created))
    }

    /// Get notifications for a recipient (paginated, newest first).
    pub async fn find_by_recipient(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        let mut query = Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .order_by_desc(notification::Column::Id);

        if let Some(t) = notification_type {
            query = query.filter(notification::Column::NotificationType.eq(t));
        }

        if let Some(id) = until_id {
            query = query.filter(notification::Column::Id.lt(id));
        }

        if unread_only {
            query = query.filter(notification::Column::ReadAt.is_null());
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark one notification as read, if it belongs to the recipient.
    ///
    /// Returns whether the notification exists for that recipient. Already-read
    /// rows keep their original `read_at`.
    pub async fn mark_as_read(&self, id: &str, recipient_id: &str) -> AppResult<bool> {
        let existing = Notification::find_by_id(id)
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(existing) = existing else {
            return Ok(false);
        };

        if !existing.is_read() {
            Notification::update_many()
                .col_expr(notification::Column::ReadAt, Expr::value(Utc::now().fixed_offset()))
                .filter(notification::Column::Id.eq(id))
                .filter(notification::Column::ReadAt.is_null())
                .exec(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        Ok(true)
    }

    /// Mark all unread notifications (optionally of one type) as read.
    pub async fn mark_all_as_read(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
    ) -> AppResult<u64> {
        let mut query = Notification::update_many()
            .col_expr(notification::Column::ReadAt, Expr::value(Utc::now().fixed_offset()))
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::ReadAt.is_null());

        if let Some(t) = notification_type {
            query = query.filter(notification::Column::NotificationType.eq(t));
        }

        let result = query
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Count unread notifications per type for a recipient.
    pub async fn count_unread_by_type(
        &self,
        recipient_id: &str,
    ) -> AppResult<Vec<(NotificationType, u64)>> {
        let rows: Vec<(String, i64)> = Notification::find()
            .select_only()
            .column(notification::Column::NotificationType)
            .column_as(Expr::col(notification::Column::Id).count(), "count")
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::ReadAt.is_null())
            .group_by(notification::Column::NotificationType)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(t, n)| {
                NotificationType::parse(&t).map(|t| (t, u64::try_from(n).unwrap_or(0)))
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_notification(
        id: &str,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        subject_id: Option<&str>,
    ) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            recipient_id: recipient_id.to_string(),
            sender_id: sender_id.to_string(),
            notification_type,
            subject_id: subject_id.map(ToString::to_string),
            dedup_key: notification::dedup_key(recipient_id, sender_id, notification_type, subject_id),
            read_at: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_dedup_key() {
        let n = create_test_notification("n1", "user1", "user2", NotificationType::Like, Some("p1"));
        let key = n.dedup_key.clone();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[n.clone()]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let found = repo.find_by_dedup_key(&key).await.unwrap().unwrap();

        assert_eq!(found.id, "n1");
        assert_eq!(found.subject_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_find_by_recipient() {
        let n1 = create_test_notification("n2", "user1", "user2", NotificationType::Follow, None);
        let n2 = create_test_notification("n1", "user1", "user3", NotificationType::Like, Some("p1"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[n1, n2]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo
            .find_by_recipient("user1", None, 10, None, false)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].notification_type, NotificationType::Follow);
    }

    #[tokio::test]
    async fn test_mark_as_read_wrong_recipient() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<notification::Model>::new()])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        assert!(!repo.mark_as_read("n1", "intruder").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_as_read_keeps_existing_timestamp() {
        let mut n = create_test_notification("n1", "user1", "user2", NotificationType::Like, None);
        n.read_at = Some(Utc::now().into());

        // No exec result is queued: an already-read row must not be updated again.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[n]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        assert!(repo.mark_as_read("n1", "user1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_all_as_read() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 4,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let updated = repo
            .mark_all_as_read("user1", Some(NotificationType::Like))
            .await
            .unwrap();

        assert_eq!(updated, 4);
    }
}
