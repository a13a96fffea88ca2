//! Notification fan-out, dedup and inbox.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{debug, info};
use vitrine_common::{AppError, AppResult, IdGenerator, RelationsConfig};
use vitrine_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};

use super::{graph::GraphStoreService, pagination::PageInput};

/// Storage for notification rows, keyed for dedup by
/// `(recipient, sender, type, subject)`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Atomically return the row for the dedup key, creating it if absent.
    ///
    /// The flag is `true` when this call created the row.
    async fn insert_or_get(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        subject_id: Option<&str>,
    ) -> AppResult<(notification::Model, bool)>;

    /// Notifications for a recipient, newest first.
    async fn list(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>>;

    /// Mark one notification read. Returns whether it exists for the recipient.
    async fn mark_as_read(&self, id: &str, recipient_id: &str) -> AppResult<bool>;

    /// Mark every unread notification (optionally of one type) read.
    async fn mark_all_as_read(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
    ) -> AppResult<u64>;

    /// Unread counts per type. Types with no unread rows may be omitted.
    async fn count_unread_by_type(
        &self,
        recipient_id: &str,
    ) -> AppResult<Vec<(NotificationType, u64)>>;
}

/// Shared handle to a notification store.
pub type NotificationStoreService = Arc<dyn NotificationStore>;

/// Database-backed notification store.
#[derive(Clone)]
pub struct DbNotificationStore {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl DbNotificationStore {
    /// Create a new database-backed notification store.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a notification store over a connection.
    #[must_use]
    pub const fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self::new(NotificationRepository::new(db))
    }
}

#[async_trait]
impl NotificationStore for DbNotificationStore {
    async fn insert_or_get(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        subject_id: Option<&str>,
    ) -> AppResult<(notification::Model, bool)> {
        self.notification_repo
            .insert_or_get(
                &self.id_gen.generate(),
                recipient_id,
                sender_id,
                notification_type,
                subject_id,
            )
            .await
    }

    async fn list(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_recipient(recipient_id, notification_type, limit, until_id, unread_only)
            .await
    }

    async fn mark_as_read(&self, id: &str, recipient_id: &str) -> AppResult<bool> {
        self.notification_repo.mark_as_read(id, recipient_id).await
    }

    async fn mark_all_as_read(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
    ) -> AppResult<u64> {
        self.notification_repo
            .mark_all_as_read(recipient_id, notification_type)
            .await
    }

    async fn count_unread_by_type(
        &self,
        recipient_id: &str,
    ) -> AppResult<Vec<(NotificationType, u64)>> {
        self.notification_repo
            .count_unread_by_type(recipient_id)
            .await
    }
}

/// Unread notification counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCounts {
    pub total: u64,
    pub by_type: HashMap<NotificationType, u64>,
}

/// Notification service: the single entry point for social signals.
#[derive(Clone)]
pub struct NotificationService {
    store: NotificationStoreService,
    graph: GraphStoreService,
    config: RelationsConfig,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(
        store: NotificationStoreService,
        graph: GraphStoreService,
        config: RelationsConfig,
    ) -> Self {
        Self {
            store,
            graph,
            config,
        }
    }

    /// Record a social signal from `sender_id` to `recipient_id`.
    ///
    /// Returns `None` for self-actions and when a block exists in either
    /// direction. Otherwise returns the row for the dedup key, which is the
    /// pre-existing one (read state untouched) if the signal was seen before.
    pub async fn notify(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        subject_id: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        if recipient_id == sender_id {
            return Ok(None);
        }

        if self
            .graph
            .block_exists_between(recipient_id, sender_id)
            .await?
        {
            debug!(
                recipient_id,
                sender_id,
                notification_type = notification_type.as_str(),
                "Notification suppressed by block"
            );
            return Ok(None);
        }

        let (stored, created) = self
            .store
            .insert_or_get(recipient_id, sender_id, notification_type, subject_id)
            .await?;

        if created {
            info!(
                id = %stored.id,
                recipient_id,
                sender_id,
                notification_type = notification_type.as_str(),
                "Notification created"
            );
        } else {
            debug!(id = %stored.id, "Notification deduplicated");
        }

        Ok(Some(stored))
    }

    /// Fan out a reply on a review thread.
    ///
    /// The author of the root review is notified, and so is the reviewed user
    /// when that is someone else. Each notification is independently subject to
    /// the self and block rules of [`Self::notify`].
    pub async fn notify_review_reply(
        &self,
        root_reviewer_id: &str,
        reviewed_user_id: &str,
        replier_id: &str,
        review_id: &str,
    ) -> AppResult<Vec<notification::Model>> {
        let mut recipients = vec![root_reviewer_id];
        if reviewed_user_id != root_reviewer_id {
            recipients.push(reviewed_user_id);
        }

        let mut created = Vec::with_capacity(recipients.len());
        for recipient_id in recipients {
            if let Some(n) = self
                .notify(
                    recipient_id,
                    replier_id,
                    NotificationType::ReviewReply,
                    Some(review_id),
                )
                .await?
            {
                created.push(n);
            }
        }

        Ok(created)
    }

    /// A page of the recipient's inbox, optionally restricted to one type.
    pub async fn list(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
        page: &PageInput,
    ) -> AppResult<Vec<notification::Model>> {
        let (limit, until_id) = page.resolve(&self.config)?;
        self.store
            .list(recipient_id, notification_type, limit, until_id, false)
            .await
    }

    /// A page of the recipient's unread notifications.
    pub async fn list_unread(
        &self,
        recipient_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<notification::Model>> {
        let (limit, until_id) = page.resolve(&self.config)?;
        self.store
            .list(recipient_id, None, limit, until_id, true)
            .await
    }

    /// Mark one notification read.
    ///
    /// Someone else's notification is reported exactly like a missing one.
    pub async fn mark_as_read(&self, id: &str, recipient_id: &str) -> AppResult<()> {
        if self.store.mark_as_read(id, recipient_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Notification".to_string()))
        }
    }

    /// Mark the whole inbox (or one type of it) read.
    pub async fn mark_all_as_read(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
    ) -> AppResult<u64> {
        self.store
            .mark_all_as_read(recipient_id, notification_type)
            .await
    }

    /// Unread totals for the recipient.
    pub async fn unread_counts(&self, recipient_id: &str) -> AppResult<UnreadCounts> {
        let mut counts = UnreadCounts::default();
        for (t, n) in self.store.count_unread_by_type(recipient_id).await? {
            if n > 0 {
                counts.total += n;
                *counts.by_type.entry(t).or_default() += n;
            }
        }
        Ok(counts)
    }
}
