//! The relationship and visibility engine as one injectable handle.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use vitrine_common::{AppResult, RelationsConfig};
use vitrine_db::entities::{block_edge, follow_edge, notification};

use crate::services::{
    AccessLevel, BlockingService, DbGraphStore, DbNotificationStore, DbUserDirectory,
    FollowOutcome, FollowingService, GraphStoreService, NotificationService,
    NotificationStoreService, PageInput, ProfileAccess, Resource, UserDirectoryService,
    VisibilityService,
};

/// Entry point for collaborators (publications, reviews, chat, profiles).
///
/// All services share the same stores, so the uniqueness and dedup rules are
/// enforced in one place regardless of which service a caller goes through.
#[derive(Clone)]
pub struct RelationsEngine {
    following: FollowingService,
    blocking: BlockingService,
    visibility: VisibilityService,
    notifications: NotificationService,
}

impl RelationsEngine {
    /// Build the engine over the given stores.
    #[must_use]
    pub fn new(
        graph: GraphStoreService,
        users: UserDirectoryService,
        notification_store: NotificationStoreService,
        config: RelationsConfig,
    ) -> Self {
        let notifications =
            NotificationService::new(notification_store, graph.clone(), config.clone());
        let following = FollowingService::new(
            graph.clone(),
            users.clone(),
            notifications.clone(),
            config.clone(),
        );
        let blocking = BlockingService::new(graph.clone(), users.clone(), config.clone());
        let visibility = VisibilityService::new(graph, users, following.clone(), config);

        Self {
            following,
            blocking,
            visibility,
            notifications,
        }
    }

    /// Build the engine over `PostgreSQL`.
    #[must_use]
    pub fn from_connection(db: Arc<DatabaseConnection>, config: RelationsConfig) -> Self {
        Self::new(
            Arc::new(DbGraphStore::from_connection(db.clone())),
            Arc::new(DbUserDirectory::from_connection(db.clone())),
            Arc::new(DbNotificationStore::from_connection(db)),
            config,
        )
    }

    /// Follow lifecycle, listings and counters.
    #[must_use]
    pub const fn following(&self) -> &FollowingService {
        &self.following
    }

    /// Blocks and the interaction gate.
    #[must_use]
    pub const fn blocking(&self) -> &BlockingService {
        &self.blocking
    }

    /// Visibility policy and profile redaction.
    #[must_use]
    pub const fn visibility(&self) -> &VisibilityService {
        &self.visibility
    }

    /// Notification fan-out and inbox.
    #[must_use]
    pub const fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Access level of the viewer to the subject's profile.
    pub async fn can_view(
        &self,
        viewer_id: Option<&str>,
        subject_id: &str,
    ) -> AppResult<AccessLevel> {
        self.visibility
            .can_view(viewer_id, subject_id, Resource::Profile)
            .await
    }

    /// Profile access with the follow, pending and block flags.
    pub async fn profile_access(
        &self,
        viewer_id: Option<&str>,
        subject_id: &str,
    ) -> AppResult<ProfileAccess> {
        self.visibility.profile_access(viewer_id, subject_id).await
    }

    /// True iff neither user has blocked the other.
    pub async fn can_interact(&self, viewer_id: &str, subject_id: &str) -> AppResult<bool> {
        self.blocking.can_interact(viewer_id, subject_id).await
    }

    /// Follow, request, unfollow or cancel.
    pub async fn toggle_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<FollowOutcome> {
        self.following.toggle_follow(follower_id, followed_id).await
    }

    /// Accept a pending follow request addressed to `target_id`.
    pub async fn accept_follow_request(&self, target_id: &str, follower_id: &str) -> AppResult<()> {
        self.following
            .accept_follow_request(target_id, follower_id)
            .await
    }

    /// Reject a pending follow request addressed to `target_id`.
    pub async fn reject_follow_request(&self, target_id: &str, follower_id: &str) -> AppResult<()> {
        self.following
            .reject_follow_request(target_id, follower_id)
            .await
    }

    /// Pending requests awaiting `target_id`, newest first.
    pub async fn pending_requests_for(
        &self,
        target_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.following.pending_requests_for(target_id, page).await
    }

    /// Block a user. Returns whether a new block was created.
    pub async fn block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        self.blocking.block(blocker_id, blocked_id).await
    }

    /// Remove a block. Returns whether one existed.
    pub async fn unblock(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        self.blocking.unblock(blocker_id, blocked_id).await
    }

    /// Users `blocker_id` has blocked, newest first.
    pub async fn list_blocked(
        &self,
        blocker_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<block_edge::Model>> {
        self.blocking.list_blocked(blocker_id, page).await
    }

    /// Record a social signal. See [`NotificationService::notify`].
    pub async fn notify(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: notification::NotificationType,
        subject_id: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        self.notifications
            .notify(recipient_id, sender_id, notification_type, subject_id)
            .await
    }

    /// Apply a privacy flip. Auto-accepts pending requests when going public.
    ///
    /// Must be called in the same logical transaction as the flag update.
    pub async fn on_privacy_changed(
        &self,
        user_id: &str,
        now_private: bool,
    ) -> AppResult<Vec<String>> {
        self.following.on_privacy_changed(user_id, now_private).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{MemoryGraphStore, MemoryNotificationStore, MemoryUserDirectory};
    use vitrine_common::AppError;
    use vitrine_db::entities::notification::NotificationType;

    struct Fixture {
        engine: RelationsEngine,
        graph: Arc<MemoryGraphStore>,
        users: Arc<MemoryUserDirectory>,
        store: Arc<MemoryNotificationStore>,
    }

    fn setup() -> Fixture {
        let graph = Arc::new(MemoryGraphStore::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        let engine = RelationsEngine::new(
            graph.clone(),
            users.clone(),
            store.clone(),
            RelationsConfig::default(),
        );
        Fixture {
            engine,
            graph,
            users,
            store,
        }
    }

    #[tokio::test]
    async fn test_no_self_edges() {
        let f = setup();
        f.users.add_user("ann", false).await;

        let follow = f.engine.toggle_follow("ann", "ann").await;
        let block = f.engine.block("ann", "ann").await;

        assert!(matches!(follow, Err(AppError::InvalidOperation(_))));
        assert!(matches!(block, Err(AppError::InvalidOperation(_))));
        assert_eq!(f.graph.follow_count().await, 0);
    }

    #[tokio::test]
    async fn test_request_then_cancel_leaves_no_edge() {
        let f = setup();
        f.users.add_user("ann", false).await;
        f.users.add_user("bea", true).await;

        let first = f.engine.toggle_follow("ann", "bea").await.unwrap();
        let second = f.engine.toggle_follow("ann", "bea").await.unwrap();

        assert_eq!(first, FollowOutcome::Requested);
        assert_eq!(second, FollowOutcome::Cancelled);
        assert_eq!(f.graph.follow_count().await, 0);
    }

    #[tokio::test]
    async fn test_blocked_user_cannot_follow() {
        let f = setup();
        f.users.add_user("ann", false).await;
        f.users.add_user("bea", false).await;
        f.engine.block("ann", "bea").await.unwrap();

        let result = f.engine.toggle_follow("bea", "ann").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(f.graph.follow_count().await, 0);
        assert!(!f.engine.can_interact("ann", "bea").await.unwrap());
        assert!(!f.engine.can_interact("bea", "ann").await.unwrap());
    }

    #[tokio::test]
    async fn test_privacy_teaser_then_full() {
        let f = setup();
        f.users.add_user("pia", true).await;
        f.users.add_user("vic", false).await;

        assert_eq!(
            f.engine.can_view(Some("vic"), "pia").await.unwrap(),
            AccessLevel::Teaser
        );

        f.engine.toggle_follow("vic", "pia").await.unwrap();
        let pending = f
            .engine
            .pending_requests_for("pia", &PageInput::first())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        f.engine.accept_follow_request("pia", "vic").await.unwrap();

        assert_eq!(
            f.engine.can_view(Some("vic"), "pia").await.unwrap(),
            AccessLevel::Full
        );
    }

    #[tokio::test]
    async fn test_auto_accept_on_flip() {
        let f = setup();
        f.users.add_user("pia", true).await;
        f.users.add_user("fay", false).await;
        f.users.add_user("fox", false).await;
        f.engine.toggle_follow("fay", "pia").await.unwrap();
        f.engine.toggle_follow("fox", "pia").await.unwrap();

        let mut accepted = f.engine.on_privacy_changed("pia", false).await.unwrap();
        accepted.sort_unstable();

        assert_eq!(accepted, vec!["fay".to_string(), "fox".to_string()]);
        for follower in ["fay", "fox"] {
            let inbox = f.store.addressed_to(follower).await;
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].notification_type, NotificationType::Follow);
            assert_eq!(inbox[0].sender_id, "pia");
        }
        assert!(
            f.engine
                .on_privacy_changed("pia", false)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_like_unlike_like_reuses_notification() {
        let f = setup();

        let first = f
            .engine
            .notify("bea", "ann", NotificationType::Like, Some("pub1"))
            .await
            .unwrap()
            .unwrap();
        f.engine
            .notifications()
            .mark_as_read(&first.id, "bea")
            .await
            .unwrap();
        let second = f
            .engine
            .notify("bea", "ann", NotificationType::Like, Some("pub1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_read());
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_blocked_and_unblock() {
        let f = setup();
        f.users.add_user("ann", false).await;
        f.users.add_user("bea", false).await;
        f.engine.block("ann", "bea").await.unwrap();

        let blocked = f
            .engine
            .list_blocked("ann", &PageInput::first())
            .await
            .unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].blocked_id, "bea");

        assert!(f.engine.unblock("ann", "bea").await.unwrap());
        assert!(f.engine.can_interact("bea", "ann").await.unwrap());
    }
}
