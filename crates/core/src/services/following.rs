//! Following service: the follow request lifecycle.

use serde::Serialize;
use tracing::{info, warn};
use vitrine_common::{AppError, AppResult, RelationsConfig};
use vitrine_db::entities::{
    follow_edge::{self, FollowStatus},
    notification::NotificationType,
};

use super::{
    directory::UserDirectoryService, graph::GraphStoreService, notification::NotificationService,
    pagination::PageInput,
};

/// What a follow toggle did, judged from the edge state it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOutcome {
    /// No edge before; the target is public and is now followed.
    Followed,
    /// An accepted edge was removed.
    Unfollowed,
    /// No edge before; the target is private and a request is pending.
    Requested,
    /// A pending request was withdrawn.
    Cancelled,
}

/// Aggregate follow counters for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationCounts {
    pub followers: u64,
    pub following: u64,
    pub pending_requests: u64,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    graph: GraphStoreService,
    users: UserDirectoryService,
    notifications: NotificationService,
    config: RelationsConfig,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(
        graph: GraphStoreService,
        users: UserDirectoryService,
        notifications: NotificationService,
        config: RelationsConfig,
    ) -> Self {
        Self {
            graph,
            users,
            notifications,
            config,
        }
    }

    /// Follow, request, unfollow or cancel, depending on the current edge.
    ///
    /// Each attempt reads the edge and then applies one conditional write
    /// (insert-if-absent or delete-if-unchanged). If a concurrent toggle on the
    /// same pair changed the edge in between, the write does nothing and the
    /// decision is taken again, so the reported outcome is always the one this
    /// call produced.
    pub async fn toggle_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<FollowOutcome> {
        if follower_id == followed_id {
            return Err(AppError::InvalidOperation(
                "Cannot follow yourself".to_string(),
            ));
        }

        let mut target = self.users.get_active(followed_id).await?;

        if self
            .graph
            .block_exists_between(follower_id, followed_id)
            .await?
        {
            return Err(AppError::blocked());
        }

        let attempts = self.config.toggle_retry_limit.max(1);
        for attempt in 1..=attempts {
            match self.graph.find_follow(follower_id, followed_id).await? {
                Some(edge) => {
                    if self
                        .graph
                        .delete_follow_with_status(follower_id, followed_id, edge.status)
                        .await?
                    {
                        let outcome = if edge.is_pending() {
                            FollowOutcome::Cancelled
                        } else {
                            FollowOutcome::Unfollowed
                        };
                        info!(follower_id, followed_id, ?outcome, "Follow toggled");
                        return Ok(outcome);
                    }
                }
                None => {
                    let (status, outcome, notification_type) = if target.is_private {
                        (
                            FollowStatus::Pending,
                            FollowOutcome::Requested,
                            NotificationType::FollowRequest,
                        )
                    } else {
                        (
                            FollowStatus::Accepted,
                            FollowOutcome::Followed,
                            NotificationType::Follow,
                        )
                    };

                    if self
                        .graph
                        .insert_follow_if_absent(follower_id, followed_id, status)
                        .await?
                    {
                        let (outcome, notification_type) = if status == FollowStatus::Pending
                            && self.settle_request(follower_id, followed_id).await?
                        {
                            (FollowOutcome::Followed, NotificationType::Follow)
                        } else {
                            (outcome, notification_type)
                        };

                        info!(follower_id, followed_id, ?outcome, "Follow toggled");
                        self.notify_quietly(followed_id, follower_id, notification_type)
                            .await;
                        return Ok(outcome);
                    }
                }
            }

            warn!(
                follower_id,
                followed_id, attempt, "Follow edge changed concurrently, retrying toggle"
            );
            target = self.users.get_active(followed_id).await?;
        }

        Err(AppError::Conflict(
            "Follow state is changing concurrently".to_string(),
        ))
    }

    /// Accept a pending request from `follower_id` to `target_id`.
    pub async fn accept_follow_request(&self, target_id: &str, follower_id: &str) -> AppResult<()> {
        self.users.get_active(follower_id).await?;

        if self
            .graph
            .block_exists_between(target_id, follower_id)
            .await?
        {
            return Err(AppError::blocked());
        }

        if !self.graph.accept_pending(follower_id, target_id).await? {
            return Err(AppError::NotFound("Follow request".to_string()));
        }

        info!(follower_id, target_id, "Follow request accepted");
        self.notify_quietly(follower_id, target_id, NotificationType::Follow)
            .await;

        Ok(())
    }

    /// Reject a pending request from `follower_id` to `target_id`.
    pub async fn reject_follow_request(&self, target_id: &str, follower_id: &str) -> AppResult<()> {
        if self
            .graph
            .block_exists_between(target_id, follower_id)
            .await?
        {
            return Err(AppError::blocked());
        }

        if !self
            .graph
            .delete_follow_with_status(follower_id, target_id, FollowStatus::Pending)
            .await?
        {
            return Err(AppError::NotFound("Follow request".to_string()));
        }

        info!(follower_id, target_id, "Follow request rejected");
        Ok(())
    }

    /// Pending requests awaiting `target_id`'s decision, newest first.
    pub async fn pending_requests_for(
        &self,
        target_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let (limit, until_id) = page.resolve(&self.config)?;
        self.graph
            .incoming(target_id, FollowStatus::Pending, limit, until_id)
            .await
    }

    /// Requests `user_id` has sent that are still pending, newest first.
    pub async fn pending_requests_sent_by(
        &self,
        user_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let (limit, until_id) = page.resolve(&self.config)?;
        self.graph
            .outgoing(user_id, FollowStatus::Pending, limit, until_id)
            .await
    }

    /// Accepted followers of `user_id`, newest first.
    pub async fn followers(
        &self,
        user_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let (limit, until_id) = page.resolve(&self.config)?;
        self.graph
            .incoming(user_id, FollowStatus::Accepted, limit, until_id)
            .await
    }

    /// Users `user_id` follows with an accepted edge, newest first.
    pub async fn following(
        &self,
        user_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let (limit, until_id) = page.resolve(&self.config)?;
        self.graph
            .outgoing(user_id, FollowStatus::Accepted, limit, until_id)
            .await
    }

    /// Follower, following and pending-request counters.
    pub async fn counts(&self, user_id: &str) -> AppResult<RelationCounts> {
        Ok(RelationCounts {
            followers: self
                .graph
                .count_incoming(user_id, FollowStatus::Accepted)
                .await?,
            following: self
                .graph
                .count_outgoing(user_id, FollowStatus::Accepted)
                .await?,
            pending_requests: self
                .graph
                .count_incoming(user_id, FollowStatus::Pending)
                .await?,
        })
    }

    /// React to a change of `user_id`'s privacy flag.
    ///
    /// Going public accepts every pending request in one step and notifies
    /// each former requester. Going private leaves existing edges alone.
    /// Returns the IDs of the followers that were accepted.
    pub async fn on_privacy_changed(
        &self,
        user_id: &str,
        now_private: bool,
    ) -> AppResult<Vec<String>> {
        if now_private {
            return Ok(Vec::new());
        }

        let accepted = self.graph.accept_all_pending(user_id).await?;

        if !accepted.is_empty() {
            info!(
                user_id,
                count = accepted.len(),
                "Pending follow requests auto-accepted"
            );
        }

        for follower_id in &accepted {
            self.notify_quietly(follower_id, user_id, NotificationType::Follow)
                .await;
        }

        Ok(accepted)
    }

    /// Store a new privacy flag and apply its consequences.
    ///
    /// Submitting "public" always sweeps leftover pending requests, so a flip
    /// whose auto-accept failed after the flag was written is completed by the
    /// next submission. The sweep only notifies followers it accepts itself.
    /// Returns whether the flag changed.
    pub async fn update_privacy(&self, user_id: &str, is_private: bool) -> AppResult<bool> {
        let user = self.users.get_active(user_id).await?;
        let changed = user.is_private != is_private;

        if changed && !self.users.set_private(user_id, is_private).await? {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }

        if changed || !is_private {
            self.on_privacy_changed(user_id, is_private).await?;
        }
        Ok(changed)
    }

    /// Resolve a request that was inserted while the target went public.
    ///
    /// The flip's bulk accept may have run before the edge existed. Returns
    /// whether the edge ended up accepted.
    async fn settle_request(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        let now_public = self
            .users
            .find_user(followed_id)
            .await?
            .is_some_and(|u| !u.is_private && !u.is_deleted());
        if !now_public {
            return Ok(false);
        }

        if self.graph.accept_pending(follower_id, followed_id).await? {
            info!(
                follower_id,
                followed_id, "Request raced a privacy flip, accepted"
            );
            return Ok(true);
        }

        self.graph.is_following(follower_id, followed_id).await
    }

    /// Notification is a side effect of an already-applied transition.
    async fn notify_quietly(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
    ) {
        if let Err(e) = self
            .notifications
            .notify(recipient_id, sender_id, notification_type, None)
            .await
        {
            warn!(
                error = %e,
                recipient_id,
                sender_id,
                notification_type = notification_type.as_str(),
                "Failed to record follow notification"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{
        graph::GraphStore,
        memory::{MemoryGraphStore, MemoryNotificationStore, MemoryUserDirectory},
    };
    use crate::services::directory::UserDirectory;
    use async_trait::async_trait;
    use futures::future::join_all;
    use std::collections::HashSet;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };
    use tokio::sync::Mutex;
    use vitrine_db::entities::block_edge;

    struct Fixture {
        service: FollowingService,
        graph: Arc<MemoryGraphStore>,
        users: Arc<MemoryUserDirectory>,
        notifications: Arc<MemoryNotificationStore>,
    }

    async fn setup(users: &[(&str, bool)]) -> Fixture {
        let graph = Arc::new(MemoryGraphStore::new());
        let directory = Arc::new(MemoryUserDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        let config = RelationsConfig::default();

        for (id, is_private) in users {
            directory.add_user(id, *is_private).await;
        }

        let notifications = NotificationService::new(store.clone(), graph.clone(), config.clone());
        let service = FollowingService::new(graph.clone(), directory.clone(), notifications, config);

        Fixture {
            service,
            graph,
            users: directory,
            notifications: store,
        }
    }

    #[tokio::test]
    async fn test_follow_yourself_returns_error() {
        let f = setup(&[("alice", false)]).await;

        let result = f.service.toggle_follow("alice", "alice").await;

        assert!(matches!(result, Err(AppError::InvalidOperation(_))));
        assert_eq!(f.graph.follow_count().await, 0);
    }

    #[tokio::test]
    async fn test_follow_public_user() {
        let f = setup(&[("alice", false), ("bob", false)]).await;

        let outcome = f.service.toggle_follow("alice", "bob").await.unwrap();

        assert_eq!(outcome, FollowOutcome::Followed);
        assert!(f.graph.is_following("alice", "bob").await.unwrap());

        let inbox = f.notifications.addressed_to("bob").await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::Follow);
        assert_eq!(inbox[0].sender_id, "alice");
        assert!(inbox[0].subject_id.is_none());
    }

    #[tokio::test]
    async fn test_unfollow_public_user() {
        let f = setup(&[("alice", false), ("bob", false)]).await;

        f.service.toggle_follow("alice", "bob").await.unwrap();
        let outcome = f.service.toggle_follow("alice", "bob").await.unwrap();

        assert_eq!(outcome, FollowOutcome::Unfollowed);
        assert_eq!(f.graph.follow_count().await, 0);
    }

    #[tokio::test]
    async fn test_request_then_cancel_private_user() {
        let f = setup(&[("alice", false), ("bob", true)]).await;

        let first = f.service.toggle_follow("alice", "bob").await.unwrap();
        assert_eq!(first, FollowOutcome::Requested);
        assert!(f.graph.has_pending_request("alice", "bob").await.unwrap());

        let inbox = f.notifications.addressed_to("bob").await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::FollowRequest);

        let second = f.service.toggle_follow("alice", "bob").await.unwrap();
        assert_eq!(second, FollowOutcome::Cancelled);
        assert_eq!(f.graph.follow_count().await, 0);
    }

    #[tokio::test]
    async fn test_follow_missing_or_deleted_user() {
        let f = setup(&[("alice", false), ("bob", false)]).await;
        f.users.soft_delete("bob").await;

        let deleted = f.service.toggle_follow("alice", "bob").await;
        assert!(matches!(deleted, Err(AppError::UserNotFound(_))));

        let missing = f.service.toggle_follow("alice", "nobody").await;
        assert!(matches!(missing, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_blocked_user_cannot_follow_blocker() {
        let f = setup(&[("alice", false), ("bob", false)]).await;
        f.graph.set_block("alice", "bob").await.unwrap();

        let result = f.service.toggle_follow("bob", "alice").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(f.graph.follow_count().await, 0);

        let reverse = f.service.toggle_follow("alice", "bob").await;
        assert!(matches!(reverse, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_accept_follow_request() {
        let f = setup(&[("alice", false), ("bob", true)]).await;
        f.service.toggle_follow("alice", "bob").await.unwrap();

        f.service.accept_follow_request("bob", "alice").await.unwrap();

        assert!(f.graph.is_following("alice", "bob").await.unwrap());
        let inbox = f.notifications.addressed_to("alice").await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::Follow);
        assert_eq!(inbox[0].sender_id, "bob");

        // Nothing left to accept.
        let again = f.service.accept_follow_request("bob", "alice").await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reject_follow_request() {
        let f = setup(&[("alice", false), ("bob", true)]).await;
        f.service.toggle_follow("alice", "bob").await.unwrap();

        f.service.reject_follow_request("bob", "alice").await.unwrap();

        assert_eq!(f.graph.follow_count().await, 0);
        assert!(f.notifications.addressed_to("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_reject_does_not_touch_accepted_follow() {
        let f = setup(&[("alice", false), ("bob", false)]).await;
        f.service.toggle_follow("alice", "bob").await.unwrap();

        let result = f.service.reject_follow_request("bob", "alice").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(f.graph.is_following("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_accept_and_reject_guarded_by_block() {
        let f = setup(&[("alice", false), ("bob", true)]).await;
        f.service.toggle_follow("alice", "bob").await.unwrap();
        f.graph.set_block("alice", "bob").await.unwrap();

        let accept = f.service.accept_follow_request("bob", "alice").await;
        assert!(matches!(accept, Err(AppError::Forbidden(_))));

        let reject = f.service.reject_follow_request("bob", "alice").await;
        assert!(matches!(reject, Err(AppError::Forbidden(_))));

        assert!(f.graph.has_pending_request("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_privacy_flip_accepts_all_pending() {
        let f = setup(&[("p", true), ("f1", false), ("f2", false), ("f3", false)]).await;
        f.service.toggle_follow("f1", "p").await.unwrap();
        f.service.toggle_follow("f2", "p").await.unwrap();

        let changed = f.service.update_privacy("p", false).await.unwrap();
        assert!(changed);

        assert!(f.graph.is_following("f1", "p").await.unwrap());
        assert!(f.graph.is_following("f2", "p").await.unwrap());

        for follower in ["f1", "f2"] {
            let inbox = f.notifications.addressed_to(follower).await;
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].notification_type, NotificationType::Follow);
            assert_eq!(inbox[0].sender_id, "p");
        }
        assert!(f.notifications.addressed_to("f3").await.is_empty());

        // Same value again: no flip, no extra notifications.
        assert!(!f.service.update_privacy("p", false).await.unwrap());
        assert_eq!(f.notifications.addressed_to("f1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_going_private_keeps_accepted_followers() {
        let f = setup(&[("p", false), ("f1", false)]).await;
        f.service.toggle_follow("f1", "p").await.unwrap();

        assert!(f.service.update_privacy("p", true).await.unwrap());

        assert!(f.graph.is_following("f1", "p").await.unwrap());
        let outcome = f.service.toggle_follow("f1", "p").await.unwrap();
        assert_eq!(outcome, FollowOutcome::Unfollowed);
    }

    #[tokio::test]
    async fn test_listings_and_counts() {
        let f = setup(&[("p", true), ("a", false), ("b", false), ("c", false)]).await;
        f.service.toggle_follow("a", "p").await.unwrap();
        f.service.toggle_follow("b", "p").await.unwrap();
        f.service.toggle_follow("c", "p").await.unwrap();
        f.service.toggle_follow("p", "a").await.unwrap();
        f.service.accept_follow_request("p", "a").await.unwrap();

        let pending = f
            .service
            .pending_requests_for("p", &PageInput::first())
            .await
            .unwrap();
        let mut requesters: Vec<_> = pending.iter().map(|e| e.follower_id.as_str()).collect();
        requesters.sort_unstable();
        assert_eq!(requesters, vec!["b", "c"]);

        let sent = f
            .service
            .pending_requests_sent_by("b", &PageInput::first())
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].followed_id, "p");

        let counts = f.service.counts("p").await.unwrap();
        assert_eq!(
            counts,
            RelationCounts {
                followers: 1,
                following: 1,
                pending_requests: 2,
            }
        );

        let followers = f.service.followers("p", &PageInput::first()).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].follower_id, "a");

        let following = f.service.following("p", &PageInput::first()).await.unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].followed_id, "a");
    }

    #[tokio::test]
    async fn test_pending_requests_paginate() {
        let f = setup(&[("p", true), ("a", false), ("b", false), ("c", false)]).await;
        for follower in ["a", "b", "c"] {
            f.service.toggle_follow(follower, "p").await.unwrap();
        }

        let first = f
            .service
            .pending_requests_for("p", &PageInput::with_limit(2))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let rest = f
            .service
            .pending_requests_for("p", &PageInput::with_limit(2).until(first[1].id.clone()))
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert!(!first.iter().any(|e| e.id == rest[0].id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_leave_at_most_one_edge() {
        for is_private in [false, true] {
            let f = setup(&[("alice", false), ("bob", is_private)]).await;

            let results = join_all((0..12).map(|_| {
                let service = f.service.clone();
                tokio::spawn(async move { service.toggle_follow("alice", "bob").await })
            }))
            .await;

            let mut created = 0i64;
            let mut removed = 0i64;
            for result in results {
                match result.unwrap() {
                    Ok(FollowOutcome::Followed | FollowOutcome::Requested) => created += 1,
                    Ok(FollowOutcome::Unfollowed | FollowOutcome::Cancelled) => removed += 1,
                    Err(AppError::Conflict(_)) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }

            // Every reported outcome matches a transition that really happened.
            let edges = f.graph.follow_count().await;
            assert!(edges <= 1);
            assert_eq!(created - removed, i64::try_from(edges).unwrap());
        }
    }

    /// Memory graph whose bulk accept can fail once, and which can run a
    /// privacy flip right before the next follow insert.
    #[derive(Default)]
    struct ScriptedGraph {
        inner: MemoryGraphStore,
        fail_bulk_accept: AtomicBool,
        flip_before_insert: Mutex<Option<(Arc<MemoryUserDirectory>, String)>>,
    }

    impl ScriptedGraph {
        fn fail_next_bulk_accept(&self) {
            self.fail_bulk_accept.store(true, Ordering::SeqCst);
        }

        async fn go_public_before_next_insert(&self, users: Arc<MemoryUserDirectory>, id: &str) {
            *self.flip_before_insert.lock().await = Some((users, id.to_string()));
        }
    }

    #[async_trait]
    impl GraphStore for ScriptedGraph {
        async fn find_follow(
            &self,
            follower_id: &str,
            followed_id: &str,
        ) -> AppResult<Option<follow_edge::Model>> {
            self.inner.find_follow(follower_id, followed_id).await
        }

        async fn insert_follow_if_absent(
            &self,
            follower_id: &str,
            followed_id: &str,
            status: FollowStatus,
        ) -> AppResult<bool> {
            let flip = self.flip_before_insert.lock().await.take();
            if let Some((users, user_id)) = flip {
                users.set_private(&user_id, false).await?;
                self.inner.accept_all_pending(&user_id).await?;
            }
            self.inner
                .insert_follow_if_absent(follower_id, followed_id, status)
                .await
        }

        async fn upsert_follow(
            &self,
            follower_id: &str,
            followed_id: &str,
            status: FollowStatus,
        ) -> AppResult<follow_edge::Model> {
            self.inner
                .upsert_follow(follower_id, followed_id, status)
                .await
        }

        async fn delete_follow_with_status(
            &self,
            follower_id: &str,
            followed_id: &str,
            status: FollowStatus,
        ) -> AppResult<bool> {
            self.inner
                .delete_follow_with_status(follower_id, followed_id, status)
                .await
        }

        async fn delete_follow(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
            self.inner.delete_follow(follower_id, followed_id).await
        }

        async fn accept_pending(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
            self.inner.accept_pending(follower_id, followed_id).await
        }

        async fn accept_all_pending(&self, followed_id: &str) -> AppResult<Vec<String>> {
            if self.fail_bulk_accept.swap(false, Ordering::SeqCst) {
                return Err(AppError::Database("connection reset".to_string()));
            }
            self.inner.accept_all_pending(followed_id).await
        }

        async fn incoming(
            &self,
            user_id: &str,
            status: FollowStatus,
            limit: u64,
            until_id: Option<&str>,
        ) -> AppResult<Vec<follow_edge::Model>> {
            self.inner.incoming(user_id, status, limit, until_id).await
        }

        async fn outgoing(
            &self,
            user_id: &str,
            status: FollowStatus,
            limit: u64,
            until_id: Option<&str>,
        ) -> AppResult<Vec<follow_edge::Model>> {
            self.inner.outgoing(user_id, status, limit, until_id).await
        }

        async fn followed_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
            self.inner.followed_ids(user_id).await
        }

        async fn count_incoming(&self, user_id: &str, status: FollowStatus) -> AppResult<u64> {
            self.inner.count_incoming(user_id, status).await
        }

        async fn count_outgoing(&self, user_id: &str, status: FollowStatus) -> AppResult<u64> {
            self.inner.count_outgoing(user_id, status).await
        }

        async fn has_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
            self.inner.has_blocked(blocker_id, blocked_id).await
        }

        async fn block_exists_between(&self, a: &str, b: &str) -> AppResult<bool> {
            self.inner.block_exists_between(a, b).await
        }

        async fn set_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
            self.inner.set_block(blocker_id, blocked_id).await
        }

        async fn clear_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
            self.inner.clear_block(blocker_id, blocked_id).await
        }

        async fn blocked_by(
            &self,
            blocker_id: &str,
            limit: u64,
            until_id: Option<&str>,
        ) -> AppResult<Vec<block_edge::Model>> {
            self.inner.blocked_by(blocker_id, limit, until_id).await
        }

        async fn block_related_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
            self.inner.block_related_ids(user_id).await
        }
    }

    struct ScriptedFixture {
        service: FollowingService,
        graph: Arc<ScriptedGraph>,
        users: Arc<MemoryUserDirectory>,
        notifications: Arc<MemoryNotificationStore>,
    }

    async fn scripted_setup(users: &[(&str, bool)]) -> ScriptedFixture {
        let graph = Arc::new(ScriptedGraph::default());
        let directory = Arc::new(MemoryUserDirectory::new());
        let store = Arc::new(MemoryNotificationStore::new());
        let config = RelationsConfig::default();

        for (id, is_private) in users {
            directory.add_user(id, *is_private).await;
        }

        let notifications = NotificationService::new(store.clone(), graph.clone(), config.clone());
        let service = FollowingService::new(graph.clone(), directory.clone(), notifications, config);

        ScriptedFixture {
            service,
            graph,
            users: directory,
            notifications: store,
        }
    }

    #[tokio::test]
    async fn test_failed_privacy_flip_completes_on_resubmit() {
        let f = scripted_setup(&[("p", true), ("f", false)]).await;
        f.service.toggle_follow("f", "p").await.unwrap();

        f.graph.fail_next_bulk_accept();
        let first = f.service.update_privacy("p", false).await;
        assert!(matches!(first, Err(AppError::Database(_))));

        // The flag was written before the auto-accept failed.
        let p = f.users.find_user("p").await.unwrap().unwrap();
        assert!(!p.is_private);
        assert!(f.graph.has_pending_request("f", "p").await.unwrap());

        let changed = f.service.update_privacy("p", false).await.unwrap();
        assert!(!changed);
        assert!(f.graph.is_following("f", "p").await.unwrap());
        assert!(!f.graph.has_pending_request("f", "p").await.unwrap());

        let inbox = f.notifications.addressed_to("f").await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::Follow);

        // Nothing left to sweep: no further notifications.
        f.service.update_privacy("p", false).await.unwrap();
        assert_eq!(f.notifications.addressed_to("f").await.len(), 1);
    }

    #[tokio::test]
    async fn test_request_racing_privacy_flip_is_accepted() {
        let f = scripted_setup(&[("p", true), ("f", false)]).await;
        f.graph
            .go_public_before_next_insert(f.users.clone(), "p")
            .await;

        let outcome = f.service.toggle_follow("f", "p").await.unwrap();

        assert_eq!(outcome, FollowOutcome::Followed);
        assert!(f.graph.is_following("f", "p").await.unwrap());

        let counts = f.service.counts("p").await.unwrap();
        assert_eq!(counts.followers, 1);
        assert_eq!(counts.pending_requests, 0);

        let inbox = f.notifications.addressed_to("p").await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::Follow);
    }

    #[tokio::test]
    async fn test_accept_request_from_deleted_user() {
        let f = setup(&[("p", true), ("f", false)]).await;
        f.service.toggle_follow("f", "p").await.unwrap();
        f.users.soft_delete("f").await;

        let result = f.service.accept_follow_request("p", "f").await;

        assert!(matches!(result, Err(AppError::UserNotFound(_))));
        assert!(f.graph.has_pending_request("f", "p").await.unwrap());
        assert!(f.notifications.addressed_to("f").await.is_empty());
    }
}
