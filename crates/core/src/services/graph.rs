//! Relationship graph store.
//!
//! The authoritative store for follow and block edges. Services depend on the
//! [`GraphStore`] trait; [`DbGraphStore`] backs it with `PostgreSQL`, and
//! [`MemoryGraphStore`](super::memory::MemoryGraphStore) keeps everything in process.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use vitrine_common::{AppError, AppResult, IdGenerator};
use vitrine_db::{
    entities::{
        block_edge,
        follow_edge::{self, FollowStatus},
    },
    repositories::{BlockEdgeRepository, FollowEdgeRepository},
};

/// Atomic operations over the follow and block graphs.
///
/// Every mutation must hold the one-edge-per-ordered-pair invariant under
/// concurrent callers: duplicate writes collapse, they never fail.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// The edge for `(follower_id, followed_id)`, in any status.
    async fn find_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<Option<follow_edge::Model>>;

    /// True iff an accepted edge `viewer_id -> target_id` exists.
    async fn is_following(&self, viewer_id: &str, target_id: &str) -> AppResult<bool> {
        Ok(self
            .find_follow(viewer_id, target_id)
            .await?
            .is_some_and(|e| e.is_accepted()))
    }

    /// True iff a pending edge `from_id -> to_id` exists.
    async fn has_pending_request(&self, from_id: &str, to_id: &str) -> AppResult<bool> {
        Ok(self
            .find_follow(from_id, to_id)
            .await?
            .is_some_and(|e| e.is_pending()))
    }

    /// Create the edge unless the pair already has one. Returns whether it was created.
    async fn insert_follow_if_absent(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool>;

    /// Create the edge or replace the status of the existing one.
    async fn upsert_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<follow_edge::Model>;

    /// Delete the edge only if it still has `status`. Returns whether it was deleted.
    async fn delete_follow_with_status(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool>;

    /// Delete the edge in any status. No-op if absent.
    async fn delete_follow(&self, follower_id: &str, followed_id: &str) -> AppResult<bool>;

    /// Move a pending edge to accepted. Returns whether a pending edge existed.
    async fn accept_pending(&self, follower_id: &str, followed_id: &str) -> AppResult<bool>;

    /// Accept every pending edge targeting `followed_id`, returning the follower IDs.
    ///
    /// A follower is returned by at most one of any set of concurrent calls.
    async fn accept_all_pending(&self, followed_id: &str) -> AppResult<Vec<String>>;

    /// Edges targeting `user_id` with the given status, newest first.
    async fn incoming(
        &self,
        user_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>>;

    /// Edges originating from `user_id` with the given status, newest first.
    async fn outgoing(
        &self,
        user_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>>;

    /// IDs `user_id` follows with an accepted edge.
    async fn followed_ids(&self, user_id: &str) -> AppResult<HashSet<String>>;

    /// Number of edges targeting `user_id` with the given status.
    async fn count_incoming(&self, user_id: &str, status: FollowStatus) -> AppResult<u64>;

    /// Number of edges originating from `user_id` with the given status.
    async fn count_outgoing(&self, user_id: &str, status: FollowStatus) -> AppResult<u64>;

    /// True iff `blocker_id` blocks `blocked_id`.
    async fn has_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool>;

    /// True iff `other_id` blocks `subject_id`.
    async fn is_blocked_by(&self, subject_id: &str, other_id: &str) -> AppResult<bool> {
        self.has_blocked(other_id, subject_id).await
    }

    /// True iff a block exists in either direction.
    async fn block_exists_between(&self, a: &str, b: &str) -> AppResult<bool>;

    /// Create the block edge. Returns whether it was created.
    async fn set_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool>;

    /// Remove the block edge. Returns whether one existed.
    async fn clear_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool>;

    /// Block edges created by `blocker_id`, newest first.
    async fn blocked_by(
        &self,
        blocker_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<block_edge::Model>>;

    /// Every user on the other end of a block touching `user_id`, either direction.
    async fn block_related_ids(&self, user_id: &str) -> AppResult<HashSet<String>>;
}

/// Shared handle to a graph store.
pub type GraphStoreService = Arc<dyn GraphStore>;

/// Database-backed graph store.
#[derive(Clone)]
pub struct DbGraphStore {
    follow_repo: FollowEdgeRepository,
    block_repo: BlockEdgeRepository,
    id_gen: IdGenerator,
}

impl DbGraphStore {
    /// Create a new database-backed graph store.
    #[must_use]
    pub const fn new(follow_repo: FollowEdgeRepository, block_repo: BlockEdgeRepository) -> Self {
        Self {
            follow_repo,
            block_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a graph store over a connection.
    #[must_use]
    pub fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self::new(
            FollowEdgeRepository::new(db.clone()),
            BlockEdgeRepository::new(db),
        )
    }
}

/// Reject edges from a user to themselves.
pub(crate) fn ensure_distinct(from_id: &str, to_id: &str, action: &str) -> AppResult<()> {
    if from_id == to_id {
        return Err(AppError::InvalidOperation(format!(
            "Cannot {action} yourself"
        )));
    }
    Ok(())
}

#[async_trait]
impl GraphStore for DbGraphStore {
    async fn find_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<Option<follow_edge::Model>> {
        self.follow_repo.find_by_pair(follower_id, followed_id).await
    }

    async fn is_following(&self, viewer_id: &str, target_id: &str) -> AppResult<bool> {
        self.follow_repo
            .exists_with_status(viewer_id, target_id, FollowStatus::Accepted)
            .await
    }

    async fn has_pending_request(&self, from_id: &str, to_id: &str) -> AppResult<bool> {
        self.follow_repo
            .exists_with_status(from_id, to_id, FollowStatus::Pending)
            .await
    }

    async fn insert_follow_if_absent(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool> {
        ensure_distinct(follower_id, followed_id, "follow")?;
        self.follow_repo
            .insert_if_absent(&self.id_gen.generate(), follower_id, followed_id, status)
            .await
    }

    async fn upsert_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<follow_edge::Model> {
        ensure_distinct(follower_id, followed_id, "follow")?;
        self.follow_repo
            .upsert(&self.id_gen.generate(), follower_id, followed_id, status)
            .await
    }

    async fn delete_follow_with_status(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool> {
        self.follow_repo
            .delete_with_status(follower_id, followed_id, status)
            .await
    }

    async fn delete_follow(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        self.follow_repo.delete_by_pair(follower_id, followed_id).await
    }

    async fn accept_pending(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        self.follow_repo.accept_pending(follower_id, followed_id).await
    }

    async fn accept_all_pending(&self, followed_id: &str) -> AppResult<Vec<String>> {
        self.follow_repo.accept_all_pending(followed_id).await
    }

    async fn incoming(
        &self,
        user_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.follow_repo
            .find_incoming(user_id, status, limit, until_id)
            .await
    }

    async fn outgoing(
        &self,
        user_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        self.follow_repo
            .find_outgoing(user_id, status, limit, until_id)
            .await
    }

    async fn followed_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        Ok(self
            .follow_repo
            .find_followed_ids(user_id)
            .await?
            .into_iter()
            .collect())
    }

    async fn count_incoming(&self, user_id: &str, status: FollowStatus) -> AppResult<u64> {
        self.follow_repo.count_incoming(user_id, status).await
    }

    async fn count_outgoing(&self, user_id: &str, status: FollowStatus) -> AppResult<u64> {
        self.follow_repo.count_outgoing(user_id, status).await
    }

    async fn has_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        self.block_repo.is_blocking(blocker_id, blocked_id).await
    }

    async fn block_exists_between(&self, a: &str, b: &str) -> AppResult<bool> {
        self.block_repo.exists_between(a, b).await
    }

    async fn set_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        ensure_distinct(blocker_id, blocked_id, "block")?;
        self.block_repo
            .insert_if_absent(&self.id_gen.generate(), blocker_id, blocked_id)
            .await
    }

    async fn clear_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        self.block_repo.delete_by_pair(blocker_id, blocked_id).await
    }

    async fn blocked_by(
        &self,
        blocker_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<block_edge::Model>> {
        self.block_repo
            .find_blocking(blocker_id, limit, until_id)
            .await
    }

    async fn block_related_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        Ok(self
            .block_repo
            .find_involving(user_id)
            .await?
            .into_iter()
            .map(|b| {
                if b.blocker_id == user_id {
                    b.blocked_id
                } else {
                    b.blocker_id
                }
            })
            .collect())
    }
}
