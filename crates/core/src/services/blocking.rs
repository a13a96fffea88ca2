//! Blocking service.

use std::collections::HashSet;

use tracing::info;
use vitrine_common::{AppError, AppResult, RelationsConfig};
use vitrine_db::entities::block_edge;

use super::{
    directory::UserDirectoryService, graph::GraphStoreService, pagination::PageInput,
};

/// Blocking service for business logic.
///
/// Blocks never touch follow edges; visibility and interaction checks
/// consult the block graph first and override whatever the follow state says.
#[derive(Clone)]
pub struct BlockingService {
    graph: GraphStoreService,
    users: UserDirectoryService,
    config: RelationsConfig,
}

impl BlockingService {
    /// Create a new blocking service.
    #[must_use]
    pub const fn new(
        graph: GraphStoreService,
        users: UserDirectoryService,
        config: RelationsConfig,
    ) -> Self {
        Self {
            graph,
            users,
            config,
        }
    }

    /// Block a user. Idempotent; returns whether a new block was created.
    pub async fn block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        if blocker_id == blocked_id {
            return Err(AppError::InvalidOperation(
                "Cannot block yourself".to_string(),
            ));
        }

        self.users.get_active(blocked_id).await?;

        let created = self.graph.set_block(blocker_id, blocked_id).await?;
        if created {
            info!(blocker_id, blocked_id, "User blocked");
        }
        Ok(created)
    }

    /// Unblock a user. Idempotent; returns whether a block was removed.
    pub async fn unblock(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        let removed = self.graph.clear_block(blocker_id, blocked_id).await?;
        if removed {
            info!(blocker_id, blocked_id, "User unblocked");
        }
        Ok(removed)
    }

    /// Users `blocker_id` has blocked, newest first.
    pub async fn list_blocked(
        &self,
        blocker_id: &str,
        page: &PageInput,
    ) -> AppResult<Vec<block_edge::Model>> {
        let (limit, until_id) = page.resolve(&self.config)?;
        self.graph.blocked_by(blocker_id, limit, until_id).await
    }

    /// Check if `blocker_id` blocks `blocked_id`.
    pub async fn has_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        self.graph.has_blocked(blocker_id, blocked_id).await
    }

    /// True iff neither user has blocked the other.
    ///
    /// Gates likes, comments, messages and reviews.
    pub async fn can_interact(&self, viewer_id: &str, subject_id: &str) -> AppResult<bool> {
        Ok(!self
            .graph
            .block_exists_between(viewer_id, subject_id)
            .await?)
    }

    /// Fail with `Forbidden` unless the two users can interact.
    pub async fn assert_can_interact(&self, viewer_id: &str, subject_id: &str) -> AppResult<()> {
        if self.can_interact(viewer_id, subject_id).await? {
            Ok(())
        } else {
            Err(AppError::blocked())
        }
    }

    /// True iff a new conversation between the two users may be opened.
    pub async fn can_start_chat(&self, a: &str, b: &str) -> AppResult<bool> {
        if a == b {
            return Ok(false);
        }
        self.can_interact(a, b).await
    }

    /// Users on the other side of any block touching `user_id`.
    pub async fn excluded_user_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        self.graph.block_related_ids(user_id).await
    }

    /// Drop the author, duplicates and block-related users from mention candidates.
    ///
    /// Order of first appearance is preserved.
    pub async fn filter_mentionable(
        &self,
        author_id: &str,
        candidate_ids: &[String],
    ) -> AppResult<Vec<String>> {
        let excluded = self.excluded_user_ids(author_id).await?;
        let mut seen = HashSet::new();

        Ok(candidate_ids
            .iter()
            .filter(|id| id.as_str() != author_id && !excluded.contains(id.as_str()))
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect())
    }
}
