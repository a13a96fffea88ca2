//! Follow edge repository.

use std::sync::Arc;

use crate::entities::{
    FollowEdge,
    follow_edge::{self, FollowStatus},
};
use chrono::Utc;
use vitrine_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};

/// Follow edge repository for database operations.
///
/// Every mutation is a single guarded statement (or one transaction) so the
/// `(follower_id, followed_id)` uniqueness holds under concurrent callers
/// without surfacing constraint violations.
#[derive(Clone)]
pub struct FollowEdgeRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowEdgeRepository {
    /// Create a new follow edge repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the edge for an ordered pair.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<Option<follow_edge::Model>> {
        FollowEdge::find()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if an edge with the given status exists for the pair.
    pub async fn exists_with_status(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool> {
        let count = FollowEdge::find()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .filter(follow_edge::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Insert the edge unless one already exists for the pair.
    ///
    /// Returns `false` when a concurrent writer (or an earlier call) owns the pair.
    pub async fn insert_if_absent(
        &self,
        id: &str,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool> {
        let result = FollowEdge::insert(new_edge(id, follower_id, followed_id, status))
            .on_conflict(
                OnConflict::columns([
                    follow_edge::Column::FollowerId,
                    follow_edge::Column::FollowedId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(self.db.as_ref())
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Insert the edge, or overwrite the status of the existing one.
    pub async fn upsert(
        &self,
        id: &str,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<follow_edge::Model> {
        FollowEdge::insert(new_edge(id, follower_id, followed_id, status))
            .on_conflict(
                OnConflict::columns([
                    follow_edge::Column::FollowerId,
                    follow_edge::Column::FollowedId,
                ])
                .update_columns([follow_edge::Column::Status, follow_edge::Column::UpdatedAt])
                .to_owned(),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_pair(follower_id, followed_id)
            .await?
            .ok_or_else(|| AppError::Internal("Upserted follow edge vanished".to_string()))
    }

    /// Delete the pair's edge only if it still has the observed status.
    ///
    /// Returns whether a row was removed.
    pub async fn delete_with_status(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool> {
        let result = FollowEdge::delete_many()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .filter(follow_edge::Column::Status.eq(status))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Delete the pair's edge whatever its status. No-op if absent.
    pub async fn delete_by_pair(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        let result = FollowEdge::delete_many()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Transition a pending edge to accepted.
    ///
    /// Returns whether a pending edge was found and updated.
    pub async fn accept_pending(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        let result = FollowEdge::update_many()
            .col_expr(follow_edge::Column::Status, Expr::value(FollowStatus::Accepted))
            .col_expr(follow_edge::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .filter(follow_edge::Column::Status.eq(FollowStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Accept every pending edge targeting a user, returning the follower IDs.
    ///
    /// Runs in one transaction with the pending rows locked, so a concurrent
    /// flip cannot accept (and notify) the same follower twice.
    pub async fn accept_all_pending(&self, followed_id: &str) -> AppResult<Vec<String>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let follower_ids: Vec<String> = FollowEdge::find()
            .select_only()
            .column(follow_edge::Column::FollowerId)
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .filter(follow_edge::Column::Status.eq(FollowStatus::Pending))
            .order_by_asc(follow_edge::Column::Id)
            .lock_exclusive()
            .into_tuple()
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !follower_ids.is_empty() {
            FollowEdge::update_many()
                .col_expr(follow_edge::Column::Status, Expr::value(FollowStatus::Accepted))
                .col_expr(follow_edge::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
                .filter(follow_edge::Column::FollowedId.eq(followed_id))
                .filter(follow_edge::Column::FollowerId.is_in(follower_ids.clone()))
                .filter(follow_edge::Column::Status.eq(FollowStatus::Pending))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(follower_ids)
    }

    /// Get edges targeting a user with the given status (paginated, newest first).
    pub async fn find_incoming(
        &self,
        followed_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let mut query = FollowEdge::find()
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .filter(follow_edge::Column::Status.eq(status))
            .order_by_desc(follow_edge::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow_edge::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get edges originating from a user with the given status (paginated, newest first).
    pub async fn find_outgoing(
        &self,
        follower_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let mut query = FollowEdge::find()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::Status.eq(status))
            .order_by_desc(follow_edge::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow_edge::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every user `follower_id` follows with an accepted edge.
    pub async fn find_followed_ids(&self, follower_id: &str) -> AppResult<Vec<String>> {
        FollowEdge::find()
            .select_only()
            .column(follow_edge::Column::FollowedId)
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::Status.eq(FollowStatus::Accepted))
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count edges targeting a user with the given status.
    pub async fn count_incoming(&self, followed_id: &str, status: FollowStatus) -> AppResult<u64> {
        FollowEdge::find()
            .filter(follow_edge::Column::FollowedId.eq(followed_id))
            .filter(follow_edge::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count edges originating from a user with the given status.
    pub async fn count_outgoing(&self, follower_id: &str, status: FollowStatus) -> AppResult<u64> {
        FollowEdge::find()
            .filter(follow_edge::Column::FollowerId.eq(follower_id))
            .filter(follow_edge::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn new_edge(
    id: &str,
    follower_id: &str,
    followed_id: &str,
    status: FollowStatus,
) -> follow_edge::ActiveModel {
    let now = Utc::now().fixed_offset();
    follow_edge::ActiveModel {
        id: Set(id.to_string()),
        follower_id: Set(follower_id.to_string()),
        followed_id: Set(followed_id.to_string()),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
    }
}
