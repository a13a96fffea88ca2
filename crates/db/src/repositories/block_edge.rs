//! Block edge repository.

use std::sync::Arc;

use crate::entities::{BlockEdge, block_edge};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::OnConflict,
};
use vitrine_common::{AppError, AppResult};

/// Block edge repository for database operations.
#[derive(Clone)]
pub struct BlockEdgeRepository {
    db: Arc<DatabaseConnection>,
}

impl BlockEdgeRepository {
    /// Create a new block edge repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the edge for an ordered pair.
    pub async fn find_by_pair(
        &self,
        blocker_id: &str,
        blocked_id: &str,
    ) -> AppResult<Option<block_edge::Model>> {
        BlockEdge::find()
            .filter(block_edge::Column::BlockerId.eq(blocker_id))
            .filter(block_edge::Column::BlockedId.eq(blocked_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if `blocker_id` blocks `blocked_id`.
    pub async fn is_blocking(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        let count = BlockEdge::find()
            .filter(block_edge::Column::BlockerId.eq(blocker_id))
            .filter(block_edge::Column::BlockedId.eq(blocked_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Check for a block in either direction between two users.
    pub async fn exists_between(&self, a: &str, b: &str) -> AppResult<bool> {
        let count = BlockEdge::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(block_edge::Column::BlockerId.eq(a))
                            .add(block_edge::Column::BlockedId.eq(b)),
                    )
                    .add(
                        Condition::all()
                            .add(block_edge::Column::BlockerId.eq(b))
                            .add(block_edge::Column::BlockedId.eq(a)),
                    ),
            )
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Insert the edge unless the pair is already blocked.
    ///
    /// Returns whether a row was created.
    pub async fn insert_if_absent(
        &self,
        id: &str,
        blocker_id: &str,
        blocked_id: &str,
    ) -> AppResult<bool> {
        let model = block_edge::ActiveModel {
            id: Set(id.to_string()),
            blocker_id: Set(blocker_id.to_string()),
            blocked_id: Set(blocked_id.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = BlockEdge::insert(model)
            .on_conflict(
                OnConflict::columns([
                    block_edge::Column::BlockerId,
                    block_edge::Column::BlockedId,
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

    /// Delete the pair's edge. Returns whether a row was removed.
    pub async fn delete_by_pair(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        let result = BlockEdge::delete_many()
            .filter(block_edge::Column::BlockerId.eq(blocker_id))
            .filter(block_edge::Column::BlockedId.eq(blocked_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Get users blocked by a user (paginated, newest first).
    pub async fn find_blocking(
        &self,
        blocker_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<block_edge::Model>> {
        let mut query = BlockEdge::find()
            .filter(block_edge::Column::BlockerId.eq(blocker_id))
            .order_by_desc(block_edge::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(block_edge::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every edge touching a user, in either direction.
    pub async fn find_involving(&self, user_id: &str) -> AppResult<Vec<block_edge::Model>> {
        BlockEdge::find()
            .filter(
                Condition::any()
                    .add(block_edge::Column::BlockerId.eq(user_id))
                    .add(block_edge::Column::BlockedId.eq(user_id)),
            )
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
