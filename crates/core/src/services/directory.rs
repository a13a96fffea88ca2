//! Read access to user accounts.
//!
//! Accounts are owned elsewhere; the engine reads existence and the privacy
//! flag, and only writes the flag through [`UserDirectory::set_private`].

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use vitrine_common::{AppError, AppResult};
use vitrine_db::{entities::user, repositories::UserRepository};

/// Lookup of user accounts by ID.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user, soft-deleted or not.
    async fn find_user(&self, id: &str) -> AppResult<Option<user::Model>>;

    /// Store the privacy flag. Returns whether a live user was updated.
    async fn set_private(&self, id: &str, is_private: bool) -> AppResult<bool>;

    /// The live user, or `UserNotFound` when missing or soft-deleted.
    async fn get_active(&self, id: &str) -> AppResult<user::Model> {
        self.find_user(id)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }
}

/// Shared handle to a user directory.
pub type UserDirectoryService = Arc<dyn UserDirectory>;

/// Database-backed user directory.
#[derive(Clone)]
pub struct DbUserDirectory {
    user_repo: UserRepository,
}

impl DbUserDirectory {
    /// Create a new database-backed user directory.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Create a user directory over a connection.
    #[must_use]
    pub const fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self::new(UserRepository::new(db))
    }
}

#[async_trait]
impl UserDirectory for DbUserDirectory {
    async fn find_user(&self, id: &str) -> AppResult<Option<user::Model>> {
        self.user_repo.find_by_id(id).await
    }

    async fn set_private(&self, id: &str, is_private: bool) -> AppResult<bool> {
        self.user_repo.set_private(id, is_private).await
    }

    async fn get_active(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_active_by_id(id).await
    }
}
