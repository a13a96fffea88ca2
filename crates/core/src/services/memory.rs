//! In-process store implementations.
//!
//! Each store keeps its state behind one async mutex, so every trait
//! operation is a single critical section and trivially atomic. Useful for
//! tests and for embedding the engine without a database.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use vitrine_common::{AppResult, IdGenerator};
use vitrine_db::entities::{
    block_edge,
    follow_edge::{self, FollowStatus},
    notification::{self, NotificationType},
    user,
};

use super::{
    directory::UserDirectory,
    graph::{GraphStore, ensure_distinct},
    notification::NotificationStore,
};

type Pair = (String, String);

fn pair(a: &str, b: &str) -> Pair {
    (a.to_string(), b.to_string())
}

/// Newest-first page over rows with ULID ids.
fn page<T, F>(mut rows: Vec<T>, id: F, limit: u64, until_id: Option<&str>) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    rows.retain(|r| until_id.is_none_or(|until| id(r) < until));
    rows.sort_by(|a, b| id(b).cmp(id(a)));
    rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    rows
}

#[derive(Default)]
struct GraphState {
    follows: HashMap<Pair, follow_edge::Model>,
    blocks: HashMap<Pair, block_edge::Model>,
}

/// In-memory graph store.
#[derive(Default)]
pub struct MemoryGraphStore {
    state: Mutex<GraphState>,
    id_gen: IdGenerator,
}

impl MemoryGraphStore {
    /// Create an empty graph store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of follow edges, any status.
    pub async fn follow_count(&self) -> usize {
        self.state.lock().await.follows.len()
    }

    fn new_edge(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> follow_edge::Model {
        let now = Utc::now().fixed_offset();
        follow_edge::Model {
            id: self.id_gen.generate(),
            follower_id: follower_id.to_string(),
            followed_id: followed_id.to_string(),
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn find_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
    ) -> AppResult<Option<follow_edge::Model>> {
        let state = self.state.lock().await;
        Ok(state.follows.get(&pair(follower_id, followed_id)).cloned())
    }

    async fn insert_follow_if_absent(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool> {
        ensure_distinct(follower_id, followed_id, "follow")?;
        let mut state = self.state.lock().await;
        let key = pair(follower_id, followed_id);
        if state.follows.contains_key(&key) {
            return Ok(false);
        }
        state
            .follows
            .insert(key, self.new_edge(follower_id, followed_id, status));
        Ok(true)
    }

    async fn upsert_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<follow_edge::Model> {
        ensure_distinct(follower_id, followed_id, "follow")?;
        let mut state = self.state.lock().await;
        let edge = state
            .follows
            .entry(pair(follower_id, followed_id))
            .and_modify(|e| {
                e.status = status;
                e.updated_at = Utc::now().fixed_offset();
            })
            .or_insert_with(|| self.new_edge(follower_id, followed_id, status));
        Ok(edge.clone())
    }

    async fn delete_follow_with_status(
        &self,
        follower_id: &str,
        followed_id: &str,
        status: FollowStatus,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let key = pair(follower_id, followed_id);
        if state.follows.get(&key).is_some_and(|e| e.status == status) {
            state.follows.remove(&key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_follow(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state
            .follows
            .remove(&pair(follower_id, followed_id))
            .is_some())
    }

    async fn accept_pending(&self, follower_id: &str, followed_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.follows.get_mut(&pair(follower_id, followed_id)) {
            Some(edge) if edge.is_pending() => {
                edge.status = FollowStatus::Accepted;
                edge.updated_at = Utc::now().fixed_offset();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn accept_all_pending(&self, followed_id: &str) -> AppResult<Vec<String>> {
        let mut state = self.state.lock().await;
        let now = Utc::now().fixed_offset();
        let mut accepted = Vec::new();
        for edge in state.follows.values_mut() {
            if edge.followed_id == followed_id && edge.is_pending() {
                edge.status = FollowStatus::Accepted;
                edge.updated_at = now;
                accepted.push(edge.follower_id.clone());
            }
        }
        Ok(accepted)
    }

    async fn incoming(
        &self,
        user_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let state = self.state.lock().await;
        let rows = state
            .follows
            .values()
            .filter(|e| e.followed_id == user_id && e.status == status)
            .cloned()
            .collect();
        Ok(page(rows, |e| e.id.as_str(), limit, until_id))
    }

    async fn outgoing(
        &self,
        user_id: &str,
        status: FollowStatus,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_edge::Model>> {
        let state = self.state.lock().await;
        let rows = state
            .follows
            .values()
            .filter(|e| e.follower_id == user_id && e.status == status)
            .cloned()
            .collect();
        Ok(page(rows, |e| e.id.as_str(), limit, until_id))
    }

    async fn followed_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .values()
            .filter(|e| e.follower_id == user_id && e.is_accepted())
            .map(|e| e.followed_id.clone())
            .collect())
    }

    async fn count_incoming(&self, user_id: &str, status: FollowStatus) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .values()
            .filter(|e| e.followed_id == user_id && e.status == status)
            .count() as u64)
    }

    async fn count_outgoing(&self, user_id: &str, status: FollowStatus) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .values()
            .filter(|e| e.follower_id == user_id && e.status == status)
            .count() as u64)
    }

    async fn has_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.blocks.contains_key(&pair(blocker_id, blocked_id)))
    }

    async fn block_exists_between(&self, a: &str, b: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.blocks.contains_key(&pair(a, b)) || state.blocks.contains_key(&pair(b, a)))
    }

    async fn set_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        ensure_distinct(blocker_id, blocked_id, "block")?;
        let mut state = self.state.lock().await;
        let key = pair(blocker_id, blocked_id);
        if state.blocks.contains_key(&key) {
            return Ok(false);
        }
        let edge = block_edge::Model {
            id: self.id_gen.generate(),
            blocker_id: blocker_id.to_string(),
            blocked_id: blocked_id.to_string(),
            created_at: Utc::now().fixed_offset(),
        };
        state.blocks.insert(key, edge);
        Ok(true)
    }

    async fn clear_block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state
            .blocks
            .remove(&pair(blocker_id, blocked_id))
            .is_some())
    }

    async fn blocked_by(
        &self,
        blocker_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<block_edge::Model>> {
        let state = self.state.lock().await;
        let rows = state
            .blocks
            .values()
            .filter(|b| b.blocker_id == blocker_id)
            .cloned()
            .collect();
        Ok(page(rows, |b| b.id.as_str(), limit, until_id))
    }

    async fn block_related_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let state = self.state.lock().await;
        Ok(state
            .blocks
            .keys()
            .filter_map(|(blocker, blocked)| {
                if blocker == user_id {
                    Some(blocked.clone())
                } else if blocked == user_id {
                    Some(blocker.clone())
                } else {
                    None
                }
            })
            .collect())
    }
}

/// In-memory user directory.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, user::Model>>,
}

impl MemoryUserDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user record.
    pub async fn insert(&self, user: user::Model) {
        self.users.lock().await.insert(user.id.clone(), user);
    }

    /// Add a minimal user named after its ID.
    pub async fn add_user(&self, id: &str, is_private: bool) -> user::Model {
        let user = user::Model {
            id: id.to_string(),
            username: id.to_string(),
            name: id.to_string(),
            email: None,
            phone: None,
            description: None,
            location: None,
            avatar_url: None,
            is_private,
            last_seen_at: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: None,
            deleted_at: None,
        };
        self.insert(user.clone()).await;
        user
    }

    /// Mark a user soft-deleted.
    pub async fn soft_delete(&self, id: &str) {
        if let Some(user) = self.users.lock().await.get_mut(id) {
            user.deleted_at = Some(Utc::now().fixed_offset());
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_user(&self, id: &str) -> AppResult<Option<user::Model>> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn set_private(&self, id: &str, is_private: bool) -> AppResult<bool> {
        let mut users = self.users.lock().await;
        match users.get_mut(id) {
            Some(user) if !user.is_deleted() => {
                user.is_private = is_private;
                user.updated_at = Some(Utc::now().fixed_offset());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory notification store.
#[derive(Default)]
pub struct MemoryNotificationStore {
    rows: Mutex<HashMap<String, notification::Model>>,
    id_gen: IdGenerator,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notifications.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Whether no notification is stored.
    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Every stored notification addressed to `recipient_id`.
    pub async fn addressed_to(&self, recipient_id: &str) -> Vec<notification::Model> {
        self.rows
            .lock()
            .await
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert_or_get(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        subject_id: Option<&str>,
    ) -> AppResult<(notification::Model, bool)> {
        let key = notification::dedup_key(recipient_id, sender_id, notification_type, subject_id);
        let mut rows = self.rows.lock().await;

        if let Some(existing) = rows.get(&key) {
            return Ok((existing.clone(), false));
        }

        let row = notification::Model {
            id: self.id_gen.generate(),
            recipient_id: recipient_id.to_string(),
            sender_id: sender_id.to_string(),
            notification_type,
            subject_id: subject_id.map(ToString::to_string),
            dedup_key: key.clone(),
            read_at: None,
            created_at: Utc::now().fixed_offset(),
        };
        rows.insert(key, row.clone());
        Ok((row, true))
    }

    async fn list(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        let rows = self
            .rows
            .lock()
            .await
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .filter(|n| notification_type.is_none_or(|t| n.notification_type == t))
            .filter(|n| !unread_only || !n.is_read())
            .cloned()
            .collect();
        Ok(page(rows, |n| n.id.as_str(), limit, until_id))
    }

    async fn mark_as_read(&self, id: &str, recipient_id: &str) -> AppResult<bool> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows
            .values_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
        else {
            return Ok(false);
        };
        if row.read_at.is_none() {
            row.read_at = Some(Utc::now().fixed_offset());
        }
        Ok(true)
    }

    async fn mark_all_as_read(
        &self,
        recipient_id: &str,
        notification_type: Option<NotificationType>,
    ) -> AppResult<u64> {
        let now = Utc::now().fixed_offset();
        let mut updated = 0;
        for row in self.rows.lock().await.values_mut() {
            if row.recipient_id == recipient_id
                && row.read_at.is_none()
                && notification_type.is_none_or(|t| row.notification_type == t)
            {
                row.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_unread_by_type(
        &self,
        recipient_id: &str,
    ) -> AppResult<Vec<(NotificationType, u64)>> {
        let mut counts: HashMap<NotificationType, u64> = HashMap::new();
        for row in self.rows.lock().await.values() {
            if row.recipient_id == recipient_id && !row.is_read() {
                *counts.entry(row.notification_type).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_edge() {
        let store = MemoryGraphStore::new();

        assert!(
            store
                .insert_follow_if_absent("alice", "bob", FollowStatus::Pending)
                .await
                .unwrap()
        );
        assert!(
            !store
                .insert_follow_if_absent("alice", "bob", FollowStatus::Accepted)
                .await
                .unwrap()
        );

        let edge = store.find_follow("alice", "bob").await.unwrap().unwrap();
        assert!(edge.is_pending());
        assert_eq!(store.follow_count().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_status_in_place() {
        let store = MemoryGraphStore::new();

        let first = store
            .upsert_follow("alice", "bob", FollowStatus::Pending)
            .await
            .unwrap();
        let second = store
            .upsert_follow("alice", "bob", FollowStatus::Accepted)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.is_accepted());
        assert!(store.is_following("alice", "bob").await.unwrap());
        assert!(!store.is_following("bob", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_with_status_is_compare_and_delete() {
        let store = MemoryGraphStore::new();
        store
            .upsert_follow("alice", "bob", FollowStatus::Accepted)
            .await
            .unwrap();

        assert!(
            !store
                .delete_follow_with_status("alice", "bob", FollowStatus::Pending)
                .await
                .unwrap()
        );
        assert!(
            store
                .delete_follow_with_status("alice", "bob", FollowStatus::Accepted)
                .await
                .unwrap()
        );
        assert!(!store.delete_follow("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_blocks_are_directional() {
        let store = MemoryGraphStore::new();
        assert!(store.set_block("alice", "bob").await.unwrap());
        assert!(!store.set_block("alice", "bob").await.unwrap());

        assert!(store.has_blocked("alice", "bob").await.unwrap());
        assert!(!store.has_blocked("bob", "alice").await.unwrap());
        assert!(store.is_blocked_by("bob", "alice").await.unwrap());
        assert!(store.block_exists_between("bob", "alice").await.unwrap());

        assert!(store.clear_block("alice", "bob").await.unwrap());
        assert!(!store.clear_block("alice", "bob").await.unwrap());
        assert!(!store.block_exists_between("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_soft_deleted_user_cannot_change_privacy() {
        let users = MemoryUserDirectory::new();
        users.add_user("alice", false).await;
        users.soft_delete("alice").await;

        assert!(!users.set_private("alice", true).await.unwrap());
        assert!(users.get_active("alice").await.is_err());
        assert!(users.find_user("alice").await.unwrap().is_some());
    }
}
