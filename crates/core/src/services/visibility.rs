//! Visibility policy.
//!
//! [`evaluate`] is the single rule set deciding what a viewer may see of a
//! user and of the content that user owns. [`VisibilityService`] gathers the
//! relationship facts it needs and shapes the results for callers.

use std::collections::HashSet;

use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use vitrine_common::{AppError, AppResult, RelationsConfig};
use vitrine_db::entities::user;

use super::{
    directory::UserDirectoryService, following::FollowingService, graph::GraphStoreService,
};

/// How much of a resource a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Everything.
    Full,
    /// A redacted view. Owner-scoped content is withheld entirely.
    Teaser,
    /// Behave as if the resource does not exist.
    Hidden,
}

/// What is being looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A single user profile.
    Profile,
    /// A user's entry in a public listing (search results, suggestions).
    Listing,
    /// A publication owned by the user.
    Publication,
    /// Reviews written about or by the user.
    Reviews,
}

impl Resource {
    /// Content owned by the subject, as opposed to the subject themselves.
    #[must_use]
    pub const fn is_owner_scoped(self) -> bool {
        matches!(self, Self::Publication | Self::Reviews)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Profile | Self::Listing => "User",
            Self::Publication => "Publication",
            Self::Reviews => "Review",
        }
    }
}

/// The user whose profile or content is being viewed.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub id: &'a str,
    pub is_private: bool,
    pub is_deleted: bool,
}

impl<'a> From<&'a user::Model> for Subject<'a> {
    fn from(user: &'a user::Model) -> Self {
        Self {
            id: &user.id,
            is_private: user.is_private,
            is_deleted: user.is_deleted(),
        }
    }
}

/// Relationship facts between viewer and subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relationship {
    /// A block exists in either direction.
    pub blocked: bool,
    /// The viewer has an accepted follow edge to the subject.
    pub following: bool,
}

/// Decide the access level. Rules apply in order; the first match wins.
///
/// 1. Deleted subjects are hidden.
/// 2. Anonymous viewers: when authentication is required, owner-scoped
///    content is hidden and profiles/listings are teasers; otherwise they are
///    treated as a stranger without relationships.
/// 3. Viewers always see themselves in full.
/// 4. A block in either direction hides everything.
/// 5. Public subjects are shown in full.
/// 6. Private subjects are shown in full to accepted followers only.
#[must_use]
pub fn evaluate(
    viewer_id: Option<&str>,
    subject: Subject<'_>,
    resource: Resource,
    relationship: Relationship,
    require_authentication: bool,
) -> AccessLevel {
    if subject.is_deleted {
        return AccessLevel::Hidden;
    }

    let Some(viewer_id) = viewer_id else {
        if require_authentication {
            return if resource.is_owner_scoped() {
                AccessLevel::Hidden
            } else {
                AccessLevel::Teaser
            };
        }
        return if subject.is_private {
            AccessLevel::Teaser
        } else {
            AccessLevel::Full
        };
    };

    if viewer_id == subject.id {
        return AccessLevel::Full;
    }

    if relationship.blocked {
        return AccessLevel::Hidden;
    }

    if !subject.is_private || relationship.following {
        AccessLevel::Full
    } else {
        AccessLevel::Teaser
    }
}

/// Access decision for a profile, with the flags the UI needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAccess {
    pub level: AccessLevel,
    pub is_following: bool,
    /// The viewer has a request awaiting the subject's decision.
    pub is_pending: bool,
    pub is_blocked: bool,
}

/// Profile fields visible at teaser level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: String,
    pub username: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub is_private: bool,
    pub followers_count: u64,
    pub following_count: u64,
    /// Only shown to the profile owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_requests_count: Option<u64>,
    pub is_following: bool,
    pub is_pending: bool,
}

/// Profile fields redacted from teasers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub last_seen_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullProfile {
    #[serde(flatten)]
    pub summary: ProfileSummary,
    #[serde(flatten)]
    pub details: ProfileDetails,
}

/// Placeholder rendered when a block exists between viewer and subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedProfile {
    pub id: String,
    pub name: String,
    pub is_blocked: bool,
}

/// Placeholder rendered for a soft-deleted account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedProfile {
    pub id: String,
    pub is_deleted: bool,
}

/// A profile redacted for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum ProfileView {
    Full(FullProfile),
    Teaser(ProfileSummary),
    Blocked(BlockedProfile),
    Deleted(DeletedProfile),
}

/// Precomputed predicate for filtering listings of content by author.
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    viewer_id: Option<String>,
    excluded: HashSet<String>,
    followed: HashSet<String>,
    require_authentication: bool,
}

impl VisibilityFilter {
    /// Whether content by this author may be listed for the viewer.
    #[must_use]
    pub fn allows(&self, author_id: &str, author_is_private: bool) -> bool {
        let subject = Subject {
            id: author_id,
            is_private: author_is_private,
            is_deleted: false,
        };
        let relationship = Relationship {
            blocked: self.excluded.contains(author_id),
            following: self.followed.contains(author_id),
        };

        evaluate(
            self.viewer_id.as_deref(),
            subject,
            Resource::Publication,
            relationship,
            self.require_authentication,
        ) == AccessLevel::Full
    }

    /// Authors whose content must never be listed for the viewer.
    ///
    /// For pushing the block part of the predicate into a query.
    #[must_use]
    pub const fn excluded_user_ids(&self) -> &HashSet<String> {
        &self.excluded
    }

    /// Authors the viewer follows with an accepted edge.
    #[must_use]
    pub const fn followed_user_ids(&self) -> &HashSet<String> {
        &self.followed
    }
}

/// Visibility service.
#[derive(Clone)]
pub struct VisibilityService {
    graph: GraphStoreService,
    users: UserDirectoryService,
    following: FollowingService,
    config: RelationsConfig,
}

impl VisibilityService {
    /// Create a new visibility service.
    #[must_use]
    pub const fn new(
        graph: GraphStoreService,
        users: UserDirectoryService,
        following: FollowingService,
        config: RelationsConfig,
    ) -> Self {
        Self {
            graph,
            users,
            following,
            config,
        }
    }

    async fn relationship(
        &self,
        viewer_id: Option<&str>,
        subject_id: &str,
    ) -> AppResult<Relationship> {
        match viewer_id {
            Some(viewer_id) if viewer_id != subject_id => Ok(Relationship {
                blocked: self
                    .graph
                    .block_exists_between(viewer_id, subject_id)
                    .await?,
                following: self.graph.is_following(viewer_id, subject_id).await?,
            }),
            _ => Ok(Relationship::default()),
        }
    }

    /// Access level of `viewer_id` to `subject_id`'s resource.
    ///
    /// An unknown subject is `Hidden`, the same as an inaccessible one.
    pub async fn can_view(
        &self,
        viewer_id: Option<&str>,
        subject_id: &str,
        resource: Resource,
    ) -> AppResult<AccessLevel> {
        let Some(subject) = self.users.find_user(subject_id).await? else {
            return Ok(AccessLevel::Hidden);
        };

        let relationship = self.relationship(viewer_id, subject_id).await?;

        Ok(evaluate(
            viewer_id,
            Subject::from(&subject),
            resource,
            relationship,
            self.config.require_authentication,
        ))
    }

    /// Fail with `NotFound` unless the viewer has full access.
    ///
    /// The error is indistinguishable from the one a missing resource gives.
    pub async fn assert_can_view(
        &self,
        viewer_id: Option<&str>,
        owner_id: &str,
        resource: Resource,
    ) -> AppResult<()> {
        match self.can_view(viewer_id, owner_id, resource).await? {
            AccessLevel::Full => Ok(()),
            AccessLevel::Teaser | AccessLevel::Hidden => {
                Err(AppError::NotFound(resource.label().to_string()))
            }
        }
    }

    /// Profile access decision with relationship flags.
    pub async fn profile_access(
        &self,
        viewer_id: Option<&str>,
        subject_id: &str,
    ) -> AppResult<ProfileAccess> {
        let subject = self
            .users
            .find_user(subject_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(subject_id.to_string()))?;

        self.access_to(viewer_id, &subject).await
    }

    async fn access_to(
        &self,
        viewer_id: Option<&str>,
        subject: &user::Model,
    ) -> AppResult<ProfileAccess> {
        let relationship = self.relationship(viewer_id, &subject.id).await?;
        let is_pending = match viewer_id {
            Some(viewer_id) if viewer_id != subject.id && !relationship.following => {
                self.graph
                    .has_pending_request(viewer_id, &subject.id)
                    .await?
            }
            _ => false,
        };

        Ok(ProfileAccess {
            level: evaluate(
                viewer_id,
                Subject::from(subject),
                Resource::Profile,
                relationship,
                self.config.require_authentication,
            ),
            is_following: relationship.following,
            is_pending,
            is_blocked: relationship.blocked,
        })
    }

    /// The subject's profile, redacted for the viewer.
    pub async fn profile_view(
        &self,
        viewer_id: Option<&str>,
        subject_id: &str,
    ) -> AppResult<ProfileView> {
        let subject = self
            .users
            .find_user(subject_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(subject_id.to_string()))?;

        if subject.is_deleted() {
            return Ok(ProfileView::Deleted(DeletedProfile {
                id: subject.id,
                is_deleted: true,
            }));
        }

        let access = self.access_to(viewer_id, &subject).await?;

        if access.is_blocked && viewer_id != Some(subject.id.as_str()) {
            return Ok(ProfileView::Blocked(BlockedProfile {
                id: subject.id,
                name: subject.name,
                is_blocked: true,
            }));
        }

        if access.level == AccessLevel::Hidden {
            return Err(AppError::UserNotFound(subject_id.to_string()));
        }

        let counts = self.following.counts(&subject.id).await?;
        let is_owner = viewer_id == Some(subject.id.as_str());

        let summary = ProfileSummary {
            id: subject.id.clone(),
            username: subject.username.clone(),
            name: subject.name.clone(),
            description: subject.description.clone(),
            avatar_url: subject.avatar_url.clone(),
            is_private: subject.is_private,
            followers_count: counts.followers,
            following_count: counts.following,
            pending_requests_count: is_owner.then_some(counts.pending_requests),
            is_following: access.is_following,
            is_pending: access.is_pending,
        };

        Ok(match access.level {
            AccessLevel::Full => ProfileView::Full(FullProfile {
                summary,
                details: ProfileDetails {
                    email: subject.email,
                    phone: subject.phone,
                    location: subject.location,
                    last_seen_at: subject.last_seen_at,
                    created_at: subject.created_at,
                },
            }),
            AccessLevel::Teaser | AccessLevel::Hidden => ProfileView::Teaser(summary),
        })
    }

    /// Listing predicate for the viewer.
    pub async fn visibility_filter(&self, viewer_id: Option<&str>) -> AppResult<VisibilityFilter> {
        let (excluded, followed) = match viewer_id {
            Some(viewer_id) => (
                self.graph.block_related_ids(viewer_id).await?,
                self.graph.followed_ids(viewer_id).await?,
            ),
            None => (HashSet::new(), HashSet::new()),
        };

        Ok(VisibilityFilter {
            viewer_id: viewer_id.map(ToString::to_string),
            excluded,
            followed,
            require_authentication: self.config.require_authentication,
        })
    }
}
