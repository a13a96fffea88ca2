//! Business logic services.

#![allow(missing_docs)]

pub mod blocking;
pub mod directory;
pub mod following;
pub mod graph;
pub mod memory;
pub mod notification;
pub mod pagination;
pub mod visibility;

pub use blocking::BlockingService;
pub use directory::{DbUserDirectory, UserDirectory, UserDirectoryService};
pub use following::{FollowOutcome, FollowingService, RelationCounts};
pub use graph::{DbGraphStore, GraphStore, GraphStoreService};
pub use memory::{MemoryGraphStore, MemoryNotificationStore, MemoryUserDirectory};
pub use notification::{
    DbNotificationStore, NotificationService, NotificationStore, NotificationStoreService,
    UnreadCounts,
};
pub use pagination::PageInput;
pub use visibility::{
    AccessLevel, BlockedProfile, DeletedProfile, FullProfile, ProfileAccess, ProfileDetails,
    ProfileSummary, ProfileView, Relationship, Resource, Subject, VisibilityFilter,
    VisibilityService, evaluate,
};
