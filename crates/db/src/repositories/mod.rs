//! Repository layer over the engine's tables.

mod block_edge;
mod follow_edge;
mod notification;
mod user;

pub use block_edge::BlockEdgeRepository;
pub use follow_edge::FollowEdgeRepository;
pub use notification::NotificationRepository;
pub use user::UserRepository;
