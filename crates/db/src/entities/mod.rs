//! Database entities.
//!
//! The engine owns `follow_edge`, `block_edge` and `notification`. The `user`
//! entity is owned by the account subsystem and is only read here, apart from
//! the privacy flag.

pub mod block_edge;
pub mod follow_edge;
pub mod notification;
pub mod user;

pub use block_edge::Entity as BlockEdge;
pub use follow_edge::Entity as FollowEdge;
pub use notification::Entity as Notification;
pub use user::Entity as User;
