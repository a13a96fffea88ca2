//! Relationship and visibility engine for vitrine.
//!
//! Follow requests, blocks, the visibility policy and notification fan-out,
//! exposed to the rest of the platform through [`RelationsEngine`].

pub mod engine;
pub mod services;

pub use engine::RelationsEngine;
pub use services::*;
