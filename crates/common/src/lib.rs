//! Common utilities and shared types for vitrine.
//!
//! This crate provides foundational components used across all vitrine crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Logging**: `tracing` subscriber bootstrap via [`logging::init`]
//!
//! # Example
//!
//! ```no_run
//! use vitrine_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     vitrine_common::logging::init(&config.logging)?;
//!     let id = IdGenerator::new().generate();
//!     tracing::info!(%id, "Generated ID");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod logging;

pub use config::{Config, DatabaseConfig, LogFormat, LoggingConfig, RelationsConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
