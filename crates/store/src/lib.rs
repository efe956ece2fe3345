//! Data-store connection layer.
//!
//! Beacon's primary store is SQLite. This crate owns pool construction
//! and connectivity checks only; schema management and data access live
//! with the subsystems that consume the pool.

mod error;
mod pool;

pub use error::StoreError;
pub use pool::{connect, ping};
pub use sqlx::SqlitePool;
