//! Event system for the Beacon platform.
//!
//! This crate provides the in-process event bus and the event vocabulary
//! used for real-time delivery: startup progress while the process boots,
//! and platform notifications afterwards.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
