//! Core domain types shared across the Beacon workspace.

pub mod domain;
mod error;

pub use domain::{Environment, Phase, RuntimeMode};
pub use error::CoreError;
