pub mod health;
pub mod sse;

pub use health::*;
