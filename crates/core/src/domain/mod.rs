mod environment;
mod phase;

pub use environment::{Environment, RuntimeMode};
pub use phase::Phase;
