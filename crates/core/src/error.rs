use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
}
