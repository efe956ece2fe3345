use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
