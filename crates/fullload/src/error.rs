use thiserror::Error;

#[derive(Debug, Error)]
pub enum FullLoadError {
    #[error("database error: {0}")]
    Db(#[from] mysql::DbError),

    #[error("state error: {0}")]
    State(#[from] engine_core::StateError),

    #[error("worker for range [{0}, {1}] failed: {2}")]
    RangeFailed(i64, i64, String),
}
