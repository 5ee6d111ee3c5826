use thiserror::Error;

/// Errors surfaced by the checkpoint/progress state stores.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("database error: {0}")]
    Db(#[from] mysql::DbError),

    #[error("checkpoint row for key `{0}` is malformed: {1}")]
    MalformedCheckpoint(String, String),
}

/// Errors surfaced by the preflight gate and orchestrator.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("database error: {0}")]
    Db(#[from] mysql::DbError),

    #[error("source table `{0}` has no usable primary key and cursor fallback is unavailable")]
    NoUsableKey(String),

    #[error("preflight check failed: {0}")]
    Preflight(String),

    #[error("{0}")]
    Other(String),
}
