use thiserror::Error;

/// Top-level errors for the orchestrator's startup decision tree, CDC loop
/// and row applier (spec §4.6, §4.7, §7).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("database error: {0}")]
    Db(#[from] mysql::DbError),

    #[error("state error: {0}")]
    State(#[from] engine_core::StateError),

    #[error("full-load error: {0}")]
    FullLoad(#[from] fullload::FullLoadError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("source table `{0}` has no usable primary key metadata")]
    NoUsableKey(String),

    #[error("full-load failed after {0} attempts: {1}")]
    FullLoadExhausted(usize, String),

    #[error("{0}")]
    Fatal(String),
}
