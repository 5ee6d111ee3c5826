use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read env file: {0}")]
    EnvFileRead(#[from] std::io::Error),

    #[error("env file error: {0}")]
    EnvFile(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("database error: {0}")]
    Db(#[from] mysql::DbError),

    #[error("state error: {0}")]
    State(#[from] engine_core::StateError),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] orchestrator::OrchestratorError),

    #[error("failed to serialize status as JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("preflight check failed: {0:?}")]
    PreflightFailed(Vec<String>),

    #[error("shutdown requested")]
    ShutdownRequested,
}
