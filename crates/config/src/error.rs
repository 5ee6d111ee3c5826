use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(String),

    #[error("environment variable `{0}` has invalid value `{1}`: {2}")]
    Invalid(String, String, String),
}
