use crate::error::ConfigError;
use std::collections::HashMap;

/// All runtime settings, loaded once at startup and validated before any
/// database connection is attempted (spec §7: fail fast on bad config
/// rather than surfacing it as a transient DB error).
#[derive(Debug, Clone)]
pub struct Config {
    pub src_dsn: String,
    pub tgt_dsn: String,
    pub src_db: String,
    pub tgt_db: String,
    pub src_table: String,
    pub target_table: String,

    pub parallel_workers: usize,
    pub batch_size: usize,

    pub db_retry_attempts: usize,
    pub db_retry_max_wait_secs: u64,

    pub fullload_max_retries: usize,
    pub fullload_drop_on_retry: bool,

    pub checkpoint_table: String,
    pub checkpoint_write_seconds: u64,

    pub binlog_server_id: u32,

    /// Interface-only: the core updates a `Metrics` object; nothing here
    /// binds an HTTP listener to this port.
    pub health_port: u16,
}

impl Config {
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            src_dsn: required(vars, "SRC_DSN")?,
            tgt_dsn: required(vars, "TGT_DSN")?,
            src_db: required(vars, "SRC_DB")?,
            tgt_db: required(vars, "TGT_DB")?,
            src_table: required(vars, "SRC_TABLE")?,
            target_table: required(vars, "TARGET_TABLE")?,

            parallel_workers: parsed_or(vars, "PARALLEL_WORKERS", 8)?,
            batch_size: parsed_or(vars, "BATCH_SIZE", 10_000)?,

            db_retry_attempts: parsed_or(vars, "DB_RETRY_ATTEMPTS", 5)?,
            db_retry_max_wait_secs: parsed_or(vars, "DB_RETRY_MAX_WAIT", 30)?,

            fullload_max_retries: parsed_or(vars, "FULLLOAD_MAX_RETRIES", 3)?,
            fullload_drop_on_retry: parsed_or(vars, "FULLLOAD_DROP_ON_RETRY", false)?,

            checkpoint_table: vars
                .get("CHECKPOINT_TABLE")
                .cloned()
                .unwrap_or_else(|| "replication_checkpoint".to_string()),
            checkpoint_write_seconds: parsed_or(vars, "CHECKPOINT_WRITE_SECONDS", 5)?,

            binlog_server_id: parsed_or(vars, "BINLOG_SERVER_ID", 0)?,
            health_port: parsed_or(vars, "HEALTH_PORT", 8080)?,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn parsed_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name.to_string(), raw.clone(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [
            ("SRC_DSN", "mysql://src:3306"),
            ("TGT_DSN", "mysql://tgt:3306"),
            ("SRC_DB", "shop"),
            ("TGT_DB", "shop"),
            ("SRC_TABLE", "orders"),
            ("TARGET_TABLE", "orders"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn fills_defaults_when_optional_vars_absent() {
        let config = Config::from_vars(&base_vars()).unwrap();
        assert_eq!(config.parallel_workers, 8);
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.checkpoint_table, "replication_checkpoint");
        assert!(!config.fullload_drop_on_retry);
    }

    #[test]
    fn missing_required_var_fails_fast() {
        let mut vars = base_vars();
        vars.remove("SRC_DSN");
        match Config::from_vars(&vars) {
            Err(ConfigError::Missing(name)) => assert_eq!(name, "SRC_DSN"),
            other => panic!("expected Missing(SRC_DSN), got {other:?}"),
        }
    }

    #[test]
    fn invalid_numeric_var_fails_fast() {
        let mut vars = base_vars();
        vars.insert("PARALLEL_WORKERS".to_string(), "not-a-number".to_string());
        assert!(matches!(Config::from_vars(&vars), Err(ConfigError::Invalid(_, _, _))));
    }
}
