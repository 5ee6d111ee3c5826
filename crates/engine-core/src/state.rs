use crate::error::StateError;
use crate::retry::{RetryDisposition, RetryError, RetryPolicy};
use async_trait::async_trait;
use model::{MigrationKey, PkRange};
use mysql::MySqlAdapter;

/// A migration's replication position: the source binlog file and the byte
/// offset into it (spec §3 Checkpoint entity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub key: MigrationKey,
    pub file: String,
    pub pos: u32,
}

/// Target-resident checkpoint/range-progress storage (spec §4.1).
///
/// Backed by SQL tables on the target database rather than an embedded
/// key-value store, since the checkpoint and progress tables must be
/// target-resident per the persisted-state layout; written the same
/// `#[async_trait]` way a pooled-connection state store is elsewhere.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn ensure_table(&self, table_name: &str) -> Result<(), StateError>;
    async fn read(&self, key: &MigrationKey) -> Result<Option<Checkpoint>, StateError>;
    async fn write(&self, checkpoint: &Checkpoint) -> Result<(), StateError>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn ensure_table(&self) -> Result<(), StateError>;
    async fn mark_done(&self, key: &MigrationKey, range: &PkRange) -> Result<(), StateError>;
    async fn done_ranges(&self, key: &MigrationKey) -> Result<Vec<PkRange>, StateError>;
}

pub struct SqlCheckpointStore {
    adapter: MySqlAdapter,
    table_name: String,
    retry: RetryPolicy,
}

impl SqlCheckpointStore {
    pub fn new(adapter: MySqlAdapter, table_name: impl Into<String>) -> Self {
        Self::with_retry(adapter, table_name, RetryPolicy::for_database())
    }

    /// Checkpoint writes retry with the configured `DB_RETRY_ATTEMPTS` /
    /// `DB_RETRY_MAX_WAIT` backoff (spec §4.1 failure semantics); a failed
    /// final attempt surfaces as a fatal `StateError`.
    pub fn with_retry(adapter: MySqlAdapter, table_name: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            adapter,
            table_name: table_name.into(),
            retry,
        }
    }
}

#[async_trait]
impl CheckpointStore for SqlCheckpointStore {
    async fn ensure_table(&self, table_name: &str) -> Result<(), StateError> {
        self.adapter
            .exec(&format!(
                "CREATE TABLE IF NOT EXISTS `{table_name}` (\
                     `key` VARCHAR(767) PRIMARY KEY, \
                     `file` TEXT NOT NULL, \
                     `pos` INT UNSIGNED NOT NULL)"
            ))
            .await?;
        Ok(())
    }

    async fn read(&self, key: &MigrationKey) -> Result<Option<Checkpoint>, StateError> {
        let rows = self
            .adapter
            .query_rows_params(
                &format!("SELECT `file`, `pos` FROM `{}` WHERE `key` = ?", self.table_name),
                &[model::Value::String(key.to_string())],
                &self.table_name,
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let file = match row.get("file") {
            Some(model::Value::String(s)) => s.clone(),
            other => {
                return Err(StateError::MalformedCheckpoint(
                    key.to_string(),
                    format!("unexpected `file` value: {other:?}"),
                ));
            }
        };
        let pos = match row.get("pos") {
            Some(model::Value::Int(i)) => *i as u32,
            Some(model::Value::UInt(u)) => *u as u32,
            other => {
                return Err(StateError::MalformedCheckpoint(
                    key.to_string(),
                    format!("unexpected `pos` value: {other:?}"),
                ));
            }
        };

        Ok(Some(Checkpoint {
            key: key.clone(),
            file,
            pos,
        }))
    }

    async fn write(&self, checkpoint: &Checkpoint) -> Result<(), StateError> {
        let sql = format!(
            "INSERT INTO `{}` (`key`, `file`, `pos`) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE `file` = VALUES(`file`), `pos` = VALUES(`pos`)",
            self.table_name
        );
        let params = [
            model::Value::String(checkpoint.key.to_string()),
            model::Value::String(checkpoint.file.clone()),
            model::Value::UInt(checkpoint.pos as u64),
        ];

        self.retry
            .run(
                || self.adapter.exec_params(&sql, &params),
                |e: &mysql::DbError| match e.classify() {
                    mysql::ErrorKind::Transient => RetryDisposition::Retry,
                    mysql::ErrorKind::Fatal => RetryDisposition::Stop,
                },
            )
            .await
            .map_err(unwrap_retry)?;

        Ok(())
    }
}

fn unwrap_retry(err: RetryError<mysql::DbError>) -> StateError {
    match err {
        RetryError::Fatal(e) => StateError::Db(e),
        RetryError::AttemptsExceeded(e) => StateError::Db(e),
    }
}

pub struct SqlProgressStore {
    adapter: MySqlAdapter,
    table_name: String,
}

impl SqlProgressStore {
    pub fn new(adapter: MySqlAdapter, table_name: impl Into<String>) -> Self {
        Self {
            adapter,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl ProgressStore for SqlProgressStore {
    async fn ensure_table(&self) -> Result<(), StateError> {
        self.adapter
            .exec(&format!(
                "CREATE TABLE IF NOT EXISTS `{}` (\
                     `key` VARCHAR(767) NOT NULL, \
                     `range_start` BIGINT NOT NULL, \
                     `range_end` BIGINT NOT NULL, \
                     PRIMARY KEY (`key`, `range_start`))",
                self.table_name
            ))
            .await?;
        Ok(())
    }

    async fn mark_done(&self, key: &MigrationKey, range: &PkRange) -> Result<(), StateError> {
        self.adapter
            .exec_params(
                &format!(
                    "INSERT IGNORE INTO `{}` (`key`, `range_start`, `range_end`) VALUES (?, ?, ?)",
                    self.table_name
                ),
                &[
                    model::Value::String(key.to_string()),
                    model::Value::Int(range.start),
                    model::Value::Int(range.end),
                ],
            )
            .await?;
        Ok(())
    }

    async fn done_ranges(&self, key: &MigrationKey) -> Result<Vec<PkRange>, StateError> {
        let rows = self
            .adapter
            .query_rows_params(
                &format!(
                    "SELECT `range_start`, `range_end` FROM `{}` WHERE `key` = ?",
                    self.table_name
                ),
                &[model::Value::String(key.to_string())],
                &self.table_name,
            )
            .await?;

        let mut ranges = Vec::with_capacity(rows.len());
        for row in rows {
            let start = match row.get("range_start") {
                Some(model::Value::Int(i)) => *i,
                _ => continue,
            };
            let end = match row.get("range_end") {
                Some(model::Value::Int(i)) => *i,
                _ => continue,
            };
            ranges.push(PkRange::new(start, end));
        }
        Ok(ranges)
    }
}
