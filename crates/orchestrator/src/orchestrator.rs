use crate::applier::RowApplier;
use crate::cdc::CdcLoop;
use crate::error::OrchestratorError;
use config::Config;
use engine_core::{Checkpoint, CheckpointStore, Metrics, ProgressStore, RetryPolicy, SqlCheckpointStore, SqlProgressStore};
use fullload::{CursorStreamingLoader, RangePool};
use model::MigrationKey;
use mysql::{BinlogConsumer, MySqlAdapter};
use planner::PkDetection;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const PROGRESS_TABLE: &str = "full_load_progress";

/// Drives the startup decision tree (spec §4.7): resume CDC from an
/// existing checkpoint when the target already has data, otherwise run a
/// full load (with a bounded, backed-off outer retry budget) before
/// capturing the source's binlog position and handing off to CDC.
pub struct Orchestrator {
    config: Config,
    source: MySqlAdapter,
    target: MySqlAdapter,
    key: MigrationKey,
    checkpoints: Arc<dyn CheckpointStore>,
    progress: Arc<dyn ProgressStore>,
    metrics: Metrics,
}

impl Orchestrator {
    pub fn new(config: Config, source: MySqlAdapter, target: MySqlAdapter) -> Self {
        let key = MigrationKey::new(&config.src_dsn, &config.src_db, &config.src_table);
        let db_retry = RetryPolicy::for_database_with(config.db_retry_attempts, config.db_retry_max_wait_secs);
        let checkpoints = Arc::new(SqlCheckpointStore::with_retry(target.clone(), config.checkpoint_table.clone(), db_retry));
        let progress = Arc::new(SqlProgressStore::new(target.clone(), PROGRESS_TABLE));

        Self {
            config,
            source,
            target,
            key,
            checkpoints,
            progress,
            metrics: Metrics::new(),
        }
    }

    /// The shared counters object the out-of-scope HTTP metrics endpoint
    /// would read (spec §1, §5): this is the write side only.
    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<(), OrchestratorError> {
        self.checkpoints.ensure_table(&self.config.checkpoint_table).await?;
        self.progress.ensure_table().await?;

        let existing_checkpoint = self.checkpoints.read(&self.key).await?;
        let target_has_rows = self.target_non_empty().await?;

        let (file, pos) = match existing_checkpoint {
            Some(cp) if target_has_rows => {
                info!(file = %cp.file, pos = cp.pos, "resuming from existing checkpoint, skipping full load");
                (cp.file, cp.pos)
            }
            _ => {
                self.run_full_load_with_retries(cancel.clone()).await?;
                let (file, pos) = self.source.master_status().await?;
                info!(file = %file, pos, "full load complete, captured handoff position");
                self.checkpoints
                    .write(&Checkpoint {
                        key: self.key.clone(),
                        file: file.clone(),
                        pos,
                    })
                    .await?;
                (file, pos)
            }
        };

        self.run_cdc(file, pos, cancel).await
    }

    async fn target_non_empty(&self) -> Result<bool, OrchestratorError> {
        if !self.target.table_exists(&self.config.target_table).await? {
            return Ok(false);
        }
        let rows = self
            .target
            .query_rows(&format!("SELECT 1 FROM `{}` LIMIT 1", self.config.target_table), &self.config.target_table)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Outer full-load retry budget: `FULLLOAD_MAX_RETRIES` attempts with a
    /// `2^attempt` second backoff capped at 60s (spec §4.7, §7). Between
    /// attempts, optionally drops the target and progress tables so the
    /// next attempt starts clean rather than resuming (`FULLLOAD_DROP_ON_RETRY`).
    async fn run_full_load_with_retries(&self, cancel: CancellationToken) -> Result<(), OrchestratorError> {
        let max_attempts = self.config.fullload_max_retries.max(1);
        let mut attempt = 0usize;

        loop {
            match self.run_full_load_once(cancel.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(OrchestratorError::FullLoadExhausted(attempt, e.to_string()));
                    }

                    warn!(attempt, error = %e, "full load attempt failed, retrying");
                    if self.config.fullload_drop_on_retry {
                        self.target.drop_table_if_exists(&self.config.target_table).await?;
                        self.target.drop_table_if_exists(PROGRESS_TABLE).await?;
                        self.progress.ensure_table().await?;
                    }

                    let backoff_secs = 1u64.checked_shl(attempt.min(6) as u32).unwrap_or(60).min(60);
                    sleep(Duration::from_secs(backoff_secs)).await;
                }
            }
        }
    }

    async fn run_full_load_once(&self, cancel: CancellationToken) -> Result<(), OrchestratorError> {
        self.ensure_target_schema().await?;

        let meta = self.source.table_metadata(&self.config.src_table).await?;

        match planner::detect_single_int_pk(&meta) {
            PkDetection::Eligible { column } => {
                let (min, max) = planner::get_min_max(&self.source, &self.config.src_table, &column).await?;
                if min == 0 && max == 0 {
                    // Empty source table (spec scenario 1): fall back to the
                    // cursor loader, which terminates immediately on an
                    // empty first batch.
                    self.run_cursor_load(meta, cancel).await?;
                    return Ok(());
                }

                let planned = planner::build_ranges(min, max, self.config.parallel_workers);
                let done = self.progress.done_ranges(&self.key).await?;
                let remaining = planner::filter_ranges(&planned, &done);

                info!(
                    planned = planned.len(),
                    remaining = remaining.len(),
                    "running range loader pool"
                );

                let pool = RangePool::with_retry(
                    self.source.clone(),
                    self.target.clone(),
                    meta,
                    column,
                    self.config.batch_size,
                    self.config.parallel_workers,
                    self.metrics.clone(),
                    RetryPolicy::for_database_with(self.config.db_retry_attempts, self.config.db_retry_max_wait_secs),
                );
                pool.run(&self.key, remaining, self.progress.clone(), cancel).await?;
                Ok(())
            }
            PkDetection::Ineligible => self.run_cursor_load(meta, cancel).await,
        }
    }

    async fn run_cursor_load(&self, meta: model::ColumnMeta, cancel: CancellationToken) -> Result<(), OrchestratorError> {
        info!("no eligible single integer PK, using cursor streaming loader");
        let loader = CursorStreamingLoader::with_metrics(
            self.source.clone(),
            self.target.clone(),
            meta,
            self.config.batch_size,
            self.metrics.clone(),
        );
        let rows = loader.run(cancel).await?;
        info!(rows, "cursor streaming load complete");
        Ok(())
    }

    /// Target schema obtained from the source's `SHOW CREATE TABLE`,
    /// textually substituting the target table name, dropping any existing
    /// target table first (spec §6).
    async fn ensure_target_schema(&self) -> Result<(), OrchestratorError> {
        let ddl = self.source.show_create_table(&self.config.src_table).await?;
        let substituted = substitute_table_name(&ddl, &self.config.target_table);
        self.target.drop_table_if_exists(&self.config.target_table).await?;
        self.target.exec(&substituted).await?;
        Ok(())
    }

    async fn run_cdc(&self, file: String, pos: u32, cancel: CancellationToken) -> Result<(), OrchestratorError> {
        let target_meta = self.target.table_metadata(&self.config.target_table).await?;
        let applier = RowApplier::with_metrics(self.target.clone(), target_meta.clone(), self.metrics.clone());

        let conn = self.source.conn().await?;
        let consumer = BinlogConsumer::connect(
            conn,
            self.config.binlog_server_id,
            file,
            pos,
            self.config.src_db.clone(),
            self.config.src_table.clone(),
            target_meta.column_count(),
        )
        .await?;

        let cdc = CdcLoop::new(
            self.source.clone(),
            self.key.clone(),
            self.checkpoints.clone(),
            applier,
            Duration::from_secs(self.config.checkpoint_write_seconds),
        );

        cdc.run(consumer, cancel).await
    }
}

/// Replaces the identifier immediately following `CREATE TABLE` (and an
/// optional `IF NOT EXISTS`) with `new_name`, leaving the rest of the DDL
/// (columns, keys, engine options) untouched.
fn substitute_table_name(ddl: &str, new_name: &str) -> String {
    let upper = ddl.to_ascii_uppercase();
    let keyword = "CREATE TABLE";
    let Some(kw_pos) = upper.find(keyword) else {
        return ddl.to_string();
    };
    let mut pos = kw_pos + keyword.len();

    while ddl.as_bytes().get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }

    if upper[pos..].starts_with("IF NOT EXISTS") {
        pos += "IF NOT EXISTS".len();
        while ddl.as_bytes().get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
    }

    let name_start = pos;
    let name_end = if ddl.as_bytes().get(pos) == Some(&b'`') {
        match ddl[pos + 1..].find('`') {
            Some(i) => pos + 1 + i + 1,
            None => return ddl.to_string(),
        }
    } else {
        ddl[pos..]
            .find(|c: char| c.is_whitespace() || c == '(')
            .map(|i| pos + i)
            .unwrap_or(ddl.len())
    };

    format!("{}`{new_name}`{}", &ddl[..name_start], &ddl[name_end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_simple_create_table_name() {
        let ddl = "CREATE TABLE `orders` (\n  `id` int NOT NULL\n) ENGINE=InnoDB";
        let result = substitute_table_name(ddl, "orders_copy");
        assert!(result.starts_with("CREATE TABLE `orders_copy` ("));
    }

    #[test]
    fn substitutes_name_with_if_not_exists() {
        let ddl = "CREATE TABLE IF NOT EXISTS `orders` (`id` int)";
        let result = substitute_table_name(ddl, "orders_copy");
        assert!(result.contains("`orders_copy`"));
        assert!(!result.contains("`orders`"));
    }
}
