use crate::error::FullLoadError;
use engine_core::{Metrics, ProgressStore, RetryPolicy};
use model::{ColumnMeta, MigrationKey, PkRange};
use mysql::{adapter::build_insert_sql, MySqlAdapter};
use mysql_async::prelude::Queryable;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const INSERT_CHUNK_ROWS: usize = 1000;

/// N concurrent workers copying disjoint PK ranges with batched extended
/// INSERTs (spec §4.3). Each worker owns its own transaction; there is no
/// shared mutable per-row state, so the pool is just a bounded dispatch
/// channel plus a join on the worker set.
pub struct RangePool {
    source: MySqlAdapter,
    target: MySqlAdapter,
    meta: ColumnMeta,
    pk_column: String,
    batch_size: usize,
    workers: usize,
    metrics: Metrics,
    retry: RetryPolicy,
}

impl RangePool {
    pub fn new(
        source: MySqlAdapter,
        target: MySqlAdapter,
        meta: ColumnMeta,
        pk_column: String,
        batch_size: usize,
        workers: usize,
    ) -> Self {
        Self::with_metrics(source, target, meta, pk_column, batch_size, workers, Metrics::new())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_metrics(
        source: MySqlAdapter,
        target: MySqlAdapter,
        meta: ColumnMeta,
        pk_column: String,
        batch_size: usize,
        workers: usize,
        metrics: Metrics,
    ) -> Self {
        Self::with_retry(source, target, meta, pk_column, batch_size, workers, metrics, RetryPolicy::for_database())
    }

    /// `retry` governs per-batch `SELECT`/`INSERT` retries against `DB_RETRY_ATTEMPTS` /
    /// `DB_RETRY_MAX_WAIT` (spec §6) rather than `RetryPolicy::for_database`'s hardcoded defaults.
    #[allow(clippy::too_many_arguments)]
    pub fn with_retry(
        source: MySqlAdapter,
        target: MySqlAdapter,
        meta: ColumnMeta,
        pk_column: String,
        batch_size: usize,
        workers: usize,
        metrics: Metrics,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            target,
            meta,
            pk_column,
            batch_size: batch_size.max(1),
            workers: workers.max(1),
            metrics,
            retry,
        }
    }

    /// Runs the pool to completion. A worker error terminates the whole
    /// pool: a private child of `cancel` is tripped as soon as any worker
    /// fails, so sibling workers stop picking up new ranges and unwind
    /// between batches instead of running on, detached, against a target
    /// the orchestrator may be about to drop (spec §4.3 failure semantics:
    /// the orchestrator, not this pool, owns the outer retry budget).
    pub async fn run(
        &self,
        key: &MigrationKey,
        ranges: Vec<PkRange>,
        progress: Arc<dyn ProgressStore>,
        cancel: CancellationToken,
    ) -> Result<(), FullLoadError> {
        let (tx, rx) = mpsc::channel::<PkRange>(self.workers * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let worker_cancel = cancel.child_token();

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let rx = rx.clone();
            let source = self.source.clone();
            let target = self.target.clone();
            let meta = self.meta.clone();
            let pk_column = self.pk_column.clone();
            let batch_size = self.batch_size;
            let key = key.clone();
            let progress = progress.clone();
            let cancel = worker_cancel.clone();
            let metrics = self.metrics.clone();
            let retry = self.retry.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let range = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(range) = range else { break };

                    if cancel.is_cancelled() {
                        return Err(FullLoadError::RangeFailed(
                            range.start,
                            range.end,
                            "cancelled".to_string(),
                        ));
                    }

                    info!(worker_id, start = range.start, end = range.end, "loading range");
                    if let Err(e) =
                        load_range(&source, &target, &meta, &pk_column, batch_size, &range, &cancel, &metrics, &retry).await
                    {
                        metrics.increment_failures(1);
                        cancel.cancel();
                        return Err(FullLoadError::RangeFailed(range.start, range.end, e.to_string()));
                    }

                    progress.mark_done(&key, &range).await?;
                }
                Ok(())
            }));
        }

        for range in ranges {
            if worker_cancel.is_cancelled() || tx.send(range).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut first_err: Option<FullLoadError> = None;
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(FullLoadError::RangeFailed(0, 0, format!("worker panicked: {e}"))),
            };
            if let Err(e) = result {
                worker_cancel.cancel();
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn load_range(
    source: &MySqlAdapter,
    target: &MySqlAdapter,
    meta: &ColumnMeta,
    pk_column: &str,
    batch_size: usize,
    range: &PkRange,
    cancel: &CancellationToken,
    metrics: &Metrics,
    retry: &RetryPolicy,
) -> Result<(), mysql::DbError> {
    let mut offset = range.start;

    while offset <= range.end {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let rows = retry
            .run(
                || select_batch(source, meta, pk_column, offset, range.end, batch_size),
                |e: &mysql::DbError| match e.classify() {
                    mysql::ErrorKind::Transient => engine_core::RetryDisposition::Retry,
                    mysql::ErrorKind::Fatal => engine_core::RetryDisposition::Stop,
                },
            )
            .await
            .map_err(unwrap_retry)?;

        if rows.is_empty() {
            break;
        }

        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            insert_chunk(target, meta, chunk).await?;
            metrics.increment_records(chunk.len() as u64).await;
            metrics.increment_batches(1);
        }

        let observed_max = max_pk_in_range(target, meta, pk_column, offset, range.end).await?;
        match observed_max {
            Some(max) => offset = max + 1,
            None => break,
        }
    }

    Ok(())
}

async fn select_batch(
    source: &MySqlAdapter,
    meta: &ColumnMeta,
    pk_column: &str,
    start: i64,
    end: i64,
    batch_size: usize,
) -> Result<Vec<model::RowData>, mysql::DbError> {
    let sql = format!(
        "SELECT * FROM `{}` WHERE `{pk_column}` BETWEEN ? AND ? ORDER BY `{pk_column}` LIMIT {batch_size}",
        meta.table
    );
    let mut conn = source.conn().await?;
    let rows: Vec<mysql_async::Row> = conn.exec(sql, (start, end)).await?;
    Ok(rows.iter().map(|r| mysql::row::row_to_row_data(r, &meta.table)).collect())
}

async fn insert_chunk(target: &MySqlAdapter, meta: &ColumnMeta, rows: &[model::RowData]) -> Result<(), mysql::DbError> {
    let sql = build_insert_sql(&meta.table, meta, rows.len());
    let values: Vec<model::Value> = rows
        .iter()
        .flat_map(|row| {
            meta.column_names()
                .iter()
                .map(|name| row.get(name).cloned().unwrap_or(model::Value::Null))
        })
        .collect();

    let mut conn = target.conn().await?;
    conn.query_drop("SET FOREIGN_KEY_CHECKS=0").await.ok();
    let mut tx = conn.start_transaction(Default::default()).await?;
    tx.exec_drop(sql, mysql::params::to_params(&values)).await?;
    tx.commit().await?;
    Ok(())
}

async fn max_pk_in_range(
    target: &MySqlAdapter,
    meta: &ColumnMeta,
    pk_column: &str,
    start: i64,
    end: i64,
) -> Result<Option<i64>, mysql::DbError> {
    let mut conn = target.conn().await?;
    let max: Option<i64> = conn
        .exec_first(
            format!(
                "SELECT MAX(`{pk_column}`) FROM `{}` WHERE `{pk_column}` BETWEEN ? AND ?",
                meta.table
            ),
            (start, end),
        )
        .await?;
    Ok(max)
}

fn unwrap_retry(err: engine_core::RetryError<mysql::DbError>) -> mysql::DbError {
    match err {
        engine_core::RetryError::Fatal(e) => e,
        engine_core::RetryError::AttemptsExceeded(e) => e,
    }
}
