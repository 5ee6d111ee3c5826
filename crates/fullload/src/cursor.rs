use crate::error::FullLoadError;
use engine_core::Metrics;
use model::{ColumnMeta, RowData, Value};
use mysql::{adapter::build_insert_sql, MySqlAdapter};
use mysql_async::prelude::Queryable;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const INSERT_CHUNK_ROWS: usize = 1000;
const DEFAULT_INSERTERS: usize = 4;

/// Key-set pagination fallback for tables with no eligible single integer
/// PK (spec §4.4). Pipelines one reader task against `K` inserter tasks
/// over a bounded channel of batches, sized `2K` so a slow target can't let
/// the reader run unbounded memory ahead of it.
pub struct CursorStreamingLoader {
    source: MySqlAdapter,
    target: MySqlAdapter,
    meta: ColumnMeta,
    cursor_columns: Vec<String>,
    batch_size: usize,
    inserters: usize,
    metrics: Metrics,
}

impl CursorStreamingLoader {
    pub fn new(source: MySqlAdapter, target: MySqlAdapter, meta: ColumnMeta, batch_size: usize) -> Self {
        Self::with_metrics(source, target, meta, batch_size, Metrics::new())
    }

    pub fn with_metrics(
        source: MySqlAdapter,
        target: MySqlAdapter,
        meta: ColumnMeta,
        batch_size: usize,
        metrics: Metrics,
    ) -> Self {
        let cursor_columns = if meta.primary_key.is_empty() {
            meta.column_names().iter().map(|s| s.to_string()).collect()
        } else {
            meta.primary_key.clone()
        };
        Self {
            source,
            target,
            meta,
            cursor_columns,
            batch_size: batch_size.max(1),
            inserters: DEFAULT_INSERTERS,
            metrics,
        }
    }

    pub fn with_inserters(mut self, inserters: usize) -> Self {
        self.inserters = inserters.max(1);
        self
    }

    /// Runs the producer/consumer pipeline to completion and returns the
    /// number of rows copied. Any inserter error is surfaced through a
    /// non-blocking error channel and trips `failure`, a dedicated
    /// cancellation signal the producer selects on alongside its own batch
    /// send: on first failure the producer stops enqueueing and unblocks
    /// even if every inserter has already died and nothing is left to drain
    /// the batch channel, then in-flight inserters are awaited and the
    /// error is returned (spec §9).
    pub async fn run(&self, cancel: CancellationToken) -> Result<u64, FullLoadError> {
        let queue_depth = self.inserters * 2;
        let (tx, rx) = mpsc::channel::<Vec<RowData>>(queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let (err_tx, mut err_rx) = mpsc::channel::<FullLoadError>(1);
        let failure = CancellationToken::new();

        let rows_copied = Arc::new(std::sync::atomic::AtomicU64::new(0));

        let mut inserter_handles = Vec::with_capacity(self.inserters);
        for _ in 0..self.inserters {
            let rx = rx.clone();
            let target = self.target.clone();
            let meta = self.meta.clone();
            let err_tx = err_tx.clone();
            let rows_copied = rows_copied.clone();
            let metrics = self.metrics.clone();
            let failure = failure.clone();

            inserter_handles.push(tokio::spawn(async move {
                loop {
                    let batch = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(batch) = batch else { break };
                    if batch.is_empty() {
                        continue;
                    }
                    if let Err(e) = insert_batch(&target, &meta, &batch).await {
                        metrics.increment_failures(1);
                        let _ = err_tx.try_send(FullLoadError::from(e));
                        failure.cancel();
                        break;
                    }
                    rows_copied.fetch_add(batch.len() as u64, std::sync::atomic::Ordering::Relaxed);
                    metrics.increment_records(batch.len() as u64).await;
                    metrics.increment_batches(1);
                }
            }));
        }
        drop(err_tx);

        let producer_result = self.produce(tx, cancel, failure).await;

        for handle in inserter_handles {
            let _ = handle.await;
        }

        if let Ok(err) = err_rx.try_recv() {
            return Err(err);
        }
        producer_result?;

        Ok(rows_copied.load(std::sync::atomic::Ordering::Relaxed))
    }

    async fn produce(
        &self,
        tx: mpsc::Sender<Vec<RowData>>,
        cancel: CancellationToken,
        failure: CancellationToken,
    ) -> Result<(), FullLoadError> {
        let mut cursor: Option<Vec<Value>> = None;

        loop {
            if cancel.is_cancelled() || failure.is_cancelled() {
                break;
            }

            let batch = self.fetch_batch(cursor.as_deref()).await?;
            if batch.is_empty() {
                break;
            }

            let short_batch = batch.len() < self.batch_size;
            cursor = Some(
                self.cursor_columns
                    .iter()
                    .map(|c| batch.last().unwrap().get(c).cloned().unwrap_or(Value::Null))
                    .collect(),
            );

            info!(rows = batch.len(), "cursor loader fetched batch");
            tokio::select! {
                biased;
                _ = failure.cancelled() => break,
                result = tx.send(batch) => {
                    if result.is_err() {
                        break;
                    }
                }
            }

            if short_batch {
                break;
            }
        }

        Ok(())
    }

    async fn fetch_batch(&self, cursor: Option<&[Value]>) -> Result<Vec<RowData>, FullLoadError> {
        let order_by = self
            .cursor_columns
            .iter()
            .map(|c| format!("`{c}`"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut conn = self.source.conn().await?;
        let rows: Vec<mysql_async::Row> = match cursor {
            None => {
                let sql = format!(
                    "SELECT * FROM `{}` ORDER BY {order_by} LIMIT {}",
                    self.meta.table, self.batch_size
                );
                conn.query(sql).await?
            }
            Some(values) => {
                let tuple_cols = self
                    .cursor_columns
                    .iter()
                    .map(|c| format!("`{c}`"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = vec!["?"; values.len()].join(", ");
                let sql = format!(
                    "SELECT * FROM `{}` WHERE ({tuple_cols}) > ({placeholders}) ORDER BY {order_by} LIMIT {}",
                    self.meta.table, self.batch_size
                );
                conn.exec(sql, mysql::params::to_params(values)).await?
            }
        };

        Ok(rows
            .iter()
            .map(|r| mysql::row::row_to_row_data(r, &self.meta.table))
            .collect())
    }
}

async fn insert_batch(target: &MySqlAdapter, meta: &ColumnMeta, rows: &[RowData]) -> Result<(), mysql::DbError> {
    let mut conn = target.conn().await?;
    set_session_options(&mut conn).await;
    let mut tx = conn.start_transaction(Default::default()).await?;
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let sql = build_insert_sql(&meta.table, meta, chunk.len());
        let values: Vec<Value> = chunk
            .iter()
            .flat_map(|row| {
                meta.column_names()
                    .iter()
                    .map(|name| row.get(name).cloned().unwrap_or(Value::Null))
            })
            .collect();
        tx.exec_drop(sql, mysql::params::to_params(&values)).await?;
    }
    restore_session_options(&mut tx).await;
    tx.commit().await?;
    Ok(())
}

/// Best-effort session tuning on this connection before its insert
/// transaction (spec §4.4): disables binary logging, unique-key checks,
/// and foreign-key checks. Set per-connection rather than pool-wide, since
/// a pooled connection's session state doesn't carry to a different
/// connection drawn later. Unsupported variables are logged, never fatal.
/// Generic over `Queryable` so it runs the same way against a bare
/// connection (before the transaction starts) or the transaction itself
/// (to restore, since the transaction owns the connection once started).
async fn set_session_options(conn: &mut impl Queryable) {
    for stmt in ["SET SESSION sql_log_bin=0", "SET SESSION unique_checks=0", "SET SESSION foreign_key_checks=0"] {
        if let Err(e) = conn.query_drop(stmt).await {
            warn!(stmt, error = %e, "session option unsupported, continuing");
        }
    }
}

async fn restore_session_options(conn: &mut impl Queryable) {
    for stmt in ["SET SESSION sql_log_bin=1", "SET SESSION unique_checks=1", "SET SESSION foreign_key_checks=1"] {
        if let Err(e) = conn.query_drop(stmt).await {
            warn!(stmt, error = %e, "failed to restore session option");
        }
    }
}
