use crate::error::OrchestratorError;
use engine_core::Metrics;
use model::charset::{self, Decoded};
use model::{ColumnMeta, RowData, Value};
use mysql::{MySqlAdapter, RowOp};
use tracing::warn;

/// Translates decoded binlog row events into target SQL and executes them
/// (spec §4.6). INSERT becomes `REPLACE INTO` so a replayed event after
/// restart never fails on a duplicate key; UPDATE/DELETE key off the
/// before-image's primary-key value(s), which is what the source committed
/// before the change, not the (possibly different) after-image.
pub struct RowApplier {
    target: MySqlAdapter,
    meta: ColumnMeta,
    metrics: Metrics,
}

impl RowApplier {
    pub fn new(target: MySqlAdapter, meta: ColumnMeta) -> Self {
        Self::with_metrics(target, meta, Metrics::new())
    }

    pub fn with_metrics(target: MySqlAdapter, meta: ColumnMeta, metrics: Metrics) -> Self {
        Self { target, meta, metrics }
    }

    /// Applies one row op, writing to the shared `Metrics` handle (spec
    /// ambient stack: the applier is the metrics write path; an external
    /// HTTP endpoint would be the read path, out of scope here).
    pub async fn apply(&self, op: RowOp) -> Result<(), OrchestratorError> {
        let result = match op {
            RowOp::Insert(row) => self.apply_insert(row).await,
            RowOp::Update { before, after } => self.apply_update(before, after).await,
            RowOp::Delete(before) => self.apply_delete(before).await,
        };
        match &result {
            Ok(()) => self.metrics.increment_records(1).await,
            Err(_) => self.metrics.increment_failures(1),
        }
        result
    }

    async fn apply_insert(&self, mut row: RowData) -> Result<(), OrchestratorError> {
        truncate_and_normalize(&mut row, self.meta.column_count());

        let cols = self.meta.column_names();
        let col_list = cols.iter().map(|c| format!("`{c}`")).collect::<Vec<_>>().join(", ");
        let placeholders = vec!["?"; cols.len()].join(", ");
        let sql = format!(
            "REPLACE INTO `{}` ({col_list}) VALUES ({placeholders})",
            self.meta.table
        );

        let values: Vec<Value> = cols
            .iter()
            .map(|name| row.get(name).cloned().unwrap_or(Value::Null))
            .collect();

        self.target.exec_params(&sql, &values).await?;
        Ok(())
    }

    async fn apply_update(&self, before: RowData, mut after: RowData) -> Result<(), OrchestratorError> {
        truncate_and_normalize(&mut after, self.meta.column_count());

        let key_cols = self.key_columns();
        let set_cols: Vec<&str> = self
            .meta
            .column_names()
            .into_iter()
            .filter(|c| !key_cols.iter().any(|k| k.eq_ignore_ascii_case(c)))
            .collect();

        let set_clause = set_cols.iter().map(|c| format!("`{c}` = ?")).collect::<Vec<_>>().join(", ");
        let where_clause = key_cols.iter().map(|c| format!("`{c}` = ?")).collect::<Vec<_>>().join(" AND ");
        let sql = format!("UPDATE `{}` SET {set_clause} WHERE {where_clause}", self.meta.table);

        let mut values: Vec<Value> = set_cols
            .iter()
            .map(|name| after.get(name).cloned().unwrap_or(Value::Null))
            .collect();
        values.extend(before_key_values(&before, &key_cols));

        self.target.exec_params(&sql, &values).await?;
        Ok(())
    }

    async fn apply_delete(&self, before: RowData) -> Result<(), OrchestratorError> {
        let key_cols = self.key_columns();
        let where_clause = key_cols.iter().map(|c| format!("`{c}` = ?")).collect::<Vec<_>>().join(" AND ");
        let sql = format!("DELETE FROM `{}` WHERE {where_clause}", self.meta.table);

        let values = before_key_values(&before, &key_cols);
        self.target.exec_params(&sql, &values).await?;
        Ok(())
    }

    /// Falls back to the first column when no PK metadata is discoverable
    /// (spec §4.6).
    fn key_columns(&self) -> Vec<String> {
        self.meta.apply_key_columns().to_vec()
    }
}

fn before_key_values(before: &RowData, key_cols: &[String]) -> Vec<Value> {
    key_cols
        .iter()
        .map(|c| before.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Column count mismatch on apply truncates to the target's column count
/// rather than failing (spec §7); every `Bytes` field is run through the
/// charset-normalization heuristic. NULLs and already-typed values pass
/// through untouched -- the heuristic only ever applies to raw byte
/// buffers, never to values already known to be text (spec §9 open
/// question, resolved this way).
fn truncate_and_normalize(row: &mut RowData, width: usize) {
    if row.fields.len() > width {
        warn!(got = row.fields.len(), want = width, "truncating row to target column count");
        row.truncate_to(width);
    }

    for field in row.fields.iter_mut() {
        if let Value::Bytes(bytes) = &field.value {
            field.value = match charset::decode(bytes) {
                Decoded::Text(s) => Value::String(s),
                Decoded::Raw(raw) => Value::Bytes(raw),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{ColumnInfo, DataType, FieldValue};

    fn meta() -> ColumnMeta {
        ColumnMeta {
            table: "orders".into(),
            columns: vec![
                ColumnInfo { name: "id".into(), data_type: DataType::BigInt },
                ColumnInfo { name: "name".into(), data_type: DataType::VarChar },
            ],
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn truncates_extra_columns_and_decodes_bytes() {
        let mut row = RowData::new(
            "orders",
            vec![
                FieldValue { name: "id".into(), value: Value::Int(7) },
                FieldValue { name: "name".into(), value: Value::Bytes(b"hi".to_vec()) },
                FieldValue { name: "extra".into(), value: Value::Int(1) },
            ],
        );

        truncate_and_normalize(&mut row, meta().column_count());

        assert_eq!(row.fields.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::String("hi".to_string())));
    }

    #[test]
    fn null_values_are_left_untouched() {
        let mut row = RowData::new(
            "orders",
            vec![
                FieldValue { name: "id".into(), value: Value::Int(1) },
                FieldValue { name: "name".into(), value: Value::Null },
            ],
        );
        truncate_and_normalize(&mut row, 2);
        assert_eq!(row.get("name"), Some(&Value::Null));
    }
}
