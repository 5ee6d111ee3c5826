use crate::value::{DataType, Value};
use serde::{Deserialize, Serialize};

/// Ordered column list plus primary-key column names, cached once per table
/// for the lifetime of a run (spec §3 ColumnMeta).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnMeta {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Spec §4.2: eligible for range partitioning iff the PK is exactly one
    /// integer column.
    pub fn single_integer_pk(&self) -> Option<&str> {
        let [pk] = self.primary_key.as_slice() else {
            return None;
        };
        let col = self.columns.iter().find(|c| &c.name == pk)?;
        col.data_type.is_integer().then_some(pk.as_str())
    }

    /// Falls back to the first column when no PK metadata is discoverable,
    /// per spec §4.6.
    pub fn apply_key_columns(&self) -> &[String] {
        if self.primary_key.is_empty() {
            std::slice::from_ref(&self.columns[0].name)
        } else {
            &self.primary_key
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowData {
    pub table: String,
    pub fields: Vec<FieldValue>,
}

impl RowData {
    pub fn new(table: impl Into<String>, fields: Vec<FieldValue>) -> Self {
        Self {
            table: table.into(),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| &f.value)
    }

    /// Truncates the row to `width` columns (spec §7: "Column count mismatch
    /// on apply" -> truncate, do not fail).
    pub fn truncate_to(&mut self, width: usize) {
        self.fields.truncate(width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pk: Vec<&str>, cols: Vec<(&str, DataType)>) -> ColumnMeta {
        ColumnMeta {
            table: "t".into(),
            columns: cols
                .into_iter()
                .map(|(name, data_type)| ColumnInfo {
                    name: name.into(),
                    data_type,
                })
                .collect(),
            primary_key: pk.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn single_integer_pk_detected() {
        let m = meta(vec!["id"], vec![("id", DataType::BigInt), ("name", DataType::VarChar)]);
        assert_eq!(m.single_integer_pk(), Some("id"));
    }

    #[test]
    fn composite_pk_not_eligible() {
        let m = meta(
            vec!["a", "b"],
            vec![("a", DataType::Int), ("b", DataType::Int)],
        );
        assert_eq!(m.single_integer_pk(), None);
    }

    #[test]
    fn non_integer_pk_not_eligible() {
        let m = meta(vec!["uuid"], vec![("uuid", DataType::VarChar)]);
        assert_eq!(m.single_integer_pk(), None);
    }

    #[test]
    fn missing_pk_falls_back_to_first_column() {
        let m = meta(vec![], vec![("a", DataType::Int), ("b", DataType::VarChar)]);
        assert_eq!(m.apply_key_columns(), &["a".to_string()]);
    }
}
