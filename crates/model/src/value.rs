use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MySQL column kind, coarse enough to answer "is this an integer PK
/// column" without needing the full width/signedness lattice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Boolean,
    Date,
    Time,
    Year,
    Timestamp,
    DateTime,
    VarChar,
    Char,
    Text,
    Json,
    Enum,
    Set,
    Binary,
    VarBinary,
    Blob,
    Bit,
    Other,
}

impl DataType {
    /// Used by the PK range planner (spec §4.2): eligible for range
    /// partitioning only when the column is an integer of any width.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::MediumInt
                | DataType::Int
                | DataType::BigInt
                | DataType::Year
        )
    }

    pub fn from_mysql_type_name(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase();
        let base = normalized.split(['(', ' ']).next().unwrap_or("");
        match base {
            "TINYINT" => DataType::TinyInt,
            "SMALLINT" => DataType::SmallInt,
            "MEDIUMINT" => DataType::MediumInt,
            "INT" | "INTEGER" => DataType::Int,
            "BIGINT" => DataType::BigInt,
            "DECIMAL" | "NUMERIC" => DataType::Decimal,
            "FLOAT" => DataType::Float,
            "DOUBLE" => DataType::Double,
            "BOOL" | "BOOLEAN" => DataType::Boolean,
            "DATE" => DataType::Date,
            "TIME" => DataType::Time,
            "YEAR" => DataType::Year,
            "TIMESTAMP" => DataType::Timestamp,
            "DATETIME" => DataType::DateTime,
            "VARCHAR" => DataType::VarChar,
            "CHAR" => DataType::Char,
            "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => DataType::Text,
            "JSON" => DataType::Json,
            "ENUM" => DataType::Enum,
            "SET" => DataType::Set,
            "BINARY" => DataType::Binary,
            "VARBINARY" => DataType::VarBinary,
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => DataType::Blob,
            "BIT" => DataType::Bit,
            _ => DataType::Other,
        }
    }
}

/// A single decoded column value. `Bytes` carries raw payload (e.g. a
/// binlog row image field before charset normalization); `String` is a
/// value already known to be text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Boolean(bool),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    TimestampNaive(NaiveDateTime),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render for use as a SQL literal-free placeholder value. Applier code
    /// binds `Value`s via the connector's parameterized-query API rather
    /// than string interpolation; this is only used by tests/log lines.
    pub fn display_debug(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::TimestampNaive(v) => write!(f, "{v}"),
            Value::Null => write!(f, "NULL"),
        }
    }
}
