use model::{ColumnMeta, FieldValue, RowData, Value};
use mysql_async::{Row as MySqlRow, Value as MySqlValue};

/// Raw byte columns are left as `Value::Bytes` untouched: whether they hold
/// text, a number, or a foreign charset is a call for the §4.6 charset
/// normalization heuristic downstream (`model::charset::decode`), not
/// something to decide here from byte content. Sniffing UTF-8/decimal shape
/// at this layer silently mangled `VARCHAR` values that happen to look
/// numeric ("00501", "0042") and defeated the heuristic for genuinely
/// non-UTF-8-looking-but-still-foreign-charset payloads.
pub fn value_from_mysql(raw: &MySqlValue) -> Value {
    match raw {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Bytes(bytes) => Value::Bytes(bytes.clone()),
        MySqlValue::Int(i) => Value::Int(*i),
        MySqlValue::UInt(u) => Value::UInt(*u),
        MySqlValue::Float(f) => Value::Float(*f as f64),
        MySqlValue::Double(d) => Value::Float(*d),
        MySqlValue::Date(year, month, day, hour, min, sec, micro) => {
            use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
            let date = NaiveDate::from_ymd_opt(*year as i32, *month as u32, *day as u32);
            let time = NaiveTime::from_hms_micro_opt(
                *hour as u32,
                *min as u32,
                *sec as u32,
                *micro,
            );
            match (date, time) {
                (Some(d), Some(t)) => Value::TimestampNaive(NaiveDateTime::new(d, t)),
                (Some(d), None) => Value::Date(d),
                _ => Value::Null,
            }
        }
        MySqlValue::Time(neg, days, hour, min, sec, micro) => Value::String(format!(
            "{}{}:{:02}:{:02}.{:06}",
            if *neg { "-" } else { "" },
            *days as u64 * 24 + *hour as u64,
            min,
            sec,
            micro
        )),
    }
}

pub fn row_to_row_data(row: &MySqlRow, table: &str) -> RowData {
    let columns = row.columns_ref();
    let fields = (0..columns.len())
        .map(|idx| {
            let name = columns[idx].name_str().to_string();
            let raw = row.as_ref(idx).cloned().unwrap_or(MySqlValue::NULL);
            FieldValue {
                name,
                value: value_from_mysql(&raw),
            }
        })
        .collect();

    RowData::new(table, fields)
}

/// Builds the explicit `(col1, col2, ...)` and repeated `(?,?,...)`
/// fragments for a chunked multi-row INSERT (spec §4.3 step 3).
pub fn insert_sql(table: &str, meta: &ColumnMeta, row_count: usize) -> String {
    let cols = meta
        .column_names()
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let one_row = format!("({})", vec!["?"; meta.column_count()].join(","));
    let all_rows = vec![one_row; row_count].join(", ");
    format!("INSERT INTO `{table}` ({cols}) VALUES {all_rows}")
}
