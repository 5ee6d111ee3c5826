use chrono::{Datelike, Timelike};
use model::Value;
use mysql_async::Value as MySqlValue;
use mysql_common::params::Params;

fn to_mysql_value(value: &Value) -> MySqlValue {
    match value {
        Value::Int(i) => MySqlValue::Int(*i),
        Value::UInt(u) => MySqlValue::UInt(*u),
        Value::Float(f) => MySqlValue::Double(*f),
        Value::Decimal(d) => MySqlValue::Bytes(d.to_string().into_bytes()),
        Value::String(s) => MySqlValue::Bytes(s.clone().into_bytes()),
        Value::Boolean(b) => MySqlValue::Int(if *b { 1 } else { 0 }),
        Value::Json(j) => MySqlValue::Bytes(j.to_string().into_bytes()),
        Value::Bytes(b) => MySqlValue::Bytes(b.clone()),
        Value::Date(d) => MySqlValue::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        Value::Timestamp(ts) => {
            let naive = ts.naive_utc();
            MySqlValue::Date(
                naive.year() as u16,
                naive.month() as u8,
                naive.day() as u8,
                naive.hour() as u8,
                naive.minute() as u8,
                naive.second() as u8,
                naive.and_utc().timestamp_subsec_micros(),
            )
        }
        Value::TimestampNaive(naive) => MySqlValue::Date(
            naive.year() as u16,
            naive.month() as u8,
            naive.day() as u8,
            naive.hour() as u8,
            naive.minute() as u8,
            naive.second() as u8,
            0,
        ),
        Value::Null => MySqlValue::NULL,
    }
}

pub fn to_params(values: &[Value]) -> Params {
    Params::Positional(values.iter().map(to_mysql_value).collect())
}
