use chrono::{DateTime, Utc};
use duckdb::types::{TimeUnit, Type, Value};
use locol_core::ids::hex_encode;
use locol_core::query::{ColumnType, ColumnValues};

pub(crate) fn column_type_of(ty: &Type) -> ColumnType {
    match ty {
        Type::Timestamp | Type::Date32 => ColumnType::Timestamp,
        Type::Float | Type::Double | Type::Decimal => ColumnType::Double,
        Type::TinyInt | Type::SmallInt | Type::Int | Type::UTinyInt | Type::USmallInt => {
            ColumnType::Int32
        }
        Type::BigInt | Type::HugeInt | Type::UInt | Type::UBigInt => ColumnType::Int64,
        Type::Boolean => ColumnType::Boolean,
        _ => ColumnType::String,
    }
}

/// Appends one cell, converting the engine value to the column's semantic type.
/// Values that do not fit the column become null.
pub(crate) fn push_value(column: &mut ColumnValues, value: Value) {
    match column {
        ColumnValues::Timestamp(v) => v.push(as_timestamp(&value)),
        ColumnValues::Double(v) => v.push(as_f64(&value)),
        ColumnValues::Int32(v) => v.push(as_i64(&value).and_then(|i| i32::try_from(i).ok())),
        ColumnValues::Int64(v) => v.push(as_i64(&value)),
        ColumnValues::Boolean(v) => v.push(match value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }),
        ColumnValues::String(v) => v.push(as_text(value)),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match *value {
        Value::TinyInt(i) => Some(i64::from(i)),
        Value::SmallInt(i) => Some(i64::from(i)),
        Value::Int(i) => Some(i64::from(i)),
        Value::BigInt(i) => Some(i),
        Value::HugeInt(i) => i64::try_from(i).ok(),
        Value::UTinyInt(i) => Some(i64::from(i)),
        Value::USmallInt(i) => Some(i64::from(i)),
        Value::UInt(i) => Some(i64::from(i)),
        Value::UBigInt(i) => i64::try_from(i).ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(f64::from(*f)),
        Value::Double(f) => Some(*f),
        Value::Decimal(d) => d.to_string().parse().ok(),
        other => as_i64(other).map(|i| i as f64),
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.checked_mul(1_000_000)?,
                TimeUnit::Millisecond => raw.checked_mul(1_000)?,
                TimeUnit::Microsecond => *raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            DateTime::from_timestamp_micros(micros)
        }
        Value::Date32(days) => DateTime::from_timestamp(i64::from(*days) * 86_400, 0),
        _ => None,
    }
}

fn as_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) | Value::Enum(s) => Some(s),
        Value::Blob(b) => Some(hex_encode(&b)),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(f) => Some(f.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        ref ts @ (Value::Timestamp(..) | Value::Date32(_)) => {
            as_timestamp(ts).map(|t| t.to_rfc3339())
        }
        ref other => as_i64(other)
            .map(|i| i.to_string())
            .or_else(|| Some(format!("{other:?}"))),
    }
}
