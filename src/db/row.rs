//! Row conversion and argument binding.
//!
//! Rows come back as JSON objects keyed by column name so they can go
//! straight into a response envelope.

use serde_json::{Map, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row as _, ValueRef};

/// A result row: column name → value.
pub type Row = Map<String, Value>;

pub(crate) fn to_row(row: &AnyRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), column_value(row, column.ordinal())))
        .collect()
}

fn column_value(row: &AnyRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Value::Bool(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Value::String(String::from_utf8_lossy(&v).into_owned());
    }
    Value::Null
}

/// Bind JSON values as positional statement arguments.
pub(crate) fn bind_args<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    args: &'q [Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.as_str()),
            other => query.bind(other.to_string()),
        };
    }
    query
}
