//! Value and error conversion between the adapter and rusqlite.

use esent_error::EsentError;
use esent_types::SqliteValue;
use rusqlite::ffi;
use rusqlite::types::{Value, ValueRef};

/// Surface an adapter error to SQLite with its result code and message.
#[must_use]
pub fn to_sqlite_error(err: &EsentError) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        ffi::Error::new(err.error_code() as i32),
        Some(err.to_string()),
    )
}

/// Copy a SQLite value into the adapter's value type.
#[must_use]
pub fn value_from_ref(value: ValueRef<'_>) -> SqliteValue {
    match value {
        ValueRef::Null => SqliteValue::Null,
        ValueRef::Integer(i) => SqliteValue::Integer(i),
        ValueRef::Real(f) => SqliteValue::float_or_null(f),
        ValueRef::Text(t) => SqliteValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqliteValue::Blob(b.to_vec()),
    }
}

/// Convert an adapter value into one rusqlite can bind or return.
#[must_use]
pub fn value_to_sql(value: SqliteValue) -> Value {
    match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(i) => Value::Integer(i),
        SqliteValue::Float(f) => Value::Real(f),
        SqliteValue::Text(s) => Value::Text(s),
        SqliteValue::Blob(b) => Value::Blob(b),
    }
}
