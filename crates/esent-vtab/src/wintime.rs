//! `wintime(ticks)`: engine timestamps to Unix seconds.
//!
//! The engine stores instants as 100 ns ticks since 1601-01-01T00:00:00Z
//! (a Windows `FILETIME`).
#![allow(clippy::unnecessary_literal_bound)]

use esent_error::Result;
use esent_func::ScalarFunction;
use esent_types::SqliteValue;

/// `FILETIME` ticks at 1970-01-01T00:00:00Z.
pub const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert `FILETIME` ticks to Unix seconds, truncating toward zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn filetime_to_unix(ticks: i64) -> i64 {
    // |result| < 2^63 / 10^7 + epoch seconds, so narrowing cannot lose bits.
    ((i128::from(ticks) - i128::from(UNIX_EPOCH_TICKS)) / i128::from(TICKS_PER_SECOND)) as i64
}

/// The `wintime` scalar function.
pub struct WintimeFunc;

impl ScalarFunction for WintimeFunc {
    fn invoke(&self, args: &[SqliteValue]) -> Result<SqliteValue> {
        Ok(match args.first() {
            Some(value) if !value.is_null() => {
                SqliteValue::Integer(filetime_to_unix(value.to_integer()))
            }
            _ => SqliteValue::Null,
        })
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "wintime"
    }
}
