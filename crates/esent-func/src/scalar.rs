//! Scalar (row-level) function trait.
//!
//! Scalar functions compute one output value from zero or more inputs and
//! keep no state between rows. They are shared across connections through
//! `Arc`, so implementations must be `Send + Sync`.
#![allow(clippy::unnecessary_literal_bound)]

use esent_error::Result;
use esent_types::SqliteValue;

/// A scalar SQL function.
///
/// Stored in the [`FunctionRegistry`](crate::FunctionRegistry) as
/// `Arc<dyn ScalarFunction>`.
pub trait ScalarFunction: Send + Sync {
    /// Execute this function on the given arguments.
    fn invoke(&self, args: &[SqliteValue]) -> Result<SqliteValue>;

    /// Whether the same inputs always produce the same output. Defaults to
    /// `true`.
    fn is_deterministic(&self) -> bool {
        true
    }

    /// The number of arguments this function accepts, `-1` for variadic.
    fn num_args(&self) -> i32;

    /// The SQL-visible function name.
    fn name(&self) -> &str;
}
