//! Scalar function registration.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use esent_func::{FunctionRegistry, ScalarFunction};
use esent_types::SqliteValue;
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use tracing::debug;

use crate::convert::{value_from_ref, value_to_sql};

/// Install every scalar function in `registry` on `conn`.
///
/// # Errors
///
/// Any error SQLite reports while creating a function.
pub fn register_scalars(conn: &Connection, registry: &FunctionRegistry) -> rusqlite::Result<()> {
    for function in registry.scalars() {
        let mut flags = FunctionFlags::SQLITE_UTF8;
        if function.is_deterministic() {
            flags |= FunctionFlags::SQLITE_DETERMINISTIC;
        }
        let name = function.name().to_owned();
        let arity = function.num_args();
        let function = AssertUnwindSafe(Arc::clone(function));
        conn.create_scalar_function(name.as_str(), arity, flags, move |ctx| {
            let function: &Arc<dyn ScalarFunction> = &function;
            let args: Vec<SqliteValue> = (0..ctx.len()).map(|i| value_from_ref(ctx.get_raw(i))).collect();
            function
                .invoke(&args)
                .map(value_to_sql)
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))
        })?;
        debug!(name, arity, "scalar function registered");
    }
    Ok(())
}
