//! SQLite binding for `esentvtab`.
//!
//! [`register`] installs the `esentvtab` module and its scalar functions on a
//! [`rusqlite::Connection`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use esent_engine::MemoryEngine;
//! use esent_vtab::VtabConfig;
//!
//! let conn = rusqlite::Connection::open_in_memory()?;
//! esent_sqlite::register(&conn, Arc::new(MemoryEngine::new()), VtabConfig::default())?;
//! conn.execute_batch("CREATE VIRTUAL TABLE mail USING esentvtab('mail.edb', Messages)")?;
//! # Ok::<(), rusqlite::Error>(())
//! ```

mod convert;
mod functions;
#[cfg(all(windows, feature = "loadable"))]
mod loadable;
mod module;

use std::sync::Arc;

use esent_engine::JetEngine;
use esent_func::FunctionRegistry;
use esent_vtab::{EsentModule, MODULE_NAME, VtabConfig, register_esent_scalars};
use rusqlite::Connection;
use rusqlite::vtab::read_only_module;
use tracing::info;

pub use convert::{to_sqlite_error, value_from_ref, value_to_sql};
pub use functions::register_scalars;
pub use module::{EsentSqliteCursor, EsentSqliteTable};

/// Install the `esentvtab` module over `engine` plus the `wintime` function.
///
/// # Errors
///
/// Any error SQLite reports while registering the module or a function.
pub fn register<E>(conn: &Connection, engine: Arc<E>, config: VtabConfig) -> rusqlite::Result<()>
where
    E: JetEngine + 'static,
{
    let engine_name = engine.name();
    conn.create_module(
        MODULE_NAME,
        read_only_module::<EsentSqliteTable<E>>(),
        Some(EsentModule::new(engine, config)),
    )?;

    let mut registry = FunctionRegistry::new();
    register_esent_scalars(&mut registry);
    register_scalars(conn, &registry)?;
    info!(module = MODULE_NAME, engine = engine_name, "esentvtab registered");
    Ok(())
}
