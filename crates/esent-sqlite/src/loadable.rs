//! `sqlite3_extension_init` for `.load esent_sqlite`.

#![allow(unsafe_code)]

use std::os::raw::{c_char, c_int};
use std::sync::Arc;

use esent_engine::EsentEngine;
use esent_vtab::VtabConfig;
use rusqlite::{Connection, ffi};

fn init(conn: Connection) -> rusqlite::Result<bool> {
    crate::register(&conn, Arc::new(EsentEngine::new()), VtabConfig::default())?;
    Ok(false)
}

/// Entry point SQLite calls when the library is loaded as an extension.
///
/// # Safety
///
/// Must only be called by SQLite's extension loader with its own `db`,
/// error slot, and API table.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_extension_init(
    db: *mut ffi::sqlite3,
    pz_err_msg: *mut *mut c_char,
    p_api: *mut ffi::sqlite3_api_routines,
) -> c_int {
    // SAFETY: arguments come straight from the extension loader.
    unsafe { Connection::extension_init2(db, pz_err_msg, p_api, init) }
}
