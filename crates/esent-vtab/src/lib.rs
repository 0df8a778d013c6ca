//! esentvtab: a legacy ISAM (ESENT) table as a read-only virtual table.
//!
//! ```sql
//! CREATE VIRTUAL TABLE mail USING esentvtab('C:\data\mail.edb', Messages);
//! SELECT Subject, wintime(Received) FROM mail;
//! ```
//!
//! The table is declared from the engine's column catalog at create time;
//! every query is a full scan in storage order. Predicates are evaluated by
//! the host.

pub mod args;
pub mod catalog;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod table;
pub mod wintime;

use esent_func::FunctionRegistry;
use tracing::info;

pub use args::{DeclarationArgs, dequote};
pub use catalog::{ColumnDescriptor, IndexDescriptor, TableSchema, introspect};
pub use config::{OversizePolicy, VtabConfig};
pub use cursor::{EsentCursor, MoveStatus};
pub use decode::{TextEncoding, decode};
pub use table::{EsentModule, EsentTable};
pub use wintime::{WintimeFunc, filetime_to_unix};

/// Name the module is registered under.
pub const MODULE_NAME: &str = "esentvtab";

#[must_use]
pub const fn extension_name() -> &'static str {
    "esent"
}

/// Register the scalar functions that accompany the module.
pub fn register_esent_scalars(registry: &mut FunctionRegistry) {
    info!("esent extension: registering scalar functions");
    registry.register_scalar(WintimeFunc);
}
