//! Legacy storage engine seam.
//!
//! [`JetEngine`] and [`JetTable`] mirror the slice of the JET (ESENT) API the
//! adapter relies on: instance/session/database lifecycle, catalog
//! enumeration, and move/retrieve navigation on a record cursor.
//! [`MemoryEngine`] implements them in-process; [`EsentEngine`] binds the
//! Windows `esent.dll`.

pub mod handles;
pub mod memory;
pub mod traits;
#[cfg(windows)]
pub mod windows;

pub use handles::{
    CatalogColumn, CatalogIndexColumn, ColumnId, DatabaseId, InstanceId, JetError, JetResult,
    Movement, Retrieved, SessionId,
};
pub use memory::{EngineStep, MemoryEngine, MemoryRecordCursor};
pub use traits::{JetEngine, JetTable};
#[cfg(windows)]
pub use windows::{EsentEngine, EsentRecordCursor};
