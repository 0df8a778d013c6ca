use std::path::Path;

use crate::handles::{
    CatalogColumn, CatalogIndexColumn, ColumnId, DatabaseId, InstanceId, JetResult, Movement,
    Retrieved, SessionId,
};

/// A legacy ISAM engine.
///
/// Models the subset of the JET API needed to read one table: create and
/// initialize an instance, open a session, attach and open a database file
/// read-only, enumerate catalogs, and open record cursors.
///
/// Every call reports failure as the engine's raw status code; callers wrap
/// it with context.
pub trait JetEngine: Send + Sync {
    /// The record cursor type produced by [`JetEngine::open_table`].
    type Table: JetTable;

    /// The name of this engine (e.g. "esent", "memory").
    fn name(&self) -> &'static str;

    /// Create a named instance.
    fn create_instance(&self, name: &str) -> JetResult<InstanceId>;

    /// Initialize a created instance.
    fn init(&self, instance: InstanceId) -> JetResult<()>;

    /// Begin a session on an initialized instance.
    fn begin_session(&self, instance: InstanceId) -> JetResult<SessionId>;

    /// Attach a database file to the session's instance.
    ///
    /// `max_pages` caps the database size the engine will accept.
    fn attach_database(
        &self,
        session: SessionId,
        path: &Path,
        max_pages: u32,
        read_only: bool,
    ) -> JetResult<()>;

    /// Open an attached database.
    fn open_database(
        &self,
        session: SessionId,
        path: &Path,
        read_only: bool,
    ) -> JetResult<DatabaseId>;

    /// List the columns of `table`, sorted by column id.
    fn column_catalog(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<Vec<CatalogColumn>>;

    /// List the key columns of every index on `table`.
    fn index_catalog(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<Vec<CatalogIndexColumn>>;

    /// Open a record cursor on `table`. The cursor starts before the first
    /// record.
    fn open_table(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<Self::Table>;

    /// Terminate an instance, releasing its sessions and databases.
    ///
    /// Terminating an unknown or already-terminated instance is not an error.
    fn terminate(&self, instance: InstanceId) -> JetResult<()>;

    /// The engine's textual rendering of a status code, if it has one.
    fn error_string(&self, code: i32) -> Option<String>;
}

/// A record cursor on an open table.
pub trait JetTable: Send {
    /// Move the cursor. `First` on an empty table, or `Next` past the last
    /// record, yields [`crate::JetError::NO_CURRENT_RECORD`].
    fn move_to(&mut self, movement: Movement) -> JetResult<()>;

    /// Copy the value of `column` on the current record into `buf`.
    ///
    /// Writes at most `buf.len()` bytes and reports the stored length, so a
    /// caller can detect truncation and retry with a larger buffer.
    fn retrieve_column(&mut self, column: ColumnId, buf: &mut [u8]) -> JetResult<Retrieved>;

    /// Close the cursor.
    fn close(self) -> JetResult<()>
    where
        Self: Sized;
}
