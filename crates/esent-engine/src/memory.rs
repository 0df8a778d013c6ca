//! In-memory engine.
//!
//! Databases are registered up front by path, populated with tables and
//! rows, and then read through the same [`JetEngine`] calls the adapter
//! issues against the real engine. Every instance, session, and cursor is
//! tracked so callers can assert that teardown released them, and any step
//! can be made to fail with a chosen status code.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::handles::{
    CatalogColumn, CatalogIndexColumn, ColumnId, DatabaseId, InstanceId, JetError, JetResult,
    Movement, Retrieved, SessionId,
};
use crate::traits::{JetEngine, JetTable};

/// Engine entry points that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStep {
    CreateInstance,
    Init,
    BeginSession,
    AttachDatabase,
    OpenDatabase,
    ColumnCatalog,
    IndexCatalog,
    OpenTable,
    Move,
    Retrieve,
}

type Row = Vec<Option<Vec<u8>>>;

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<CatalogColumn>,
    indexes: Vec<CatalogIndexColumn>,
    rows: Arc<Vec<Row>>,
}

#[derive(Debug, Default)]
struct MemoryDatabase {
    tables: HashMap<String, MemoryTable>,
}

#[derive(Debug, Default)]
struct InstanceState {
    name: String,
    initialized: bool,
    attached: Vec<PathBuf>,
}

#[derive(Debug)]
struct SessionState {
    instance: usize,
    open: HashMap<u32, PathBuf>,
}

#[derive(Debug, Default)]
struct MemoryEngineInner {
    databases: HashMap<PathBuf, MemoryDatabase>,
    instances: HashMap<usize, InstanceState>,
    sessions: HashMap<usize, SessionState>,
    failures: HashMap<EngineStep, i32>,
    next_handle: usize,
    next_dbid: u32,
    open_cursors: usize,
}

impl MemoryEngineInner {
    fn check(&self, step: EngineStep) -> JetResult<()> {
        match self.failures.get(&step) {
            Some(&code) => Err(JetError::new(code)),
            None => Ok(()),
        }
    }

    fn session(&self, session: SessionId) -> JetResult<&SessionState> {
        self.sessions
            .get(&session.0)
            .ok_or(JetError::new(JetError::INVALID_SESID))
    }

    fn table(&self, session: SessionId, database: DatabaseId, name: &str) -> JetResult<&MemoryTable> {
        let path = self
            .session(session)?
            .open
            .get(&database.0)
            .ok_or(JetError::new(JetError::DATABASE_NOT_FOUND))?;
        self.databases
            .get(path)
            .and_then(|db| db.tables.get(name))
            .ok_or(JetError::new(JetError::OBJECT_NOT_FOUND))
    }
}

/// A [`JetEngine`] backed by process memory.
///
/// Clones share state, so a test can keep a handle for inspection while the
/// adapter owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<Mutex<MemoryEngineInner>>,
}

impl MemoryEngine {
    /// Create an engine with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty database file at `path`.
    pub fn create_database(&self, path: impl Into<PathBuf>) {
        self.inner.lock().databases.entry(path.into()).or_default();
    }

    /// Create (or replace) a table in the database at `path`, registering
    /// the database if needed.
    pub fn create_table(&self, path: impl AsRef<Path>, table: &str, columns: &[CatalogColumn]) {
        let mut inner = self.inner.lock();
        let db = inner
            .databases
            .entry(path.as_ref().to_path_buf())
            .or_default();
        db.tables.insert(
            table.to_owned(),
            MemoryTable {
                columns: columns.to_vec(),
                ..MemoryTable::default()
            },
        );
    }

    /// Append a record. `values` follow the column order given to
    /// [`MemoryEngine::create_table`]; `None` stores a null.
    ///
    /// # Panics
    ///
    /// Panics if the table does not exist or the value count differs from
    /// the column count.
    pub fn insert_row(&self, path: impl AsRef<Path>, table: &str, values: Row) {
        let mut inner = self.inner.lock();
        let target = inner
            .databases
            .get_mut(path.as_ref())
            .and_then(|db| db.tables.get_mut(table))
            .unwrap_or_else(|| panic!("no table {table} in {}", path.as_ref().display()));
        assert_eq!(values.len(), target.columns.len(), "column count mismatch");
        Arc::make_mut(&mut target.rows).push(values);
    }

    /// Declare an index over `columns` (in key order).
    ///
    /// # Panics
    ///
    /// Panics if the table or one of the columns does not exist.
    pub fn add_index(&self, path: impl AsRef<Path>, table: &str, index: &str, columns: &[&str]) {
        let mut inner = self.inner.lock();
        let target = inner
            .databases
            .get_mut(path.as_ref())
            .and_then(|db| db.tables.get_mut(table))
            .unwrap_or_else(|| panic!("no table {table} in {}", path.as_ref().display()));
        for (position, column_name) in columns.iter().enumerate() {
            let column = target
                .columns
                .iter()
                .find(|c| c.name == *column_name)
                .unwrap_or_else(|| panic!("no column {column_name} in {table}"));
            let entry = CatalogIndexColumn {
                index_name: index.to_owned(),
                column_name: column.name.clone(),
                position: u32::try_from(position).unwrap_or(u32::MAX),
                coltyp: column.coltyp,
            };
            target.indexes.push(entry);
        }
    }

    /// Make every subsequent call of `step` fail with `code`.
    pub fn inject_failure(&self, step: EngineStep, code: i32) {
        self.inner.lock().failures.insert(step, code);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    /// Number of instances created and not yet terminated.
    #[must_use]
    pub fn live_instances(&self) -> usize {
        self.inner.lock().instances.len()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Number of record cursors not yet closed.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.inner.lock().open_cursors
    }

    /// Names of the instances currently alive.
    #[must_use]
    pub fn instance_names(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut names: Vec<String> = inner.instances.values().map(|i| i.name.clone()).collect();
        names.sort();
        names
    }
}

impl JetEngine for MemoryEngine {
    type Table = MemoryRecordCursor;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_instance(&self, name: &str) -> JetResult<InstanceId> {
        let mut inner = self.inner.lock();
        inner.check(EngineStep::CreateInstance)?;
        inner.next_handle += 1;
        let id = inner.next_handle;
        inner.instances.insert(
            id,
            InstanceState {
                name: name.to_owned(),
                ..InstanceState::default()
            },
        );
        debug!(instance = id, name, "memory instance created");
        Ok(InstanceId(id))
    }

    fn init(&self, instance: InstanceId) -> JetResult<()> {
        let mut inner = self.inner.lock();
        inner.check(EngineStep::Init)?;
        let state = inner
            .instances
            .get_mut(&instance.0)
            .ok_or(JetError::new(JetError::INVALID_INSTANCE))?;
        state.initialized = true;
        Ok(())
    }

    fn begin_session(&self, instance: InstanceId) -> JetResult<SessionId> {
        let mut inner = self.inner.lock();
        inner.check(EngineStep::BeginSession)?;
        let state = inner
            .instances
            .get(&instance.0)
            .ok_or(JetError::new(JetError::INVALID_INSTANCE))?;
        if !state.initialized {
            return Err(JetError::new(JetError::NOT_INITIALIZED));
        }
        inner.next_handle += 1;
        let id = inner.next_handle;
        inner.sessions.insert(
            id,
            SessionState {
                instance: instance.0,
                open: HashMap::new(),
            },
        );
        Ok(SessionId(id))
    }

    fn attach_database(
        &self,
        session: SessionId,
        path: &Path,
        _max_pages: u32,
        _read_only: bool,
    ) -> JetResult<()> {
        let mut inner = self.inner.lock();
        inner.check(EngineStep::AttachDatabase)?;
        let instance = inner.session(session)?.instance;
        if !inner.databases.contains_key(path) {
            return Err(JetError::new(JetError::FILE_NOT_FOUND));
        }
        let state = inner
            .instances
            .get_mut(&instance)
            .ok_or(JetError::new(JetError::INVALID_INSTANCE))?;
        if !state.attached.iter().any(|p| p == path) {
            state.attached.push(path.to_path_buf());
        }
        Ok(())
    }

    fn open_database(
        &self,
        session: SessionId,
        path: &Path,
        _read_only: bool,
    ) -> JetResult<DatabaseId> {
        let mut inner = self.inner.lock();
        inner.check(EngineStep::OpenDatabase)?;
        let instance = inner.session(session)?.instance;
        let attached = inner
            .instances
            .get(&instance)
            .is_some_and(|state| state.attached.iter().any(|p| p == path));
        if !attached {
            return Err(JetError::new(JetError::DATABASE_NOT_FOUND));
        }
        inner.next_dbid += 1;
        let dbid = inner.next_dbid;
        inner
            .sessions
            .get_mut(&session.0)
            .ok_or(JetError::new(JetError::INVALID_SESID))?
            .open
            .insert(dbid, path.to_path_buf());
        Ok(DatabaseId(dbid))
    }

    fn column_catalog(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<Vec<CatalogColumn>> {
        let inner = self.inner.lock();
        inner.check(EngineStep::ColumnCatalog)?;
        let mut columns = inner.table(session, database, table)?.columns.clone();
        columns.sort_by_key(|c| c.column_id);
        Ok(columns)
    }

    fn index_catalog(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<Vec<CatalogIndexColumn>> {
        let inner = self.inner.lock();
        inner.check(EngineStep::IndexCatalog)?;
        Ok(inner.table(session, database, table)?.indexes.clone())
    }

    fn open_table(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<MemoryRecordCursor> {
        let mut inner = self.inner.lock();
        inner.check(EngineStep::OpenTable)?;
        let target = inner.table(session, database, table)?;
        let columns = target.columns.iter().map(|c| c.column_id).collect();
        let rows = Arc::clone(&target.rows);
        inner.open_cursors += 1;
        Ok(MemoryRecordCursor {
            engine: Arc::clone(&self.inner),
            columns,
            rows,
            position: Position::BeforeFirst,
            closed: false,
        })
    }

    fn terminate(&self, instance: InstanceId) -> JetResult<()> {
        let mut inner = self.inner.lock();
        if inner.instances.remove(&instance.0).is_some() {
            inner.sessions.retain(|_, s| s.instance != instance.0);
            debug!(instance = instance.0, "memory instance terminated");
        }
        Ok(())
    }

    fn error_string(&self, code: i32) -> Option<String> {
        let text = match code {
            JetError::NO_CURRENT_RECORD => "JET_errNoCurrentRecord, Currency not on a record",
            JetError::OBJECT_NOT_FOUND => "JET_errObjectNotFound, No such table or object",
            JetError::INVALID_TABLE_ID => "JET_errInvalidTableId, Invalid table id",
            JetError::COLUMN_NOT_FOUND => "JET_errColumnNotFound, No such column",
            JetError::FILE_NOT_FOUND => "JET_errFileNotFound, File not found",
            JetError::INVALID_INSTANCE => "JET_errInvalidInstance, Invalid instance handle",
            JetError::INVALID_SESID => "JET_errInvalidSesid, Invalid session handle",
            JetError::DATABASE_NOT_FOUND => "JET_errDatabaseNotFound, No such database",
            JetError::NOT_INITIALIZED => "JET_errNotInitialized, JetInit not yet called",
            _ => return None,
        };
        Some(text.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    AfterLast,
}

/// Record cursor over a snapshot of a [`MemoryEngine`] table.
#[derive(Debug)]
pub struct MemoryRecordCursor {
    engine: Arc<Mutex<MemoryEngineInner>>,
    columns: Vec<ColumnId>,
    rows: Arc<Vec<Row>>,
    position: Position,
    closed: bool,
}

impl MemoryRecordCursor {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut inner = self.engine.lock();
            inner.open_cursors = inner.open_cursors.saturating_sub(1);
        }
    }

    fn land(&mut self, index: usize) -> JetResult<()> {
        if index < self.rows.len() {
            self.position = Position::At(index);
            Ok(())
        } else {
            self.position = Position::AfterLast;
            Err(JetError::new(JetError::NO_CURRENT_RECORD))
        }
    }
}

impl JetTable for MemoryRecordCursor {
    fn move_to(&mut self, movement: Movement) -> JetResult<()> {
        self.engine.lock().check(EngineStep::Move)?;
        match (movement, self.position) {
            (Movement::First, _) | (Movement::Next, Position::BeforeFirst) => self.land(0),
            (Movement::Next, Position::At(i)) => self.land(i + 1),
            (Movement::Next, Position::AfterLast) => self.land(self.rows.len()),
        }
    }

    fn retrieve_column(&mut self, column: ColumnId, buf: &mut [u8]) -> JetResult<Retrieved> {
        self.engine.lock().check(EngineStep::Retrieve)?;
        let Position::At(row) = self.position else {
            return Err(JetError::new(JetError::NO_CURRENT_RECORD));
        };
        let slot = self
            .columns
            .iter()
            .position(|&c| c == column)
            .ok_or(JetError::new(JetError::COLUMN_NOT_FOUND))?;
        match &self.rows[row][slot] {
            None => Ok(Retrieved::Null),
            Some(value) => {
                let n = value.len().min(buf.len());
                buf[..n].copy_from_slice(&value[..n]);
                Ok(Retrieved::Value {
                    actual: value.len(),
                })
            }
        }
    }

    fn close(mut self) -> JetResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryRecordCursor {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use esent_types::JetColumnType;

    use super::*;

    const DB: &str = "C:\\data\\mail.edb";

    fn engine_with_table() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.create_table(
            DB,
            "Messages",
            &[
                CatalogColumn::new(2, "Subject", JetColumnType::Text),
                CatalogColumn::new(1, "Id", JetColumnType::Long),
            ],
        );
        engine.insert_row(
            DB,
            "Messages",
            vec![Some(b"h\0i\0".to_vec()), Some(7_i32.to_le_bytes().to_vec())],
        );
        engine.insert_row(DB, "Messages", vec![None, Some(8_i32.to_le_bytes().to_vec())]);
        engine
    }

    fn open(engine: &MemoryEngine) -> (InstanceId, SessionId, DatabaseId) {
        let instance = engine.create_instance("test").unwrap();
        engine.init(instance).unwrap();
        let session = engine.begin_session(instance).unwrap();
        engine
            .attach_database(session, Path::new(DB), 1024, true)
            .unwrap();
        let db = engine.open_database(session, Path::new(DB), true).unwrap();
        (instance, session, db)
    }

    #[test]
    fn test_catalog_sorted_by_column_id() {
        let engine = engine_with_table();
        let (instance, session, db) = open(&engine);
        let columns = engine.column_catalog(session, db, "Messages").unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Id", "Subject"]);
        engine.terminate(instance).unwrap();
    }

    #[test]
    fn test_scan_and_retrieve() {
        let engine = engine_with_table();
        let (_, session, db) = open(&engine);
        let mut cursor = engine.open_table(session, db, "Messages").unwrap();
        let mut buf = [0_u8; 8];

        cursor.move_to(Movement::First).unwrap();
        assert_eq!(
            cursor.retrieve_column(ColumnId(1), &mut buf).unwrap(),
            Retrieved::Value { actual: 4 }
        );
        assert_eq!(&buf[..4], &7_i32.to_le_bytes());

        cursor.move_to(Movement::Next).unwrap();
        assert_eq!(
            cursor.retrieve_column(ColumnId(2), &mut buf).unwrap(),
            Retrieved::Null
        );

        let err = cursor.move_to(Movement::Next).unwrap_err();
        assert!(err.is_no_current_record());
        let err = cursor.retrieve_column(ColumnId(1), &mut buf).unwrap_err();
        assert!(err.is_no_current_record());

        cursor.move_to(Movement::First).unwrap();
        assert_eq!(
            cursor.retrieve_column(ColumnId(1), &mut buf).unwrap(),
            Retrieved::Value { actual: 4 }
        );
    }

    #[test]
    fn test_retrieve_reports_full_length() {
        let engine = engine_with_table();
        let (_, session, db) = open(&engine);
        let mut cursor = engine.open_table(session, db, "Messages").unwrap();
        cursor.move_to(Movement::First).unwrap();
        let mut small = [0_u8; 2];
        let got = cursor.retrieve_column(ColumnId(2), &mut small).unwrap();
        assert_eq!(got, Retrieved::Value { actual: 4 });
        assert_eq!(small, [b'h', 0]);
    }

    #[test]
    fn test_empty_table_first_is_no_current_record() {
        let engine = MemoryEngine::new();
        engine.create_table(DB, "Empty", &[CatalogColumn::new(1, "a", JetColumnType::Long)]);
        let (_, session, db) = open(&engine);
        let mut cursor = engine.open_table(session, db, "Empty").unwrap();
        assert!(cursor.move_to(Movement::First).unwrap_err().is_no_current_record());
        assert!(cursor.move_to(Movement::Next).unwrap_err().is_no_current_record());
    }

    #[test]
    fn test_lifecycle_errors() {
        let engine = engine_with_table();
        let instance = engine.create_instance("x").unwrap();
        assert_eq!(
            engine.begin_session(instance).unwrap_err().code,
            JetError::NOT_INITIALIZED
        );
        engine.init(instance).unwrap();
        let session = engine.begin_session(instance).unwrap();
        assert_eq!(
            engine
                .attach_database(session, Path::new("missing.edb"), 1, true)
                .unwrap_err()
                .code,
            JetError::FILE_NOT_FOUND
        );
        assert_eq!(
            engine
                .open_database(session, Path::new(DB), true)
                .unwrap_err()
                .code,
            JetError::DATABASE_NOT_FOUND
        );
        engine.terminate(instance).unwrap();
        engine.terminate(instance).unwrap();
        assert_eq!(engine.live_instances(), 0);
        assert_eq!(engine.live_sessions(), 0);
    }

    #[test]
    fn test_unknown_table() {
        let engine = engine_with_table();
        let (_, session, db) = open(&engine);
        assert_eq!(
            engine.column_catalog(session, db, "Nope").unwrap_err().code,
            JetError::OBJECT_NOT_FOUND
        );
    }

    #[test]
    fn test_injected_failure() {
        let engine = engine_with_table();
        engine.inject_failure(EngineStep::Init, -1032);
        let instance = engine.create_instance("x").unwrap();
        assert_eq!(engine.init(instance).unwrap_err().code, -1032);
        engine.clear_failures();
        engine.init(instance).unwrap();
    }

    #[test]
    fn test_cursor_accounting() {
        let engine = engine_with_table();
        let (instance, session, db) = open(&engine);
        let a = engine.open_table(session, db, "Messages").unwrap();
        let b = engine.open_table(session, db, "Messages").unwrap();
        assert_eq!(engine.open_cursors(), 2);
        a.close().unwrap();
        drop(b);
        assert_eq!(engine.open_cursors(), 0);
        assert_eq!(engine.instance_names(), ["test"]);
        engine.terminate(instance).unwrap();
    }

    #[test]
    fn test_index_catalog() {
        let engine = engine_with_table();
        engine.add_index(DB, "Messages", "ix_subject_id", &["Subject", "Id"]);
        let (_, session, db) = open(&engine);
        let idx = engine.index_catalog(session, db, "Messages").unwrap();
        assert_eq!(idx.len(), 2);
        assert_eq!(idx[1].column_name, "Id");
        assert_eq!(idx[1].position, 1);
    }

    #[test]
    fn test_error_string() {
        let engine = MemoryEngine::new();
        assert!(
            engine
                .error_string(JetError::NO_CURRENT_RECORD)
                .unwrap()
                .starts_with("JET_errNoCurrentRecord")
        );
        assert_eq!(engine.error_string(-9999), None);
    }
}
