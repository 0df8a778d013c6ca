//! ESENT binding.
//!
//! Declares the `esent.dll` entry points the adapter calls and wraps them in
//! [`JetEngine`] / [`JetTable`]. Strings cross the boundary through the ANSI
//! (`A`-suffixed) variants of the API.

#![allow(unsafe_code, non_snake_case, non_camel_case_types)]

use std::ffi::{CString, c_char, c_void};
use std::mem;
use std::path::Path;
use std::ptr;

use tracing::{debug, warn};

use crate::handles::{
    CatalogColumn, CatalogIndexColumn, ColumnId, DatabaseId, InstanceId, JetError, JetResult,
    Movement, Retrieved, SessionId,
};
use crate::traits::{JetEngine, JetTable};

type JET_ERR = i32;
type JET_API_PTR = usize;
type JET_INSTANCE = JET_API_PTR;
type JET_SESID = JET_API_PTR;
type JET_TABLEID = JET_API_PTR;
type JET_DBID = u32;
type JET_COLUMNID = u32;
type JET_GRBIT = u32;

const JET_ERR_INVALID_PARAMETER: JET_ERR = -1003;

const JET_BIT_DB_READ_ONLY: JET_GRBIT = 0x0000_0001;
/// `JetOpenTable` grbit. `0x1` there means `JET_bitTableDenyWrite`.
const JET_BIT_TABLE_READ_ONLY: JET_GRBIT = 0x0000_0004;
const JET_COL_INFO_LIST_SORT_COLUMNID: u32 = 7;
const JET_IDX_INFO: u32 = 0;
const JET_PARAM_ERROR_TO_STRING: u32 = 70;

const JET_MOVE_FIRST: i32 = i32::MIN;
const JET_MOVE_NEXT: i32 = 1;

/// `JET_cbNameMost` plus the terminator.
const NAME_BUFFER_BYTES: usize = 65;
const ERROR_STRING_BYTES: usize = 1024;

#[repr(C)]
#[derive(Default)]
struct JET_COLUMNLIST {
    cbStruct: u32,
    tableid: JET_TABLEID,
    cRecord: u32,
    columnidPresentationOrder: JET_COLUMNID,
    columnidcolumnname: JET_COLUMNID,
    columnidcolumnid: JET_COLUMNID,
    columnidcoltyp: JET_COLUMNID,
    columnidCountry: JET_COLUMNID,
    columnidLangid: JET_COLUMNID,
    columnidCp: JET_COLUMNID,
    columnidCollate: JET_COLUMNID,
    columnidcbMax: JET_COLUMNID,
    columnidgrbit: JET_COLUMNID,
    columnidDefault: JET_COLUMNID,
    columnidBaseTableName: JET_COLUMNID,
    columnidBaseColumnName: JET_COLUMNID,
    columnidDefinitionName: JET_COLUMNID,
}

#[repr(C)]
#[derive(Default)]
struct JET_INDEXLIST {
    cbStruct: u32,
    tableid: JET_TABLEID,
    cRecord: u32,
    columnidindexname: JET_COLUMNID,
    columnidgrbitIndex: JET_COLUMNID,
    columnidcKey: JET_COLUMNID,
    columnidcEntry: JET_COLUMNID,
    columnidcPage: JET_COLUMNID,
    columnidcColumn: JET_COLUMNID,
    columnidiColumn: JET_COLUMNID,
    columnidcolumnid: JET_COLUMNID,
    columnidcoltyp: JET_COLUMNID,
    columnidCountry: JET_COLUMNID,
    columnidLangid: JET_COLUMNID,
    columnidCp: JET_COLUMNID,
    columnidCollate: JET_COLUMNID,
    columnidgrbitColumn: JET_COLUMNID,
    columnidcolumnname: JET_COLUMNID,
    columnidLCMapFlags: JET_COLUMNID,
}

#[link(name = "esent")]
unsafe extern "system" {
    fn JetCreateInstanceA(pinstance: *mut JET_INSTANCE, szInstanceName: *const c_char) -> JET_ERR;
    fn JetInit3A(pinstance: *mut JET_INSTANCE, prstInfo: *mut c_void, grbit: JET_GRBIT) -> JET_ERR;
    fn JetTerm2(instance: JET_INSTANCE, grbit: JET_GRBIT) -> JET_ERR;
    fn JetBeginSessionA(
        instance: JET_INSTANCE,
        psesid: *mut JET_SESID,
        szUserName: *const c_char,
        szPassword: *const c_char,
    ) -> JET_ERR;
    fn JetAttachDatabase2A(
        sesid: JET_SESID,
        szFilename: *const c_char,
        cpgDatabaseSizeMax: u32,
        grbit: JET_GRBIT,
    ) -> JET_ERR;
    fn JetOpenDatabaseA(
        sesid: JET_SESID,
        szFilename: *const c_char,
        szConnect: *const c_char,
        pdbid: *mut JET_DBID,
        grbit: JET_GRBIT,
    ) -> JET_ERR;
    fn JetGetColumnInfoA(
        sesid: JET_SESID,
        dbid: JET_DBID,
        szTableName: *const c_char,
        pColumnNameOrId: *const c_char,
        pvResult: *mut c_void,
        cbMax: u32,
        InfoLevel: u32,
    ) -> JET_ERR;
    fn JetGetIndexInfoA(
        sesid: JET_SESID,
        dbid: JET_DBID,
        szTableName: *const c_char,
        szIndexName: *const c_char,
        pvResult: *mut c_void,
        cbResult: u32,
        InfoLevel: u32,
    ) -> JET_ERR;
    fn JetOpenTableA(
        sesid: JET_SESID,
        dbid: JET_DBID,
        szTableName: *const c_char,
        pvParameters: *const c_void,
        cbParameters: u32,
        grbit: JET_GRBIT,
        ptableid: *mut JET_TABLEID,
    ) -> JET_ERR;
    fn JetCloseTable(sesid: JET_SESID, tableid: JET_TABLEID) -> JET_ERR;
    fn JetMove(sesid: JET_SESID, tableid: JET_TABLEID, cRow: i32, grbit: JET_GRBIT) -> JET_ERR;
    fn JetRetrieveColumn(
        sesid: JET_SESID,
        tableid: JET_TABLEID,
        columnid: JET_COLUMNID,
        pvData: *mut c_void,
        cbData: u32,
        pcbActual: *mut u32,
        grbit: JET_GRBIT,
        pretinfo: *mut c_void,
    ) -> JET_ERR;
    fn JetGetSystemParameterA(
        instance: JET_INSTANCE,
        sesid: JET_SESID,
        paramid: u32,
        plParam: *mut JET_API_PTR,
        szParam: *mut c_char,
        cbMax: u32,
    ) -> JET_ERR;
}

/// Map a status to a result. Warnings (positive codes) count as success.
fn check(err: JET_ERR) -> JetResult<()> {
    if err < 0 {
        Err(JetError::new(err))
    } else {
        Ok(())
    }
}

fn c_string(s: &str) -> JetResult<CString> {
    CString::new(s).map_err(|_| JetError::new(JET_ERR_INVALID_PARAMETER))
}

fn c_path(path: &Path) -> JetResult<CString> {
    path.to_str()
        .ok_or(JetError::new(JET_ERR_INVALID_PARAMETER))
        .and_then(c_string)
}

#[allow(clippy::cast_possible_truncation)]
const fn struct_size<T>() -> u32 {
    mem::size_of::<T>() as u32
}

fn name_from_bytes(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Temporary catalog table produced by `JetGetColumnInfo`/`JetGetIndexInfo`.
///
/// Closed on drop.
struct CatalogCursor {
    session: JET_SESID,
    table: JET_TABLEID,
}

impl CatalogCursor {
    fn move_to(&self, movement: i32) -> JetResult<bool> {
        // SAFETY: session and table are live handles owned by this cursor.
        let err = unsafe { JetMove(self.session, self.table, movement, 0) };
        match err {
            JetError::NO_CURRENT_RECORD => Ok(false),
            other => check(other).map(|()| true),
        }
    }

    fn retrieve(&self, column: JET_COLUMNID, buf: &mut [u8]) -> JetResult<usize> {
        let mut actual: u32 = 0;
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        // SAFETY: buf is valid for `len` writable bytes; actual outlives the call.
        let err = unsafe {
            JetRetrieveColumn(
                self.session,
                self.table,
                column,
                buf.as_mut_ptr().cast(),
                len,
                &raw mut actual,
                0,
                ptr::null_mut(),
            )
        };
        check(err)?;
        if err == JetError::WRN_COLUMN_NULL {
            return Ok(0);
        }
        Ok((actual as usize).min(buf.len()))
    }

    fn retrieve_u32(&self, column: JET_COLUMNID) -> JetResult<u32> {
        let mut buf = [0_u8; 4];
        let n = self.retrieve(column, &mut buf)?;
        if n == 2 {
            return Ok(u32::from(u16::from_le_bytes([buf[0], buf[1]])));
        }
        Ok(u32::from_le_bytes(buf))
    }

    fn retrieve_name(&self, column: JET_COLUMNID) -> JetResult<String> {
        let mut buf = [0_u8; NAME_BUFFER_BYTES];
        let n = self.retrieve(column, &mut buf)?;
        Ok(name_from_bytes(&buf[..n]))
    }
}

impl Drop for CatalogCursor {
    fn drop(&mut self) {
        // SAFETY: the temporary table is closed exactly once, here.
        let err = unsafe { JetCloseTable(self.session, self.table) };
        if err < 0 {
            warn!(code = err, "failed to close catalog table");
        }
    }
}

/// The ESENT engine shipped with Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct EsentEngine;

impl EsentEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl JetEngine for EsentEngine {
    type Table = EsentRecordCursor;

    fn name(&self) -> &'static str {
        "esent"
    }

    fn create_instance(&self, name: &str) -> JetResult<InstanceId> {
        let name = c_string(name)?;
        let mut instance: JET_INSTANCE = 0;
        // SAFETY: name is NUL-terminated; instance is a valid out pointer.
        check(unsafe { JetCreateInstanceA(&raw mut instance, name.as_ptr()) })?;
        debug!(instance, "esent instance created");
        Ok(InstanceId(instance))
    }

    fn init(&self, instance: InstanceId) -> JetResult<()> {
        let mut handle: JET_INSTANCE = instance.0;
        // SAFETY: handle is a created instance; no recovery info is passed.
        check(unsafe { JetInit3A(&raw mut handle, ptr::null_mut(), 0) })
    }

    fn begin_session(&self, instance: InstanceId) -> JetResult<SessionId> {
        let mut session: JET_SESID = 0;
        // SAFETY: empty user name and password are NUL-terminated literals.
        check(unsafe {
            JetBeginSessionA(
                instance.0,
                &raw mut session,
                c"".as_ptr(),
                c"".as_ptr(),
            )
        })?;
        Ok(SessionId(session))
    }

    fn attach_database(
        &self,
        session: SessionId,
        path: &Path,
        max_pages: u32,
        read_only: bool,
    ) -> JetResult<()> {
        let path = c_path(path)?;
        let grbit = if read_only { JET_BIT_DB_READ_ONLY } else { 0 };
        // SAFETY: path is NUL-terminated and outlives the call.
        check(unsafe { JetAttachDatabase2A(session.0, path.as_ptr(), max_pages, grbit) })
    }

    fn open_database(
        &self,
        session: SessionId,
        path: &Path,
        read_only: bool,
    ) -> JetResult<DatabaseId> {
        let path = c_path(path)?;
        let grbit = if read_only { JET_BIT_DB_READ_ONLY } else { 0 };
        let mut dbid: JET_DBID = 0;
        // SAFETY: path is NUL-terminated; dbid is a valid out pointer.
        check(unsafe {
            JetOpenDatabaseA(session.0, path.as_ptr(), ptr::null(), &raw mut dbid, grbit)
        })?;
        Ok(DatabaseId(dbid))
    }

    fn column_catalog(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<Vec<CatalogColumn>> {
        let table = c_string(table)?;
        let mut list = JET_COLUMNLIST {
            cbStruct: struct_size::<JET_COLUMNLIST>(),
            ..JET_COLUMNLIST::default()
        };
        // SAFETY: list is a correctly sized JET_COLUMNLIST and cbStruct says so.
        check(unsafe {
            JetGetColumnInfoA(
                session.0,
                database.0,
                table.as_ptr(),
                ptr::null(),
                (&raw mut list).cast(),
                struct_size::<JET_COLUMNLIST>(),
                JET_COL_INFO_LIST_SORT_COLUMNID,
            )
        })?;
        let cursor = CatalogCursor {
            session: session.0,
            table: list.tableid,
        };

        let mut columns = Vec::with_capacity(list.cRecord as usize);
        let mut more = cursor.move_to(JET_MOVE_FIRST)?;
        while more {
            let column_id = cursor.retrieve_u32(list.columnidcolumnid)?;
            let name = cursor.retrieve_name(list.columnidcolumnname)?;
            let coltyp = cursor.retrieve_u32(list.columnidcoltyp)?;
            let max_bytes = cursor.retrieve_u32(list.columnidcbMax)?;
            let codepage = u16::try_from(cursor.retrieve_u32(list.columnidCp)?).unwrap_or(0);
            columns.push(
                CatalogColumn::with_raw_type(column_id, name, coltyp)
                    .with_max_bytes(max_bytes)
                    .with_codepage(codepage),
            );
            more = cursor.move_to(JET_MOVE_NEXT)?;
        }
        Ok(columns)
    }

    fn index_catalog(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<Vec<CatalogIndexColumn>> {
        let table = c_string(table)?;
        let mut list = JET_INDEXLIST {
            cbStruct: struct_size::<JET_INDEXLIST>(),
            ..JET_INDEXLIST::default()
        };
        // SAFETY: list is a correctly sized JET_INDEXLIST and cbStruct says so.
        check(unsafe {
            JetGetIndexInfoA(
                session.0,
                database.0,
                table.as_ptr(),
                ptr::null(),
                (&raw mut list).cast(),
                struct_size::<JET_INDEXLIST>(),
                JET_IDX_INFO,
            )
        })?;
        let cursor = CatalogCursor {
            session: session.0,
            table: list.tableid,
        };

        let mut entries = Vec::with_capacity(list.cRecord as usize);
        let mut more = cursor.move_to(JET_MOVE_FIRST)?;
        while more {
            entries.push(CatalogIndexColumn {
                index_name: cursor.retrieve_name(list.columnidindexname)?,
                column_name: cursor.retrieve_name(list.columnidcolumnname)?,
                position: cursor.retrieve_u32(list.columnidiColumn)?,
                coltyp: cursor.retrieve_u32(list.columnidcoltyp)?,
            });
            more = cursor.move_to(JET_MOVE_NEXT)?;
        }
        Ok(entries)
    }

    fn open_table(
        &self,
        session: SessionId,
        database: DatabaseId,
        table: &str,
    ) -> JetResult<EsentRecordCursor> {
        let table = c_string(table)?;
        let mut tableid: JET_TABLEID = 0;
        // SAFETY: table is NUL-terminated; tableid is a valid out pointer.
        check(unsafe {
            JetOpenTableA(
                session.0,
                database.0,
                table.as_ptr(),
                ptr::null(),
                0,
                JET_BIT_TABLE_READ_ONLY,
                &raw mut tableid,
            )
        })?;
        Ok(EsentRecordCursor {
            session: session.0,
            table: tableid,
            closed: false,
        })
    }

    fn terminate(&self, instance: InstanceId) -> JetResult<()> {
        // SAFETY: terminating releases every session and database of the
        // instance; the handle is not used afterwards.
        check(unsafe { JetTerm2(instance.0, 0) })?;
        debug!(instance = instance.0, "esent instance terminated");
        Ok(())
    }

    fn error_string(&self, code: i32) -> Option<String> {
        // The code travels in and out through plParam as a sign-extended pointer.
        #[allow(clippy::cast_sign_loss)]
        let mut param = code as isize as JET_API_PTR;
        let mut buf = [0_u8; ERROR_STRING_BYTES];
        // SAFETY: buf is valid for ERROR_STRING_BYTES writable bytes.
        let err = unsafe {
            JetGetSystemParameterA(
                0,
                0,
                JET_PARAM_ERROR_TO_STRING,
                &raw mut param,
                buf.as_mut_ptr().cast(),
                struct_size::<[u8; ERROR_STRING_BYTES]>(),
            )
        };
        if err < 0 {
            return None;
        }
        let text = name_from_bytes(&buf);
        (!text.is_empty()).then_some(text)
    }
}

/// Record cursor on an ESENT table. Closed on drop if not closed explicitly.
#[derive(Debug)]
pub struct EsentRecordCursor {
    session: JET_SESID,
    table: JET_TABLEID,
    closed: bool,
}

impl EsentRecordCursor {
    fn close_inner(&mut self) -> JetResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // SAFETY: the table id is live until this single close.
        check(unsafe { JetCloseTable(self.session, self.table) })
    }
}

impl JetTable for EsentRecordCursor {
    fn move_to(&mut self, movement: Movement) -> JetResult<()> {
        let rows = match movement {
            Movement::First => JET_MOVE_FIRST,
            Movement::Next => JET_MOVE_NEXT,
        };
        // SAFETY: session and table are live handles.
        check(unsafe { JetMove(self.session, self.table, rows, 0) })
    }

    fn retrieve_column(&mut self, column: ColumnId, buf: &mut [u8]) -> JetResult<Retrieved> {
        let mut actual: u32 = 0;
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        // SAFETY: buf is valid for `len` writable bytes; actual outlives the call.
        let err = unsafe {
            JetRetrieveColumn(
                self.session,
                self.table,
                column.0,
                buf.as_mut_ptr().cast(),
                len,
                &raw mut actual,
                0,
                ptr::null_mut(),
            )
        };
        check(err)?;
        if err == JetError::WRN_COLUMN_NULL {
            return Ok(Retrieved::Null);
        }
        Ok(Retrieved::Value {
            actual: actual as usize,
        })
    }

    fn close(mut self) -> JetResult<()> {
        self.close_inner()
    }
}

impl Drop for EsentRecordCursor {
    fn drop(&mut self) {
        if let Err(err) = self.close_inner() {
            warn!(code = err.code, "failed to close esent table");
        }
    }
}
