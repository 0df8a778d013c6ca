//! Engine handle types, status codes, and catalog rows.

use esent_types::JetColumnType;

/// An engine instance handle (`JET_INSTANCE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub usize);

/// A session handle (`JET_SESID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub usize);

/// An open database handle (`JET_DBID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatabaseId(pub u32);

/// A column identifier (`JET_COLUMNID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

/// Cursor movement requests understood by [`crate::JetTable::move_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    First,
    Next,
}

/// Outcome of a successful column retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieved {
    /// The column holds no value on the current record.
    Null,
    /// The column holds `actual` bytes. When `actual` exceeds the buffer
    /// length only the first `buffer.len()` bytes were written.
    Value { actual: usize },
}

/// A negative engine status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("JET error {code}")]
pub struct JetError {
    pub code: i32,
}

impl JetError {
    pub const NO_CURRENT_RECORD: i32 = -1603;
    pub const OBJECT_NOT_FOUND: i32 = -1305;
    pub const INVALID_TABLE_ID: i32 = -1310;
    pub const COLUMN_NOT_FOUND: i32 = -1507;
    pub const FILE_NOT_FOUND: i32 = -1811;
    pub const INVALID_INSTANCE: i32 = -1115;
    pub const INVALID_SESID: i32 = -1104;
    pub const DATABASE_NOT_FOUND: i32 = -1203;
    pub const NOT_INITIALIZED: i32 = -1029;

    /// Warning: the retrieved column is null.
    pub const WRN_COLUMN_NULL: i32 = 1004;
    /// Warning: the retrieved value was cut to the buffer length.
    pub const WRN_BUFFER_TRUNCATED: i32 = 1006;

    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self { code }
    }

    /// Whether this is the end-of-data condition of a move.
    #[must_use]
    pub const fn is_no_current_record(self) -> bool {
        self.code == Self::NO_CURRENT_RECORD
    }
}

/// Result alias for raw engine calls.
pub type JetResult<T> = std::result::Result<T, JetError>;

/// One row of a table's column catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub column_id: ColumnId,
    pub name: String,
    /// Raw `JET_COLTYP` code. May lie outside the known set.
    pub coltyp: u32,
    /// Declared maximum length in bytes, 0 when unbounded.
    pub max_bytes: u32,
    pub codepage: u16,
}

impl CatalogColumn {
    /// UTF-16LE, the engine's default for text columns.
    pub const CODEPAGE_UNICODE: u16 = 1200;
    /// Western European single-byte text.
    pub const CODEPAGE_WESTERN: u16 = 1252;

    #[must_use]
    pub fn new(column_id: u32, name: impl Into<String>, coltyp: JetColumnType) -> Self {
        Self::with_raw_type(column_id, name, coltyp.code())
    }

    /// A column carrying an arbitrary, possibly unknown, type code.
    #[must_use]
    pub fn with_raw_type(column_id: u32, name: impl Into<String>, coltyp: u32) -> Self {
        Self {
            column_id: ColumnId(column_id),
            name: name.into(),
            coltyp,
            max_bytes: 0,
            codepage: Self::CODEPAGE_UNICODE,
        }
    }

    #[must_use]
    pub const fn with_codepage(mut self, codepage: u16) -> Self {
        self.codepage = codepage;
        self
    }

    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u32) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// One key column of one index, as listed by the index catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIndexColumn {
    pub index_name: String,
    pub column_name: String,
    /// 0-based position of the column within the index key.
    pub position: u32,
    pub coltyp: u32,
}
