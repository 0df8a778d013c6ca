use thiserror::Error;

/// Primary error type for the esentvtab adapter.
///
/// Variants are grouped by the [`ErrorKind`] they report: malformed
/// declaration arguments, failing legacy-engine calls, schema/type problems,
/// and host protocol misuse. Every variant also maps onto a SQLite result
/// code through [`EsentError::error_code`] so host bindings can surface it.
#[derive(Error, Debug)]
pub enum EsentError {
    // === Argument Errors ===
    /// The `CREATE VIRTUAL TABLE` argument list is malformed.
    #[error("{detail}")]
    Argument { detail: String },

    // === Engine Errors ===
    /// A legacy-engine call failed.
    ///
    /// `context` names the step that failed; `message` is the engine's own
    /// rendering of `code`, when it has one.
    #[error("{context}: {}", engine_detail(.code, .message))]
    Engine {
        context: String,
        code: i32,
        message: Option<String>,
    },

    // === Schema Errors ===
    /// The column catalog of a table could not be opened or read.
    #[error("failed to read column catalog of '{table}': {}", engine_detail(.code, .message))]
    Catalog {
        table: String,
        code: i32,
        message: Option<String>,
    },

    /// The table reports no columns, so no schema can be declared.
    #[error("table '{table}' has no columns")]
    EmptySchema { table: String },

    /// A column's type code has no decode rule.
    #[error("invalid JET column type: {type_code}")]
    UnsupportedColumnType { type_code: u32 },

    /// A fixed-width field is shorter than its type requires.
    #[error("malformed {type_name} value: expected {expected} bytes, got {actual}")]
    MalformedValue {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A stored value exceeds the retrieval buffer and growing is disabled.
    #[error("value of column {column} truncated: {actual} bytes exceed limit of {limit}")]
    ValueTruncated {
        column: u32,
        limit: usize,
        actual: usize,
    },

    // === Protocol Errors ===
    /// Re-attaching to an existing declaration is not supported.
    #[error("esentvtab: connect is not supported, recreate the virtual table")]
    ConnectUnsupported,

    /// A column was requested while the cursor is not on a record.
    #[error("cursor is not positioned on a record")]
    NoCurrentRecord,

    /// Column ordinal outside the declared schema.
    #[error("column index {index} out of range (table has {count} columns)")]
    ColumnOutOfRange { index: i32, count: usize },

    /// Any other operation invoked outside its valid state.
    #[error("protocol error: {detail}")]
    Protocol { detail: String },

    /// Attempt to write a read-only virtual table.
    #[error("attempt to write a readonly database")]
    ReadOnly,

    // === Internal Errors ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn engine_detail(code: &i32, message: &Option<String>) -> String {
    match message {
        Some(message) => format!("code {code}: {message}"),
        None => format!("code {code}"),
    }
}

/// Error categories of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed declaration arguments.
    Argument,
    /// A failing legacy-engine call.
    Engine,
    /// A column or catalog that cannot be mapped or decoded.
    Schema,
    /// An operation invoked outside its valid state.
    Protocol,
    /// A bug in the adapter itself.
    Internal,
}

/// SQLite result codes used when surfacing errors to a host.
///
/// These match the numeric values from C SQLite's `sqlite3.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Generic error.
    Error = 1,
    /// Internal logic error.
    Internal = 2,
    /// Attempt to write a read-only database.
    ReadOnly = 8,
    /// Not found (unknown opcode or unsupported xConnect).
    NotFound = 12,
    /// String or BLOB exceeds size limit.
    TooBig = 18,
    /// Data type mismatch.
    Mismatch = 20,
    /// Library used incorrectly.
    Misuse = 21,
    /// Parameter or column index out of range.
    Range = 25,
}

impl EsentError {
    /// The error category this variant belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Argument { .. } => ErrorKind::Argument,
            Self::Engine { .. } => ErrorKind::Engine,
            Self::Catalog { .. }
            | Self::EmptySchema { .. }
            | Self::UnsupportedColumnType { .. }
            | Self::MalformedValue { .. }
            | Self::ValueTruncated { .. } => ErrorKind::Schema,
            Self::ConnectUnsupported
            | Self::NoCurrentRecord
            | Self::ColumnOutOfRange { .. }
            | Self::Protocol { .. }
            | Self::ReadOnly => ErrorKind::Protocol,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Map this error to a SQLite result code.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Argument { .. }
            | Self::Engine { .. }
            | Self::Catalog { .. }
            | Self::EmptySchema { .. }
            | Self::UnsupportedColumnType { .. } => ErrorCode::Error,
            Self::MalformedValue { .. } => ErrorCode::Mismatch,
            Self::ValueTruncated { .. } => ErrorCode::TooBig,
            Self::ConnectUnsupported => ErrorCode::NotFound,
            Self::NoCurrentRecord | Self::Protocol { .. } => ErrorCode::Misuse,
            Self::ColumnOutOfRange { .. } => ErrorCode::Range,
            Self::ReadOnly => ErrorCode::ReadOnly,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// The engine's numeric error code, if this error came from the engine.
    #[must_use]
    pub const fn engine_code(&self) -> Option<i32> {
        match self {
            Self::Engine { code, .. } | Self::Catalog { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Create an argument error.
    pub fn argument(detail: impl Into<String>) -> Self {
        Self::Argument {
            detail: detail.into(),
        }
    }

    /// Create an engine error for a failed step.
    pub fn engine(context: impl Into<String>, code: i32, message: Option<String>) -> Self {
        Self::Engine {
            context: context.into(),
            code,
            message,
        }
    }

    /// Create a protocol error.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `EsentError`.
pub type Result<T> = std::result::Result<T, EsentError>;
