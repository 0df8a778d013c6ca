//! Catalog introspection.
//!
//! Reads a table's column catalog (sorted by column id) into an ordered list
//! of [`ColumnDescriptor`]s and renders the `CREATE TABLE` statement the host
//! is given. Indexes are enumerated too; they are recorded on the
//! [`TableSchema`] and logged but play no part in planning.

use esent_engine::{CatalogColumn, CatalogIndexColumn, ColumnId, DatabaseId, JetEngine, SessionId};
use esent_error::{EsentError, Result};
use esent_types::{ColumnTypeMapping, lookup};
use tracing::{debug, warn};

use crate::decode::TextEncoding;

/// One declared column, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// 0-based position in the declared schema.
    pub ordinal: usize,
    pub name: String,
    pub column_id: ColumnId,
    pub type_code: u32,
    /// Declared maximum size in bytes, 0 when unbounded.
    pub max_bytes: u32,
    pub codepage: u16,
}

impl ColumnDescriptor {
    #[must_use]
    pub const fn mapping(&self) -> ColumnTypeMapping {
        lookup(self.type_code)
    }

    #[must_use]
    pub const fn encoding(&self) -> TextEncoding {
        TextEncoding::from_codepage(self.codepage)
    }

    fn from_catalog(ordinal: usize, column: CatalogColumn) -> Self {
        Self {
            ordinal,
            name: column.name,
            column_id: column.column_id,
            type_code: column.coltyp,
            max_bytes: column.max_bytes,
            codepage: column.codepage,
        }
    }
}

/// One index and its key columns in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
}

/// Everything introspection learns about a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    /// `CREATE TABLE v(...)` text handed to the host.
    pub sql: String,
}

/// Read the catalogs of `table` and build its schema.
///
/// # Errors
///
/// - [`EsentError::Catalog`] if the column catalog cannot be read.
/// - [`EsentError::EmptySchema`] if the table reports no columns.
pub fn introspect<E: JetEngine>(
    engine: &E,
    session: SessionId,
    database: DatabaseId,
    table: &str,
) -> Result<TableSchema> {
    let mut rows = engine
        .column_catalog(session, database, table)
        .map_err(|err| EsentError::Catalog {
            table: table.to_owned(),
            code: err.code,
            message: engine.error_string(err.code),
        })?;
    rows.sort_by_key(|c| c.column_id);
    if rows.is_empty() {
        return Err(EsentError::EmptySchema {
            table: table.to_owned(),
        });
    }

    let columns: Vec<ColumnDescriptor> = rows
        .into_iter()
        .enumerate()
        .map(|(ordinal, row)| ColumnDescriptor::from_catalog(ordinal, row))
        .collect();
    for column in columns.iter().filter(|c| !c.mapping().is_decodable()) {
        warn!(
            table,
            column = %column.name,
            type_code = column.type_code,
            "column type has no decode rule; declared as UNKNOWN"
        );
    }
    debug!(table, columns = columns.len(), "column catalog read");

    let indexes = match engine.index_catalog(session, database, table) {
        Ok(entries) => group_indexes(entries),
        Err(err) => {
            warn!(table, code = err.code, "failed to enumerate indexes");
            Vec::new()
        }
    };
    for index in &indexes {
        debug!(table, index = %index.name, columns = ?index.columns, "index");
    }

    let sql = schema_sql(&columns);
    Ok(TableSchema {
        table_name: table.to_owned(),
        columns,
        indexes,
        sql,
    })
}

fn group_indexes(mut entries: Vec<CatalogIndexColumn>) -> Vec<IndexDescriptor> {
    entries.sort_by(|a, b| {
        a.index_name
            .cmp(&b.index_name)
            .then(a.position.cmp(&b.position))
    });
    let mut indexes: Vec<IndexDescriptor> = Vec::new();
    for entry in entries {
        match indexes.last_mut() {
            Some(last) if last.name == entry.index_name => last.columns.push(entry.column_name),
            _ => indexes.push(IndexDescriptor {
                name: entry.index_name,
                columns: vec![entry.column_name],
            }),
        }
    }
    indexes
}

/// Render `CREATE TABLE v(<name> <affinity>, ...)`.
#[must_use]
pub fn schema_sql(columns: &[ColumnDescriptor]) -> String {
    let mut sql = String::from("CREATE TABLE v(");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&quote_identifier(&column.name));
        sql.push(' ');
        sql.push_str(column.mapping().affinity.as_sql());
    }
    sql.push(')');
    sql
}

/// Quote `name` unless it is a plain identifier that is not a keyword.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_keyword(name);
    if plain {
        name.to_owned()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn is_keyword(name: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS",
        "ASC", "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE",
        "CAST", "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE",
        "CROSS", "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE",
        "DEFAULT", "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO",
        "DROP", "EACH", "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS",
        "EXPLAIN", "FAIL", "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL",
        "GENERATED", "GLOB", "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN",
        "INDEX", "INDEXED", "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS",
        "ISNULL", "JOIN", "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED",
        "NATURAL", "NO", "NOT", "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR",
        "ORDER", "OTHERS", "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING",
        "PRIMARY", "QUERY", "RAISE", "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX",
        "RELEASE", "RENAME", "REPLACE", "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW",
        "ROWS", "SAVEPOINT", "SELECT", "SET", "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO",
        "TRANSACTION", "TRIGGER", "UNBOUNDED", "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM",
        "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE", "WINDOW", "WITH", "WITHOUT",
    ];
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}
