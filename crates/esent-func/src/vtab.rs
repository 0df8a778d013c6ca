//! Virtual table and cursor traits.
//!
//! A virtual table exposes an external data source as a SQL table through
//! the create/connect, best-index, open, filter/next/eof/column/rowid, and
//! disconnect/destroy protocol. These traits describe that protocol without
//! tying it to a particular host; bindings adapt them to a real SQL engine.
//!
//! Cursors borrow the table they were opened on, so a table can never be
//! torn down while a cursor over it is still alive.

use esent_error::{EsentError, Result};
use esent_types::SqliteValue;

// ---------------------------------------------------------------------------
// Query planner types
// ---------------------------------------------------------------------------

/// Comparison operator for an index constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    Eq,
    Gt,
    Le,
    Lt,
    Ge,
    Match,
    Like,
    Glob,
    Regexp,
    Ne,
    IsNot,
    IsNotNull,
    IsNull,
    Is,
    Limit,
    Offset,
    /// An operator this crate has no name for.
    Other(u8),
}

/// A single WHERE-clause constraint the planner is considering.
#[derive(Debug, Clone)]
pub struct IndexConstraint {
    /// Column index (0-based; `-1` for rowid).
    pub column: i32,
    pub op: ConstraintOp,
    /// Whether the planner can use this constraint in the current plan.
    pub usable: bool,
}

/// A single ORDER BY term.
#[derive(Debug, Clone)]
pub struct IndexOrderBy {
    pub column: i32,
    pub desc: bool,
}

/// Per-constraint usage set by `best_index`.
#[derive(Debug, Clone, Default)]
pub struct IndexConstraintUsage {
    /// 1-based index into the `args` passed to `filter`; 0 leaves the
    /// constraint to the host.
    pub argv_index: i32,
    /// The table guarantees the constraint, so the host need not re-check.
    pub omit: bool,
}

/// Planner exchange for one candidate plan.
///
/// The host fills `constraints` and `order_by`; the table fills the rest.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub constraints: Vec<IndexConstraint>,
    pub order_by: Vec<IndexOrderBy>,
    pub constraint_usage: Vec<IndexConstraintUsage>,
    pub idx_num: i32,
    pub idx_str: Option<String>,
    pub order_by_consumed: bool,
    /// Estimated cost of the plan (lower is better).
    pub estimated_cost: f64,
    pub estimated_rows: i64,
}

impl IndexInfo {
    #[must_use]
    pub fn new(constraints: Vec<IndexConstraint>, order_by: Vec<IndexOrderBy>) -> Self {
        let usage_len = constraints.len();
        Self {
            constraints,
            order_by,
            constraint_usage: vec![IndexConstraintUsage::default(); usage_len],
            idx_num: 0,
            idx_str: None,
            order_by_consumed: false,
            estimated_cost: 1_000_000.0,
            estimated_rows: 1_000_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Column context
// ---------------------------------------------------------------------------

/// Receives the value produced by [`VirtualTableCursor::column`].
#[derive(Debug, Default)]
pub struct ColumnContext {
    value: Option<SqliteValue>,
}

impl ColumnContext {
    #[must_use]
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn set_value(&mut self, val: SqliteValue) {
        self.value = Some(val);
    }

    /// Take the value out, leaving `None`.
    pub fn take_value(&mut self) -> Option<SqliteValue> {
        self.value.take()
    }
}

// ---------------------------------------------------------------------------
// VirtualTable trait
// ---------------------------------------------------------------------------

/// A virtual table module.
///
/// `Aux` is the module-level state handed to every `create`/`connect`
/// (engine handles, configuration). `args` is the full declaration argument
/// list: module name, database name, table name, then the user arguments.
#[allow(clippy::missing_errors_doc)]
pub trait VirtualTable: Send + Sync {
    /// Module state shared by every table of this module.
    type Aux;

    /// The cursor type, borrowing the table for its whole life.
    type Cursor<'vtab>: VirtualTableCursor
    where
        Self: 'vtab;

    /// Called for `CREATE VIRTUAL TABLE`. Defaults to `connect`.
    fn create(aux: &Self::Aux, args: &[&str]) -> Result<Self>
    where
        Self: Sized,
    {
        Self::connect(aux, args)
    }

    /// Called when a connection re-attaches to an existing declaration.
    fn connect(aux: &Self::Aux, args: &[&str]) -> Result<Self>
    where
        Self: Sized;

    /// The `CREATE TABLE` statement declaring this table's columns.
    fn schema_sql(&self) -> &str;

    /// Inform the planner about costs and constraint usage.
    fn best_index(&self, info: &mut IndexInfo) -> Result<()>;

    /// Open a new scan cursor.
    fn open(&self) -> Result<Self::Cursor<'_>>;

    /// Release the table's resources (opposite of `connect`).
    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called for `DROP TABLE`. Defaults to `disconnect`.
    fn destroy(&mut self) -> Result<()> {
        self.disconnect()
    }

    /// INSERT/UPDATE/DELETE. Defaults to [`EsentError::ReadOnly`].
    fn update(&mut self, _args: &[SqliteValue]) -> Result<Option<i64>> {
        Err(EsentError::ReadOnly)
    }
}

// ---------------------------------------------------------------------------
// VirtualTableCursor trait
// ---------------------------------------------------------------------------

/// A scan over a virtual table.
///
/// 1. [`filter`](Self::filter) starts (or restarts) a scan.
/// 2. While not [`eof`](Self::eof): read [`column`](Self::column) and
///    [`rowid`](Self::rowid), then [`next`](Self::next).
/// 3. The cursor is dropped when the scan is complete.
#[allow(clippy::missing_errors_doc)]
pub trait VirtualTableCursor: Send {
    fn filter(&mut self, idx_num: i32, idx_str: Option<&str>, args: &[SqliteValue]) -> Result<()>;

    fn next(&mut self) -> Result<()>;

    /// Whether the cursor has no current row.
    fn eof(&self) -> bool;

    /// Write column `col` of the current row into `ctx`.
    ///
    /// Takes `&mut self` because producing a value may drive the underlying
    /// storage cursor.
    fn column(&mut self, ctx: &mut ColumnContext, col: i32) -> Result<()>;

    fn rowid(&self) -> Result<i64>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Mock: fixed list of integers, declared by argument count --

    struct Numbers {
        values: Vec<i64>,
        sql: String,
        disconnected: bool,
        destroyed: bool,
    }

    struct NumbersCursor<'a> {
        values: &'a [i64],
        pos: usize,
        started: bool,
    }

    impl VirtualTable for Numbers {
        type Aux = Vec<i64>;
        type Cursor<'vtab> = NumbersCursor<'vtab>;

        fn connect(aux: &Vec<i64>, args: &[&str]) -> Result<Self> {
            if args.len() != 3 {
                return Err(EsentError::argument("numbers takes no arguments"));
            }
            Ok(Self {
                values: aux.clone(),
                sql: "CREATE TABLE x(n INT)".to_owned(),
                disconnected: false,
                destroyed: false,
            })
        }

        fn schema_sql(&self) -> &str {
            &self.sql
        }

        fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
            info.estimated_cost = 10.0;
            info.estimated_rows = 3;
            info.idx_num = 1;
            if info.constraints.first().is_some_and(|c| c.usable) {
                info.constraint_usage[0].argv_index = 1;
                info.constraint_usage[0].omit = true;
            }
            Ok(())
        }

        fn open(&self) -> Result<NumbersCursor<'_>> {
            Ok(NumbersCursor {
                values: &self.values,
                pos: 0,
                started: false,
            })
        }

        fn disconnect(&mut self) -> Result<()> {
            self.disconnected = true;
            Ok(())
        }

        fn destroy(&mut self) -> Result<()> {
            self.destroyed = true;
            self.disconnect()
        }
    }

    impl VirtualTableCursor for NumbersCursor<'_> {
        fn filter(&mut self, _idx_num: i32, _idx_str: Option<&str>, _args: &[SqliteValue]) -> Result<()> {
            self.pos = 0;
            self.started = true;
            Ok(())
        }

        fn next(&mut self) -> Result<()> {
            self.pos += 1;
            Ok(())
        }

        fn eof(&self) -> bool {
            !self.started || self.pos >= self.values.len()
        }

        fn column(&mut self, ctx: &mut ColumnContext, col: i32) -> Result<()> {
            if col != 0 {
                return Err(EsentError::ColumnOutOfRange { index: col, count: 1 });
            }
            let value = self.values.get(self.pos).ok_or(EsentError::NoCurrentRecord)?;
            ctx.set_value(SqliteValue::Integer(*value));
            Ok(())
        }

        fn rowid(&self) -> Result<i64> {
            Ok(i64::try_from(self.pos).unwrap_or(i64::MAX) + 1)
        }
    }

    fn numbers() -> Numbers {
        Numbers::create(&vec![4, 5, 6], &["numbers", "main", "t"]).unwrap()
    }

    #[test]
    fn test_vtab_create_delegates_to_connect() {
        let vtab = numbers();
        assert_eq!(vtab.schema_sql(), "CREATE TABLE x(n INT)");
        let err = Numbers::create(&vec![], &["numbers", "main", "t", "extra"])
            .err()
            .unwrap();
        assert!(matches!(err, EsentError::Argument { .. }));
    }

    #[test]
    fn test_vtab_best_index_populates_info() {
        let vtab = numbers();
        let mut info = IndexInfo::new(
            vec![IndexConstraint {
                column: 0,
                op: ConstraintOp::Gt,
                usable: true,
            }],
            vec![],
        );
        vtab.best_index(&mut info).unwrap();
        assert_eq!(info.idx_num, 1);
        assert!((info.estimated_cost - 10.0).abs() < f64::EPSILON);
        assert_eq!(info.constraint_usage[0].argv_index, 1);
        assert!(info.constraint_usage[0].omit);
    }

    #[test]
    fn test_vtab_cursor_filter_next_eof() {
        let vtab = numbers();
        let mut cursor = vtab.open().unwrap();
        assert!(cursor.eof());
        cursor.filter(0, None, &[]).unwrap();

        let mut rows = Vec::new();
        while !cursor.eof() {
            let mut ctx = ColumnContext::new();
            cursor.column(&mut ctx, 0).unwrap();
            rows.push((cursor.rowid().unwrap(), ctx.take_value().unwrap()));
            cursor.next().unwrap();
        }
        assert_eq!(
            rows,
            [
                (1, SqliteValue::Integer(4)),
                (2, SqliteValue::Integer(5)),
                (3, SqliteValue::Integer(6)),
            ]
        );

        // A second filter restarts the scan.
        cursor.filter(0, None, &[]).unwrap();
        assert!(!cursor.eof());
        assert_eq!(cursor.rowid().unwrap(), 1);
    }

    #[test]
    fn test_vtab_cursor_column_out_of_range() {
        let vtab = numbers();
        let mut cursor = vtab.open().unwrap();
        cursor.filter(0, None, &[]).unwrap();
        let mut ctx = ColumnContext::new();
        let err = cursor.column(&mut ctx, 3).unwrap_err();
        assert!(matches!(err, EsentError::ColumnOutOfRange { index: 3, .. }));
    }

    #[test]
    fn test_vtab_update_readonly_default() {
        let mut vtab = numbers();
        let err = vtab.update(&[SqliteValue::Null]).unwrap_err();
        assert!(matches!(err, EsentError::ReadOnly));
    }

    #[test]
    fn test_vtab_destroy_vs_disconnect() {
        let mut vtab = numbers();
        vtab.disconnect().unwrap();
        assert!(vtab.disconnected && !vtab.destroyed);

        let mut vtab = numbers();
        vtab.destroy().unwrap();
        assert!(vtab.disconnected && vtab.destroyed);
    }

    #[test]
    fn test_column_context_lifecycle() {
        let mut ctx = ColumnContext::new();
        assert!(ctx.take_value().is_none());
        ctx.set_value(SqliteValue::Integer(42));
        assert_eq!(ctx.take_value(), Some(SqliteValue::Integer(42)));
        assert!(ctx.take_value().is_none());
    }

    #[test]
    fn test_index_info_new() {
        let info = IndexInfo::new(
            vec![IndexConstraint {
                column: 1,
                op: ConstraintOp::Eq,
                usable: false,
            }],
            vec![IndexOrderBy {
                column: 0,
                desc: true,
            }],
        );
        assert_eq!(info.constraint_usage.len(), 1);
        assert_eq!(info.idx_num, 0);
        assert!(info.idx_str.is_none());
        assert!(!info.order_by_consumed);
    }
}
