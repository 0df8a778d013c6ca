//! rusqlite virtual table glue.
//!
//! rusqlite drives the C-level protocol; these wrappers forward each call to
//! the host-independent [`EsentTable`] and [`EsentCursor`]. The engine
//! instance is released when rusqlite drops the boxed table after
//! `xDisconnect` or `xDestroy`.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::os::raw::c_int;

use esent_engine::JetEngine;
use esent_error::EsentError;
use esent_func::{
    ColumnContext, ConstraintOp, IndexConstraint, IndexInfo, IndexOrderBy, VirtualTable,
    VirtualTableCursor,
};
use esent_types::SqliteValue;
use esent_vtab::{EsentCursor, EsentModule, EsentTable};
use rusqlite::ffi;
use rusqlite::vtab::{
    Context, CreateVTab, IndexConstraintOp, IndexInfo as SqliteIndexInfo, VTab, VTabConnection,
    VTabCursor, VTabKind, Values,
};
use tracing::{debug, info};

use crate::convert::{to_sqlite_error, value_from_ref, value_to_sql};

/// `sqlite3_vtab` wrapper around a declared table.
#[repr(C)]
pub struct EsentSqliteTable<E: JetEngine> {
    /// Base class. Must be first.
    base: ffi::sqlite3_vtab,
    inner: EsentTable<E>,
}

impl<E: JetEngine> EsentSqliteTable<E> {
    /// The wrapped table.
    pub fn table(&self) -> &EsentTable<E> {
        &self.inner
    }
}

fn utf8_args<'a>(args: &[&'a [u8]]) -> Result<Vec<&'a str>, EsentError> {
    args.iter()
        .map(|arg| {
            std::str::from_utf8(arg)
                .map_err(|_| EsentError::argument("esentvtab arguments must be valid UTF-8"))
        })
        .collect()
}

fn constraint_op(op: IndexConstraintOp) -> ConstraintOp {
    match op {
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ => ConstraintOp::Eq,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GT => ConstraintOp::Gt,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LE => ConstraintOp::Le,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LT => ConstraintOp::Lt,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GE => ConstraintOp::Ge,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_MATCH => ConstraintOp::Match,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LIKE => ConstraintOp::Like,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GLOB => ConstraintOp::Glob,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_REGEXP => ConstraintOp::Regexp,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_NE => ConstraintOp::Ne,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_ISNOT => ConstraintOp::IsNot,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_ISNOTNULL => ConstraintOp::IsNotNull,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_ISNULL => ConstraintOp::IsNull,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_IS => ConstraintOp::Is,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LIMIT => ConstraintOp::Limit,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_OFFSET => ConstraintOp::Offset,
        _ => ConstraintOp::Other(0),
    }
}

unsafe impl<'vtab, E: JetEngine + 'static> VTab<'vtab> for EsentSqliteTable<E> {
    type Aux = EsentModule<E>;
    type Cursor = EsentSqliteCursor<'vtab, E>;

    fn connect(
        _db: &mut VTabConnection,
        _aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        debug!("xConnect rejected");
        Err(to_sqlite_error(&EsentError::ConnectUnsupported))
    }

    fn best_index(&self, info: &mut SqliteIndexInfo) -> rusqlite::Result<()> {
        let constraints = info
            .constraints()
            .map(|c| IndexConstraint {
                column: c.column(),
                op: constraint_op(c.operator()),
                usable: c.is_usable(),
            })
            .collect();
        let order_by = info
            .order_bys()
            .map(|o| IndexOrderBy {
                column: o.column(),
                desc: o.is_order_by_desc(),
            })
            .collect();
        let mut plan = IndexInfo::new(constraints, order_by);
        self.inner
            .best_index(&mut plan)
            .map_err(|e| to_sqlite_error(&e))?;

        for (i, usage) in plan.constraint_usage.iter().enumerate() {
            let mut target = info.constraint_usage(i);
            target.set_argv_index(usage.argv_index);
            target.set_omit(usage.omit);
        }
        info.set_idx_num(plan.idx_num);
        info.set_order_by_consumed(plan.order_by_consumed);
        info.set_estimated_cost(plan.estimated_cost);
        info.set_estimated_rows(plan.estimated_rows);
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<EsentSqliteCursor<'vtab, E>> {
        let cursor = self.inner.open().map_err(|e| to_sqlite_error(&e))?;
        Ok(EsentSqliteCursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            inner: RefCell::new(cursor),
        })
    }
}

impl<'vtab, E: JetEngine + 'static> CreateVTab<'vtab> for EsentSqliteTable<E> {
    const KIND: VTabKind = VTabKind::Default;

    fn create(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let module = aux.ok_or_else(|| {
            to_sqlite_error(&EsentError::internal("esentvtab registered without engine"))
        })?;
        let args = utf8_args(args).map_err(|e| to_sqlite_error(&e))?;
        let inner = EsentTable::create(module, &args).map_err(|e| to_sqlite_error(&e))?;
        let sql = inner.schema_sql().to_owned();
        Ok((
            sql,
            Self {
                base: ffi::sqlite3_vtab::default(),
                inner,
            },
        ))
    }

    fn destroy(&self) -> rusqlite::Result<()> {
        info!(table = self.inner.table_name(), "esentvtab destroyed");
        Ok(())
    }
}

/// `sqlite3_vtab_cursor` wrapper around a scan cursor.
#[repr(C)]
pub struct EsentSqliteCursor<'vtab, E: JetEngine> {
    /// Base class. Must be first.
    base: ffi::sqlite3_vtab_cursor,
    // Column reads drive the engine cursor but the host hands out `&self`.
    inner: RefCell<EsentCursor<'vtab, E>>,
}

unsafe impl<E: JetEngine> VTabCursor for EsentSqliteCursor<'_, E> {
    fn filter(
        &mut self,
        idx_num: c_int,
        idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let args: Vec<SqliteValue> = args.iter().map(value_from_ref).collect();
        self.inner
            .get_mut()
            .filter(idx_num, idx_str, &args)
            .map_err(|e| to_sqlite_error(&e))
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.inner
            .get_mut()
            .next()
            .map_err(|e| to_sqlite_error(&e))
    }

    fn eof(&self) -> bool {
        // A cursor busy in `column` is on a record.
        self.inner.try_borrow().is_ok_and(|c| c.eof())
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let mut cursor = self
            .inner
            .try_borrow_mut()
            .map_err(|_| to_sqlite_error(&EsentError::internal("cursor re-entered")))?;
        let mut out = ColumnContext::new();
        cursor.column(&mut out, i).map_err(|e| to_sqlite_error(&e))?;
        let value = out.take_value().unwrap_or(SqliteValue::Null);
        ctx.set_result(&value_to_sql(value))
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        let cursor = self
            .inner
            .try_borrow()
            .map_err(|_| to_sqlite_error(&EsentError::internal("cursor re-entered")))?;
        VirtualTableCursor::rowid(&*cursor).map_err(|e| to_sqlite_error(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_op_mapping() {
        assert_eq!(
            constraint_op(IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ),
            ConstraintOp::Eq
        );
        assert_eq!(
            constraint_op(IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LIMIT),
            ConstraintOp::Limit
        );
    }

    #[test]
    fn test_utf8_args() {
        let args: [&[u8]; 2] = [b"esentvtab", b"main"];
        assert_eq!(utf8_args(&args).unwrap(), ["esentvtab", "main"]);
        let bad: [&[u8]; 1] = [&[0xFF, 0xFE]];
        let err = utf8_args(&bad).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }
}
