//! Scan cursor.
//!
//! An [`EsentCursor`] owns one engine record cursor and walks it front to
//! back. [`MoveStatus`] is the only record of where the scan stands:
//! `Positioned` on a record, `EndOfData` past the last one (or before the
//! first filter), or `Error` after a failed move.

use esent_engine::{JetEngine, JetError, JetTable, Movement, Retrieved};
use esent_error::{EsentError, Result};
use esent_func::{ColumnContext, VirtualTableCursor};
use esent_types::{JetColumnType, SqliteValue};
use tracing::{debug, warn};

use crate::catalog::ColumnDescriptor;
use crate::config::OversizePolicy;
use crate::decode::decode;
use crate::table::{EsentTable, engine_error};

/// A size probe plus one read at the reported size.
const MAX_RETRIEVE_ATTEMPTS: usize = 2;

/// Outcome of the cursor's most recent move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    Positioned,
    EndOfData,
    Error,
}

/// A full-scan cursor borrowing its [`EsentTable`].
pub struct EsentCursor<'t, E: JetEngine> {
    table: &'t EsentTable<E>,
    record: Option<E::Table>,
    status: MoveStatus,
    /// 1-based position of the current record.
    position: i64,
    buffer: Vec<u8>,
}

impl<'t, E: JetEngine> EsentCursor<'t, E> {
    /// Open a record cursor on the table.
    ///
    /// # Errors
    ///
    /// An engine error if the table cannot be opened, or a protocol error if
    /// the table has already been torn down.
    pub fn open(table: &'t EsentTable<E>) -> Result<Self> {
        if !table.is_attached() {
            return Err(EsentError::protocol("table has been disconnected"));
        }
        let engine = table.engine();
        let record = engine
            .open_table(table.session(), table.database(), table.table_name())
            .map_err(|e| engine_error(engine, "failed to open JET table", e))?;
        Ok(Self {
            table,
            record: Some(record),
            status: MoveStatus::EndOfData,
            position: 0,
            buffer: Vec::new(),
        })
    }

    #[must_use]
    pub const fn status(&self) -> MoveStatus {
        self.status
    }

    /// Whether there is no current record.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.status != MoveStatus::Positioned
    }

    /// Move to the first record.
    ///
    /// # Errors
    ///
    /// An engine error if the move fails for any reason other than an
    /// empty table; the status becomes `Error`.
    pub fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        self.step(Movement::First)?;
        debug!(table = %self.table.table_name(), status = ?self.status, "rewound");
        Ok(())
    }

    /// Move to the next record. Once at end of data or in error, the
    /// status stays put and no engine call is made.
    ///
    /// # Errors
    ///
    /// An engine error if the move fails; the status becomes `Error`.
    pub fn advance(&mut self) -> Result<()> {
        if self.status != MoveStatus::Positioned {
            return Ok(());
        }
        self.step(Movement::Next)
    }

    fn step(&mut self, movement: Movement) -> Result<()> {
        let record = self.record.as_mut().ok_or(EsentError::NoCurrentRecord)?;
        match record.move_to(movement) {
            Ok(()) => {
                self.status = MoveStatus::Positioned;
                self.position += 1;
                Ok(())
            }
            Err(err) if err.is_no_current_record() => {
                self.status = MoveStatus::EndOfData;
                Ok(())
            }
            Err(err) => {
                self.status = MoveStatus::Error;
                Err(engine_error(self.table.engine(), "failed to move JET cursor", err))
            }
        }
    }

    /// Retrieve and decode column `ordinal` of the current record.
    ///
    /// A failure affects this column only; the cursor stays where it is.
    ///
    /// # Errors
    ///
    /// - [`EsentError::ColumnOutOfRange`] for an ordinal outside the schema.
    /// - [`EsentError::NoCurrentRecord`] when not positioned.
    /// - [`EsentError::UnsupportedColumnType`] for columns declared UNKNOWN.
    /// - [`EsentError::ValueTruncated`] when the value exceeds the buffer
    ///   and the oversize policy is `Error`.
    /// - Engine and decode errors.
    pub fn read_column(&mut self, ordinal: i32) -> Result<SqliteValue> {
        let table = self.table;
        let columns = table.columns();
        let descriptor = usize::try_from(ordinal)
            .ok()
            .and_then(|i| columns.get(i))
            .ok_or(EsentError::ColumnOutOfRange {
                index: ordinal,
                count: columns.len(),
            })?;
        if self.status != MoveStatus::Positioned {
            return Err(EsentError::NoCurrentRecord);
        }
        if !descriptor.mapping().is_decodable() {
            return Err(EsentError::UnsupportedColumnType {
                type_code: descriptor.type_code,
            });
        }
        match self.retrieve(descriptor)? {
            Some(len) => decode(
                descriptor.type_code,
                &self.buffer[..len],
                descriptor.encoding(),
            ),
            None => Ok(SqliteValue::Null),
        }
    }

    /// Fill the buffer with the column's bytes. Returns `None` for a null
    /// column, otherwise the value length.
    fn retrieve(&mut self, descriptor: &ColumnDescriptor) -> Result<Option<usize>> {
        let table = self.table;
        let config = table.config();
        let engine = table.engine();
        let record = self.record.as_mut().ok_or(EsentError::NoCurrentRecord)?;

        let fixed = JetColumnType::from_code(descriptor.type_code)
            .and_then(JetColumnType::fixed_size)
            .unwrap_or(1);
        let mut capacity = match descriptor.max_bytes {
            0 => config.retrieve_buffer_bytes,
            n => n as usize,
        }
        .max(fixed);
        for _ in 0..MAX_RETRIEVE_ATTEMPTS {
            if self.buffer.len() < capacity {
                self.buffer.resize(capacity, 0);
            }
            let got = record
                .retrieve_column(descriptor.column_id, &mut self.buffer[..capacity])
                .map_err(|e| engine_error(engine, "failed to retrieve JET column", e))?;
            let actual = match got {
                Retrieved::Null => return Ok(None),
                Retrieved::Value { actual } if actual <= capacity => return Ok(Some(actual)),
                Retrieved::Value { actual } => actual,
            };
            match config.oversize_policy {
                OversizePolicy::Grow => {
                    debug!(column = %descriptor.name, capacity, actual, "growing retrieve buffer");
                    capacity = actual;
                }
                OversizePolicy::Error => {
                    return Err(EsentError::ValueTruncated {
                        column: descriptor.column_id.0,
                        limit: capacity,
                        actual,
                    });
                }
            }
        }
        // The stored size changed between the probe and the sized read.
        Err(engine_error(
            engine,
            "failed to retrieve JET column",
            JetError::new(JetError::WRN_BUFFER_TRUNCATED),
        ))
    }

    /// 1-based position of the current record in the scan.
    ///
    /// # Errors
    ///
    /// [`EsentError::NoCurrentRecord`] when not positioned.
    pub fn rowid(&self) -> Result<i64> {
        if self.status == MoveStatus::Positioned {
            Ok(self.position)
        } else {
            Err(EsentError::NoCurrentRecord)
        }
    }

    /// Close the record cursor, reporting the engine's close error.
    ///
    /// # Errors
    ///
    /// An engine error if the close fails.
    pub fn close(mut self) -> Result<()> {
        match self.record.take() {
            Some(record) => record
                .close()
                .map_err(|e| engine_error(self.table.engine(), "failed to close JET table", e)),
            None => Ok(()),
        }
    }
}

impl<E: JetEngine> Drop for EsentCursor<'_, E> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            if let Err(err) = record.close() {
                warn!(code = err.code, "failed to close JET table");
            }
        }
    }
}

impl<E: JetEngine> VirtualTableCursor for EsentCursor<'_, E> {
    fn filter(&mut self, _idx_num: i32, _idx_str: Option<&str>, args: &[SqliteValue]) -> Result<()> {
        if !args.is_empty() {
            debug!(ignored = args.len(), "filter arguments ignored");
        }
        self.rewind()
    }

    fn next(&mut self) -> Result<()> {
        self.advance()
    }

    fn eof(&self) -> bool {
        self.at_end()
    }

    fn column(&mut self, ctx: &mut ColumnContext, col: i32) -> Result<()> {
        ctx.set_value(self.read_column(col)?);
        Ok(())
    }

    fn rowid(&self) -> Result<i64> {
        Self::rowid(self)
    }
}
