//! Shared value and type vocabulary.
//!
//! [`SqliteValue`] is what the adapter hands to a host query engine;
//! [`JetColumnType`] and [`lookup`] describe what the legacy engine stores.

pub mod coltyp;
pub mod value;

pub use coltyp::{Affinity, ColumnTypeMapping, JetColumnType, lookup};
pub use value::SqliteValue;
