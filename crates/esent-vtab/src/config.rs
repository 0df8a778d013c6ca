//! Module configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_INSTANCE_NAME: &str = "Unique instance for esentVtab";
/// 1M pages.
pub const DEFAULT_MAX_DATABASE_PAGES: u32 = 1024 * 1024;
pub const DEFAULT_RETRIEVE_BUFFER_BYTES: usize = 4096;
pub const DEFAULT_FULL_SCAN_COST: f64 = 1_000_000.0;
pub const DEFAULT_FULL_SCAN_ROWS: i64 = 1_000_000;

/// What to do when a stored value is larger than the retrieval buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Retrieve again with a buffer of the reported size.
    #[default]
    Grow,
    /// Fail the column with `ValueTruncated`.
    Error,
}

/// Knobs carried in the module's registration data.
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VtabConfig {
    /// Name given to each engine instance.
    pub instance_name: String,
    /// Largest database, in pages, the engine will attach.
    pub max_database_pages: u32,
    /// Initial retrieval buffer for columns with no declared maximum size.
    pub retrieve_buffer_bytes: usize,
    pub oversize_policy: OversizePolicy,
    /// Cost reported for every plan.
    pub full_scan_cost: f64,
    /// Row estimate reported for every plan.
    pub full_scan_rows: i64,
}

impl Default for VtabConfig {
    fn default() -> Self {
        Self {
            instance_name: DEFAULT_INSTANCE_NAME.to_owned(),
            max_database_pages: DEFAULT_MAX_DATABASE_PAGES,
            retrieve_buffer_bytes: DEFAULT_RETRIEVE_BUFFER_BYTES,
            oversize_policy: OversizePolicy::Grow,
            full_scan_cost: DEFAULT_FULL_SCAN_COST,
            full_scan_rows: DEFAULT_FULL_SCAN_ROWS,
        }
    }
}

impl VtabConfig {
    /// Fail instead of growing when a value exceeds the buffer.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.oversize_policy = OversizePolicy::Error;
        self
    }

    #[must_use]
    pub fn with_retrieve_buffer_bytes(mut self, bytes: usize) -> Self {
        self.retrieve_buffer_bytes = bytes.max(1);
        self
    }
}
