//! Extension trait surfaces.
//!
//! This crate defines the host-independent shape of a SQL extension:
//! - [`VirtualTable`] / [`VirtualTableCursor`] for table-valued modules
//! - [`ScalarFunction`] for row-level functions
//!
//! plus a [`FunctionRegistry`] that collects scalar functions keyed by
//! `(name, num_args)`. Host bindings walk the registry to install every
//! function on a connection.
#![allow(clippy::unnecessary_literal_bound)]

use std::collections::HashMap;
use std::sync::Arc;

pub mod scalar;
pub mod vtab;

pub use scalar::ScalarFunction;
pub use vtab::{
    ColumnContext, ConstraintOp, IndexConstraint, IndexConstraintUsage, IndexInfo, IndexOrderBy,
    VirtualTable, VirtualTableCursor,
};

/// Lookup key for functions: `(UPPERCASE name, num_args)`.
///
/// `-1` for `num_args` means variadic.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct FunctionKey {
    pub name: String,
    pub num_args: i32,
}

impl FunctionKey {
    /// Create a key with the name canonicalized to uppercase.
    #[must_use]
    pub fn new(name: &str, num_args: i32) -> Self {
        Self {
            name: canonical_name(name),
            num_args,
        }
    }
}

fn canonical_name(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Registry of scalar functions keyed by `(name, num_args)`. Registering a
/// second function under the same case-insensitive key replaces the first.
#[derive(Default)]
pub struct FunctionRegistry {
    scalars: HashMap<FunctionKey, Arc<dyn ScalarFunction>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scalar function. Returns the function previously stored
    /// under the same key, if any.
    pub fn register_scalar<F>(&mut self, function: F) -> Option<Arc<dyn ScalarFunction>>
    where
        F: ScalarFunction + 'static,
    {
        let key = FunctionKey::new(function.name(), function.num_args());
        self.scalars.insert(key, Arc::new(function))
    }

    /// Iterate over every registered scalar function.
    pub fn scalars(&self) -> impl Iterator<Item = &Arc<dyn ScalarFunction>> {
        self.scalars.values()
    }

    /// Number of registered scalar functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }
}
