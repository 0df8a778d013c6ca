//! Declaration arguments.
//!
//! `CREATE VIRTUAL TABLE t USING esentvtab('C:\x.edb', Messages)` reaches the
//! module as five strings: module name, database name, table alias, then the
//! two user arguments, still carrying whatever SQL quoting the user wrote.

use std::path::PathBuf;

use esent_error::{EsentError, Result};

/// Number of strings a well-formed declaration passes.
pub const DECLARATION_ARGC: usize = 5;

const USAGE: &str = "expected 2 arguments: esentvtab('edb_path',edb_table)";

/// Strip one level of SQL quoting.
///
/// A leading `'`, `"`, `` ` `` or `[` opens a quoted string that runs to the
/// matching close character (`]` for `[`). Inside it a doubled close
/// character stands for itself. Input without a leading quote is returned
/// unchanged.
#[must_use]
pub fn dequote(input: &str) -> String {
    let mut chars = input.chars();
    let close = match chars.next() {
        Some('[') => ']',
        Some(q @ ('\'' | '"' | '`')) => q,
        _ => return input.to_owned(),
    };
    let mut out = String::with_capacity(input.len());
    let mut chars = chars.peekable();
    while let Some(c) = chars.next() {
        if c == close {
            if chars.peek() == Some(&close) {
                chars.next();
            } else {
                break;
            }
        }
        out.push(c);
    }
    out
}

/// The parsed, dequoted declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationArgs {
    pub module: String,
    pub schema: String,
    pub alias: String,
    pub edb_path: PathBuf,
    pub edb_table: String,
}

impl DeclarationArgs {
    /// Parse the host's argument list.
    ///
    /// # Errors
    ///
    /// [`EsentError::Argument`] unless exactly [`DECLARATION_ARGC`] strings
    /// are given and both user arguments are non-empty.
    pub fn parse(args: &[&str]) -> Result<Self> {
        let [module, schema, alias, path, table] = args else {
            return Err(EsentError::argument(USAGE));
        };
        let edb_path = dequote(path.trim());
        let edb_table = dequote(table.trim());
        if edb_path.is_empty() || edb_table.is_empty() {
            return Err(EsentError::argument(USAGE));
        }
        Ok(Self {
            module: (*module).to_owned(),
            schema: (*schema).to_owned(),
            alias: (*alias).to_owned(),
            edb_path: PathBuf::from(edb_path),
            edb_table,
        })
    }
}
