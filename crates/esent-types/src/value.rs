/// A dynamically-typed relational value.
///
/// This is the shape every decoded legacy-engine column takes before it is
/// handed to the host: NULL, INTEGER, REAL, TEXT, or BLOB.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum SqliteValue {
    /// SQL NULL.
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// A UTF-8 text string.
    Text(String),
    /// A binary large object.
    Blob(Vec<u8>),
}

impl SqliteValue {
    /// Build a REAL value, mapping NaN to NULL the way SQLite does.
    #[must_use]
    pub fn float_or_null(value: f64) -> Self {
        if value.is_nan() {
            Self::Null
        } else {
            Self::Float(value)
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert to an integer following SQLite's coercion rules: NULL and
    /// BLOB give 0, REAL truncates, TEXT parses (as integer, then as real)
    /// and gives 0 when it cannot.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_integer(&self) -> i64 {
        match self {
            Self::Null | Self::Blob(_) => 0,
            Self::Integer(i) => *i,
            Self::Float(f) => *f as i64,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .unwrap_or_else(|_| s.parse::<f64>().map_or(0, |f| f as i64))
            }
        }
    }
}

impl PartialEq for SqliteValue {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => false,
        }
    }
}
