//! JET column types and their relational mapping.
//!
//! The legacy engine tags every column with a numeric `JET_COLTYP` code.
//! [`JetColumnType`] is the closed set of codes this adapter knows about, and
//! [`lookup`] is the total mapping from any raw code to a display name and a
//! relational [`Affinity`]. Codes outside the known set map to
//! [`ColumnTypeMapping::UNKNOWN`].

use std::fmt;

/// Legacy engine column type codes (`JET_coltyp*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
#[allow(clippy::upper_case_acronyms)]
pub enum JetColumnType {
    Nil = 0,
    Bit = 1,
    UnsignedByte = 2,
    Short = 3,
    Long = 4,
    Currency = 5,
    IEEESingle = 6,
    IEEEDouble = 7,
    DateTime = 8,
    Binary = 9,
    Text = 10,
    LongBinary = 11,
    LongText = 12,
    SLV = 13,
    UnsignedLong = 14,
    LongLong = 15,
    GUID = 16,
    UnsignedShort = 17,
    UnsignedLongLong = 18,
}

impl JetColumnType {
    /// Every known type, in code order.
    pub const ALL: [Self; 19] = [
        Self::Nil,
        Self::Bit,
        Self::UnsignedByte,
        Self::Short,
        Self::Long,
        Self::Currency,
        Self::IEEESingle,
        Self::IEEEDouble,
        Self::DateTime,
        Self::Binary,
        Self::Text,
        Self::LongBinary,
        Self::LongText,
        Self::SLV,
        Self::UnsignedLong,
        Self::LongLong,
        Self::GUID,
        Self::UnsignedShort,
        Self::UnsignedLongLong,
    ];

    /// Resolve a raw type code. Returns `None` for codes this adapter does
    /// not know.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Nil,
            1 => Self::Bit,
            2 => Self::UnsignedByte,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Currency,
            6 => Self::IEEESingle,
            7 => Self::IEEEDouble,
            8 => Self::DateTime,
            9 => Self::Binary,
            10 => Self::Text,
            11 => Self::LongBinary,
            12 => Self::LongText,
            13 => Self::SLV,
            14 => Self::UnsignedLong,
            15 => Self::LongLong,
            16 => Self::GUID,
            17 => Self::UnsignedShort,
            18 => Self::UnsignedLongLong,
            _ => return None,
        })
    }

    /// The raw `JET_COLTYP` code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// The engine's name for this type (without the `JET_coltyp` prefix).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nil => "Nil",
            Self::Bit => "Bit",
            Self::UnsignedByte => "UnsignedByte",
            Self::Short => "Short",
            Self::Long => "Long",
            Self::Currency => "Currency",
            Self::IEEESingle => "IEEESingle",
            Self::IEEEDouble => "IEEEDouble",
            Self::DateTime => "DateTime",
            Self::Binary => "Binary",
            Self::Text => "Text",
            Self::LongBinary => "LongBinary",
            Self::LongText => "LongText",
            Self::SLV => "SLV",
            Self::UnsignedLong => "UnsignedLong",
            Self::LongLong => "LongLong",
            Self::GUID => "GUID",
            Self::UnsignedShort => "UnsignedShort",
            Self::UnsignedLongLong => "UnsignedLongLong",
        }
    }

    /// The relational affinity a column of this type is declared with.
    #[must_use]
    pub const fn affinity(self) -> Affinity {
        match self {
            Self::Nil => Affinity::Null,
            Self::Bit => Affinity::Boolean,
            Self::UnsignedByte | Self::Short | Self::UnsignedShort => Affinity::SmallInt,
            Self::Long | Self::UnsignedLong => Affinity::Int,
            Self::Currency | Self::LongLong | Self::UnsignedLongLong => Affinity::BigInt,
            Self::IEEESingle => Affinity::Float,
            Self::IEEEDouble => Affinity::Double,
            Self::DateTime => Affinity::DateTime,
            Self::Binary | Self::LongBinary | Self::GUID => Affinity::Blob,
            Self::Text | Self::LongText => Affinity::Text,
            Self::SLV => Affinity::Unknown,
        }
    }

    /// Width in bytes of fixed-size numeric types; `None` for variable-size
    /// and opaque types.
    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Bit | Self::UnsignedByte => Some(1),
            Self::Short | Self::UnsignedShort => Some(2),
            Self::Long | Self::UnsignedLong | Self::IEEESingle => Some(4),
            Self::Currency | Self::LongLong | Self::UnsignedLongLong | Self::IEEEDouble => Some(8),
            _ => None,
        }
    }

    /// The mapping table entry for this type.
    #[must_use]
    pub const fn mapping(self) -> ColumnTypeMapping {
        ColumnTypeMapping {
            code: self.code(),
            name: self.name(),
            affinity: self.affinity(),
        }
    }
}

impl fmt::Display for JetColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relational type a column is declared with in the generated schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Affinity {
    Null,
    Boolean,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    DateTime,
    Blob,
    Text,
    /// No decode rule exists for the column.
    Unknown,
}

impl Affinity {
    /// The type name written into `CREATE TABLE` declarations.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::SmallInt => "SMALLINT",
            Self::Int => "INT",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::DateTime => "DATETIME",
            Self::Blob => "BLOB",
            Self::Text => "TEXT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One entry of the type mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnTypeMapping {
    /// The raw `JET_COLTYP` code (`u32::MAX` for the sentinel).
    pub code: u32,
    /// Engine type name.
    pub name: &'static str,
    /// Declared relational affinity.
    pub affinity: Affinity,
}

impl ColumnTypeMapping {
    /// Sentinel returned for codes with no known entry.
    pub const UNKNOWN: Self = Self {
        code: u32::MAX,
        name: "?",
        affinity: Affinity::Unknown,
    };

    /// Whether the host can decode values of this type.
    #[must_use]
    pub fn is_decodable(&self) -> bool {
        self.affinity != Affinity::Unknown
    }
}

/// Map a raw type code to its mapping table entry.
///
/// Total: unknown codes return [`ColumnTypeMapping::UNKNOWN`].
#[must_use]
pub const fn lookup(code: u32) -> ColumnTypeMapping {
    match JetColumnType::from_code(code) {
        Some(coltyp) => coltyp.mapping(),
        None => ColumnTypeMapping::UNKNOWN,
    }
}
