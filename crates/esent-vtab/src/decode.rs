//! Value decoding.
//!
//! Turns the raw bytes the engine hands back for one column into a
//! [`SqliteValue`]. Fixed-width numbers are little-endian. Opaque types
//! (binary, GUID, date/time) pass through untouched. Text is decoded per the
//! column's code page.

use esent_error::{EsentError, Result};
use esent_types::{JetColumnType, SqliteValue};

/// Character width of a text column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Two bytes per code unit (code page 1200, the engine default).
    Utf16Le,
    /// One byte per character, Windows-1252.
    Windows1252,
}

impl TextEncoding {
    /// Encoding used for a column declared with `codepage`.
    #[must_use]
    pub const fn from_codepage(codepage: u16) -> Self {
        match codepage {
            1252 | 20127 => Self::Windows1252,
            _ => Self::Utf16Le,
        }
    }
}

/// Decode `bytes` retrieved from a column of type `type_code`.
///
/// # Errors
///
/// - [`EsentError::UnsupportedColumnType`] for `SLV` and unknown codes.
/// - [`EsentError::MalformedValue`] when a fixed-width field is short.
pub fn decode(type_code: u32, bytes: &[u8], encoding: TextEncoding) -> Result<SqliteValue> {
    let Some(coltyp) = JetColumnType::from_code(type_code) else {
        return Err(EsentError::UnsupportedColumnType { type_code });
    };
    let value = match coltyp {
        JetColumnType::Nil => SqliteValue::Null,
        JetColumnType::Bit => SqliteValue::Integer(i64::from(fixed::<1>(coltyp, bytes)?[0] != 0)),
        JetColumnType::UnsignedByte => SqliteValue::Integer(i64::from(fixed::<1>(coltyp, bytes)?[0])),
        JetColumnType::Short => {
            SqliteValue::Integer(i64::from(i16::from_le_bytes(fixed(coltyp, bytes)?)))
        }
        JetColumnType::UnsignedShort => {
            SqliteValue::Integer(i64::from(u16::from_le_bytes(fixed(coltyp, bytes)?)))
        }
        JetColumnType::Long => {
            SqliteValue::Integer(i64::from(i32::from_le_bytes(fixed(coltyp, bytes)?)))
        }
        JetColumnType::UnsignedLong => {
            SqliteValue::Integer(i64::from(u32::from_le_bytes(fixed(coltyp, bytes)?)))
        }
        // Unsigned 64-bit values are reinterpreted; the host has no wider integer.
        JetColumnType::Currency | JetColumnType::LongLong | JetColumnType::UnsignedLongLong => {
            SqliteValue::Integer(i64::from_le_bytes(fixed(coltyp, bytes)?))
        }
        JetColumnType::IEEESingle => {
            SqliteValue::float_or_null(f64::from(f32::from_le_bytes(fixed(coltyp, bytes)?)))
        }
        JetColumnType::IEEEDouble => {
            SqliteValue::float_or_null(f64::from_le_bytes(fixed(coltyp, bytes)?))
        }
        JetColumnType::DateTime
        | JetColumnType::Binary
        | JetColumnType::LongBinary
        | JetColumnType::GUID => SqliteValue::Blob(bytes.to_vec()),
        JetColumnType::Text | JetColumnType::LongText => {
            SqliteValue::Text(decode_text(bytes, encoding))
        }
        JetColumnType::SLV => return Err(EsentError::UnsupportedColumnType { type_code }),
    };
    Ok(value)
}

fn fixed<const N: usize>(coltyp: JetColumnType, bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|head| <[u8; N]>::try_from(head).ok())
        .ok_or(EsentError::MalformedValue {
            type_name: coltyp.name(),
            expected: N,
            actual: bytes.len(),
        })
}

/// Decode text. A trailing odd byte of a UTF-16 value is dropped and
/// unpaired surrogates become U+FFFD.
#[must_use]
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf16Le => {
            let units = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        TextEncoding::Windows1252 => bytes.iter().map(|&b| windows_1252_char(b)).collect(),
    }
}

/// Code points for 0x80..=0x9F; the rest of Windows-1252 matches Latin-1.
/// Undefined slots map to the C1 control of the same value.
const WINDOWS_1252_HIGH: [u16; 32] = [
    0x20AC, 0x0081, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, //
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0x008D, 0x017D, 0x008F, //
    0x0090, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, //
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x009D, 0x017E, 0x0178,
];

fn windows_1252_char(byte: u8) -> char {
    let code = match byte {
        0x80..=0x9F => u32::from(WINDOWS_1252_HIGH[usize::from(byte - 0x80)]),
        _ => u32::from(byte),
    };
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}
