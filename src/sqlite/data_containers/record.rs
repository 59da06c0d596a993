use super::headers::DbTextEncoding;
use super::serial_types::SerialType;
use crate::error::{Result, SqliteError};
use crate::sqlite::utils::ByteCursor;
use std::fmt;
use tracing::trace;

/// A single decoded column value.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Zero,
    One,
    Blob(Vec<u8>),
    String(String),
}

impl Value {
    fn read(
        cursor: &mut ByteCursor<'_>,
        serial_type: SerialType,
        encoding: DbTextEncoding,
    ) -> Result<Value> {
        let value = match serial_type {
            SerialType::Null => Value::Null,
            SerialType::Int8
            | SerialType::Int16
            | SerialType::Int24
            | SerialType::Int32
            | SerialType::Int48
            | SerialType::Int64 => Value::Int(cursor.read_signed(serial_type.size())?),
            SerialType::Float64 => Value::Float(cursor.read_f64()?),
            SerialType::Zero => Value::Zero,
            SerialType::One => Value::One,
            SerialType::Blob(len) => Value::Blob(cursor.read_bytes(len)?.to_vec()),
            SerialType::String(len) => Value::String(encoding.decode(cursor.read_bytes(len)?)),
        };
        Ok(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Zero => Some(0),
            Value::One => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => {
                let rendered = v.to_string();
                if v.is_finite() && !rendered.contains(['.', 'e']) {
                    write!(f, "{rendered}.0")
                } else {
                    write!(f, "{rendered}")
                }
            }
            Value::Zero => write!(f, "0"),
            Value::One => write!(f, "1"),
            Value::Blob(bytes) => write!(f, "{}", hex::encode(bytes)),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

/// Record payload decoder.
///
/// The header is read in full first so that every column's kind and width is
/// known before any value bytes are touched. The body is then consumed one row
/// at a time with those column types until it runs out; a payload normally
/// holds exactly one row.
pub struct Record;

impl Record {
    pub fn column_types(payload: &[u8]) -> Result<(Vec<SerialType>, usize)> {
        let mut cursor = ByteCursor::new(payload, "record header");
        let header_len = cursor.read_varint()? as usize;
        if header_len > payload.len() {
            return Err(SqliteError::format(
                "record header",
                format!(
                    "header length {header_len} exceeds payload length {}",
                    payload.len()
                ),
            ));
        }

        let mut column_types: Vec<SerialType> = Vec::new();
        while cursor.position() < header_len {
            let code = cursor.read_varint()?;
            column_types.push(SerialType::new(code)?);
        }
        if cursor.position() != header_len {
            return Err(SqliteError::format(
                "record header",
                format!(
                    "serial types end at byte {}, header declares {header_len}",
                    cursor.position()
                ),
            ));
        }
        Ok((column_types, header_len))
    }

    pub fn decode(payload: &[u8], encoding: DbTextEncoding) -> Result<Vec<Vec<Value>>> {
        let (column_types, header_len) = Record::column_types(payload)?;
        let row_width: usize = column_types.iter().map(SerialType::size).sum();

        let mut cursor = ByteCursor::at(payload, header_len, "record body");
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(1);
        loop {
            let row = column_types
                .iter()
                .map(|serial_type| Value::read(&mut cursor, *serial_type, encoding))
                .collect::<Result<Vec<Value>>>()?;
            rows.push(row);

            // a row of zero width would never advance the cursor
            if row_width == 0 || !cursor.has_remaining() {
                break;
            }
        }
        trace!(columns = column_types.len(), rows = rows.len(), "decoded record");
        Ok(rows)
    }

    /// Decodes a payload expected to hold a single row.
    pub fn decode_row(payload: &[u8], encoding: DbTextEncoding) -> Result<Vec<Value>> {
        let mut rows = Record::decode(payload, encoding)?;
        Ok(if rows.is_empty() {
            Vec::new()
        } else {
            rows.swap_remove(0)
        })
    }
}
