use crate::error::{Result, SqliteError};

/// Column descriptor read from a record header.
///
/// The serial type fixes a column's kind and byte width before any value
/// bytes are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialType {
    Null,
    Int8,
    Int16,
    Int24,
    Int32,
    Int48,
    Int64,
    Float64,
    Zero,
    One,
    Blob(usize),
    String(usize),
}

impl SerialType {
    pub fn new(code: u64) -> Result<Self> {
        match code {
            0 => Ok(Self::Null),
            1 => Ok(Self::Int8),
            2 => Ok(Self::Int16),
            3 => Ok(Self::Int24),
            4 => Ok(Self::Int32),
            5 => Ok(Self::Int48),
            6 => Ok(Self::Int64),
            7 => Ok(Self::Float64),
            8 => Ok(Self::Zero),
            9 => Ok(Self::One),
            10 | 11 => Err(SqliteError::format(
                "serial type",
                format!("reserved serial type {code}"),
            )),
            _ if code % 2 == 0 => Ok(Self::Blob(((code - 12) / 2) as usize)),
            _ => Ok(Self::String(((code - 13) / 2) as usize)),
        }
    }

    pub fn size(&self) -> usize {
        match *self {
            Self::Null | Self::Zero | Self::One => 0,
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Int32 => 4,
            Self::Int48 => 6,
            Self::Int64 | Self::Float64 => 8,
            Self::Blob(size) | Self::String(size) => size,
        }
    }

    pub fn code(&self) -> u64 {
        match *self {
            Self::Null => 0,
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Int32 => 4,
            Self::Int48 => 5,
            Self::Int64 => 6,
            Self::Float64 => 7,
            Self::Zero => 8,
            Self::One => 9,
            Self::Blob(size) => size as u64 * 2 + 12,
            Self::String(size) => size as u64 * 2 + 13,
        }
    }
}
