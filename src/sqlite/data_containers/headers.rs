use crate::error::{Result, SqliteError};
use crate::sqlite::utils::ByteCursor;
use std::fmt;
use tracing::debug;

pub const DB_HEADER_SIZE: usize = 100;
pub const MAGIC: &[u8; 16] = b"SQLite format 3\0";
const MAX_PAYLOAD_FRACTION: u8 = 64;
const MIN_PAYLOAD_FRACTION: u8 = 32;
const LEAF_PAYLOAD_FRACTION: u8 = 32;
const MAX_SCHEMA_FORMAT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbTextEncoding {
    Utf8,
    Utf16le,
    Utf16be,
}

impl TryFrom<u32> for DbTextEncoding {
    type Error = SqliteError;
    fn try_from(decoded_value: u32) -> Result<DbTextEncoding> {
        match decoded_value {
            // headers written by some test tooling leave this zeroed
            0_u32 | 1_u32 => Ok(DbTextEncoding::Utf8),
            2_u32 => Ok(DbTextEncoding::Utf16le),
            3_u32 => Ok(DbTextEncoding::Utf16be),
            other => Err(SqliteError::format(
                "header text encoding",
                format!("invalid value {other}"),
            )),
        }
    }
}

impl DbTextEncoding {
    pub fn code(&self) -> u32 {
        match self {
            DbTextEncoding::Utf8 => 1,
            DbTextEncoding::Utf16le => 2,
            DbTextEncoding::Utf16be => 3,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            DbTextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            DbTextEncoding::Utf16le => decode_utf16(bytes, u16::from_le_bytes),
            DbTextEncoding::Utf16be => decode_utf16(bytes, u16::from_be_bytes),
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

impl fmt::Display for DbTextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbTextEncoding::Utf8 => write!(f, "1 (utf8)"),
            DbTextEncoding::Utf16le => write!(f, "2 (utf16le)"),
            DbTextEncoding::Utf16be => write!(f, "3 (utf16be)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormatVersion {
    Legacy,
    Wal,
}

impl FileFormatVersion {
    fn from_byte(value: u8, region: &str) -> Result<FileFormatVersion> {
        match value {
            1 => Ok(FileFormatVersion::Legacy),
            2 => Ok(FileFormatVersion::Wal),
            other => Err(SqliteError::format(region, format!("invalid value {other}"))),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            FileFormatVersion::Legacy => 1,
            FileFormatVersion::Wal => 2,
        }
    }
}

// container for all the database header attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub page_size: u32,
    pub file_format_write_version: FileFormatVersion,
    pub file_format_read_version: FileFormatVersion,
    pub reserved_space: u8,
    pub max_payload_fraction: u8,
    pub min_payload_fraction: u8,
    pub leaf_payload_fraction: u8,
    pub file_change_counter: u32,
    pub size_of_file: u32,
    pub freelist_trunk_page_number: u32,
    pub num_freelist_pages: u32,
    pub schema_cookie: u32,
    pub schema_format_number: u32,
    pub default_page_cache_size: i32,
    pub largest_root_b_tree_number: u32,
    pub text_encoding: DbTextEncoding,
    pub user_version: i32,
    pub incremental_vacuum_mode: u32,
    pub application_id: u32,
    pub reserved: [u8; 20],
    pub version_valid_for: u32,
    pub sqlite_version_number: u32,
}

impl DatabaseHeader {
    pub fn new(buffer: &[u8]) -> Result<DatabaseHeader> {
        let mut cursor = ByteCursor::new(buffer, "database header");

        if cursor.read_bytes(MAGIC.len())? != MAGIC {
            return Err(SqliteError::format(
                "header magic",
                "expected \"SQLite format 3\\0\"",
            ));
        }

        let page_size = match cursor.read_u16()? {
            1 => 65_536,
            raw => raw as u32,
        };
        if !page_size.is_power_of_two() || !(512..=65_536).contains(&page_size) {
            return Err(SqliteError::format(
                "header page size",
                format!("{page_size} is not a power of two between 512 and 65536"),
            ));
        }

        let file_format_write_version =
            FileFormatVersion::from_byte(cursor.read_u8()?, "header write version")?;
        let file_format_read_version =
            FileFormatVersion::from_byte(cursor.read_u8()?, "header read version")?;
        let reserved_space = cursor.read_u8()?;

        let max_payload_fraction = expect_constant(&mut cursor, MAX_PAYLOAD_FRACTION, "max")?;
        let min_payload_fraction = expect_constant(&mut cursor, MIN_PAYLOAD_FRACTION, "min")?;
        let leaf_payload_fraction = expect_constant(&mut cursor, LEAF_PAYLOAD_FRACTION, "leaf")?;

        let file_change_counter = cursor.read_u32()?;
        let size_of_file = cursor.read_u32()?;
        let freelist_trunk_page_number = cursor.read_u32()?;
        let num_freelist_pages = cursor.read_u32()?;
        let schema_cookie = cursor.read_u32()?;

        let schema_format_number = cursor.read_u32()?;
        if schema_format_number > MAX_SCHEMA_FORMAT {
            return Err(SqliteError::format(
                "header schema format",
                format!("invalid value {schema_format_number}"),
            ));
        }

        let default_page_cache_size = cursor.read_u32()? as i32;
        let largest_root_b_tree_number = cursor.read_u32()?;
        let text_encoding = DbTextEncoding::try_from(cursor.read_u32()?)?;
        let user_version = cursor.read_u32()? as i32;
        let incremental_vacuum_mode = cursor.read_u32()?;
        let application_id = cursor.read_u32()?;
        let reserved = cursor.read_array::<20>()?;
        let version_valid_for = cursor.read_u32()?;
        let sqlite_version_number = cursor.read_u32()?;

        let header = DatabaseHeader {
            page_size,
            file_format_write_version,
            file_format_read_version,
            reserved_space,
            max_payload_fraction,
            min_payload_fraction,
            leaf_payload_fraction,
            file_change_counter,
            size_of_file,
            freelist_trunk_page_number,
            num_freelist_pages,
            schema_cookie,
            schema_format_number,
            default_page_cache_size,
            largest_root_b_tree_number,
            text_encoding,
            user_version,
            incremental_vacuum_mode,
            application_id,
            reserved,
            version_valid_for,
            sqlite_version_number,
        };
        debug!(
            page_size = header.page_size,
            page_count = header.size_of_file,
            encoding = ?header.text_encoding,
            "decoded database header"
        );
        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; DB_HEADER_SIZE] {
        let mut out = [0_u8; DB_HEADER_SIZE];
        out[..16].copy_from_slice(MAGIC);
        let raw_page_size = if self.page_size == 65_536 {
            1_u16
        } else {
            self.page_size as u16
        };
        out[16..18].copy_from_slice(&raw_page_size.to_be_bytes());
        out[18] = self.file_format_write_version.code();
        out[19] = self.file_format_read_version.code();
        out[20] = self.reserved_space;
        out[21] = self.max_payload_fraction;
        out[22] = self.min_payload_fraction;
        out[23] = self.leaf_payload_fraction;

        let words: [(usize, u32); 14] = [
            (24, self.file_change_counter),
            (28, self.size_of_file),
            (32, self.freelist_trunk_page_number),
            (36, self.num_freelist_pages),
            (40, self.schema_cookie),
            (44, self.schema_format_number),
            (48, self.default_page_cache_size as u32),
            (52, self.largest_root_b_tree_number),
            (56, self.text_encoding.code()),
            (60, self.user_version as u32),
            (64, self.incremental_vacuum_mode),
            (68, self.application_id),
            (92, self.version_valid_for),
            (96, self.sqlite_version_number),
        ];
        for (offset, word) in words {
            out[offset..offset + 4].copy_from_slice(&word.to_be_bytes());
        }
        out[72..92].copy_from_slice(&self.reserved);
        out
    }

    /// Bytes of each page available to b-tree content.
    pub fn usable_size(&self) -> usize {
        self.page_size as usize - self.reserved_space as usize
    }

    /// The in-header page count is only trustworthy when it was written by a
    /// version that kept it in sync with the change counter.
    pub fn page_count_is_valid(&self) -> bool {
        self.size_of_file != 0 && self.version_valid_for == self.file_change_counter
    }
}

fn expect_constant(cursor: &mut ByteCursor<'_>, expected: u8, which: &str) -> Result<u8> {
    let value = cursor.read_u8()?;
    if value != expected {
        return Err(SqliteError::format(
            format!("header {which} payload fraction"),
            format!("expected {expected}, found {value}"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) fn test_header(page_size: u32) -> DatabaseHeader {
    DatabaseHeader {
        page_size,
        file_format_write_version: FileFormatVersion::Legacy,
        file_format_read_version: FileFormatVersion::Legacy,
        reserved_space: 0,
        max_payload_fraction: MAX_PAYLOAD_FRACTION,
        min_payload_fraction: MIN_PAYLOAD_FRACTION,
        leaf_payload_fraction: LEAF_PAYLOAD_FRACTION,
        file_change_counter: 3,
        size_of_file: 2,
        freelist_trunk_page_number: 0,
        num_freelist_pages: 0,
        schema_cookie: 1,
        schema_format_number: 4,
        default_page_cache_size: 0,
        largest_root_b_tree_number: 0,
        text_encoding: DbTextEncoding::Utf8,
        user_version: 0,
        incremental_vacuum_mode: 0,
        application_id: 0,
        reserved: [0; 20],
        version_valid_for: 3,
        sqlite_version_number: 3_045_000,
    }
}
