use super::headers::DB_HEADER_SIZE;
use crate::error::{Result, SqliteError};
use crate::sqlite::utils::ByteCursor;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PageType {
    InteriorIndexBTreePage,
    InteriorTableBTreePage,
    LeafIndexBTreePage,
    LeafTableBTreePage,
    /// A page whose header or cells could not be decoded. It carries no cells.
    Invalid,
}

impl PageType {
    fn read_page_type(value: u8) -> Option<PageType> {
        match value {
            2_u8 => Some(PageType::InteriorIndexBTreePage),
            5_u8 => Some(PageType::InteriorTableBTreePage),
            10_u8 => Some(PageType::LeafIndexBTreePage),
            13_u8 => Some(PageType::LeafTableBTreePage),
            _ => None,
        }
    }

    pub fn has_right_most_pointer(&self) -> bool {
        matches!(
            self,
            PageType::InteriorIndexBTreePage | PageType::InteriorTableBTreePage
        )
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            PageType::LeafIndexBTreePage | PageType::LeafTableBTreePage
        )
    }

    pub fn header_len(&self) -> usize {
        if self.has_right_most_pointer() { 12 } else { 8 }
    }

    // largest payload kept entirely on the page, see "Cell Payload Overflow Pages"
    fn max_local(&self, usable_size: usize) -> usize {
        match self {
            PageType::LeafTableBTreePage => usable_size - 35,
            _ => (usable_size - 12) * 64 / 255 - 23,
        }
    }

    pub(crate) fn local_payload_len(&self, payload_size: usize, usable_size: usize) -> usize {
        let max_local = self.max_local(usable_size);
        if payload_size <= max_local {
            return payload_size;
        }
        let min_local = (usable_size - 12) * 32 / 255 - 23;
        let surplus = min_local + (payload_size - min_local) % (usable_size - 4);
        if surplus <= max_local { surplus } else { min_local }
    }

    fn parse_payload(&self, cursor: &mut ByteCursor<'_>, usable_size: usize) -> Result<Payload> {
        let total_size = cursor.read_varint()? as usize;
        let local_len = self.local_payload_len(total_size, usable_size);
        let local = cursor.read_bytes(local_len)?.to_vec();
        let overflow_page = if local_len < total_size {
            Some(cursor.read_u32()?)
        } else {
            None
        };
        Ok(Payload {
            total_size,
            local,
            overflow_page,
        })
    }

    fn parse_cell(&self, cursor: &mut ByteCursor<'_>, usable_size: usize) -> Result<Cell> {
        match self {
            PageType::InteriorIndexBTreePage => {
                let left_child = cursor.read_u32()?;
                let payload = self.parse_payload(cursor, usable_size)?;
                Ok(Cell::InteriorIndex {
                    left_child,
                    payload,
                })
            }
            PageType::InteriorTableBTreePage => {
                let left_child = cursor.read_u32()?;
                let row_id = cursor.read_varint()? as i64;
                Ok(Cell::InteriorTable { left_child, row_id })
            }
            PageType::LeafIndexBTreePage => {
                let payload = self.parse_payload(cursor, usable_size)?;
                Ok(Cell::LeafIndex { payload })
            }
            PageType::LeafTableBTreePage => {
                // row id sits between the payload size and the payload
                let total_size = cursor.read_varint()? as usize;
                let row_id = cursor.read_varint()? as i64;
                let local_len = self.local_payload_len(total_size, usable_size);
                let local = cursor.read_bytes(local_len)?.to_vec();
                let overflow_page = if local_len < total_size {
                    Some(cursor.read_u32()?)
                } else {
                    None
                };
                Ok(Cell::LeafTable {
                    row_id,
                    payload: Payload {
                        total_size,
                        local,
                        overflow_page,
                    },
                })
            }
            PageType::Invalid => Err(SqliteError::format(
                "page type",
                "cannot decode a cell on an invalid page",
            )),
        }
    }
}

/// A cell payload: the bytes stored on the page plus, when the payload did
/// not fit, the first page of its overflow chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub total_size: usize,
    pub local: Vec<u8>,
    pub overflow_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    InteriorIndex { left_child: u32, payload: Payload },
    InteriorTable { left_child: u32, row_id: i64 },
    LeafIndex { payload: Payload },
    LeafTable { row_id: i64, payload: Payload },
}

impl Cell {
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Cell::InteriorIndex { payload, .. }
            | Cell::LeafIndex { payload }
            | Cell::LeafTable { payload, .. } => Some(payload),
            Cell::InteriorTable { .. } => None,
        }
    }

    pub fn row_id(&self) -> Option<i64> {
        match self {
            Cell::InteriorTable { row_id, .. } | Cell::LeafTable { row_id, .. } => Some(*row_id),
            _ => None,
        }
    }

    pub fn left_child(&self) -> Option<u32> {
        match self {
            Cell::InteriorIndex { left_child, .. } | Cell::InteriorTable { left_child, .. } => {
                Some(*left_child)
            }
            _ => None,
        }
    }
}

// container for the page header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub first_freeblock: u16,
    pub num_cells: u16,
    /// Start of the cell content area; a stored 0 means 65536.
    pub cell_content_start: u32,
    pub free_bytes: u8,
    pub right_pointer: Option<u32>,
}

impl PageHeader {
    pub fn new(cursor: &mut ByteCursor<'_>) -> Result<PageHeader> {
        let type_byte = cursor.read_u8()?;
        let Some(page_type) = PageType::read_page_type(type_byte) else {
            return Err(SqliteError::format(
                "page type",
                format!("invalid page type byte {type_byte:#04x}"),
            ));
        };
        let first_freeblock = cursor.read_u16()?;
        let num_cells = cursor.read_u16()?;
        let cell_content_start = match cursor.read_u16()? {
            0 => 65_536,
            start => start as u32,
        };
        let free_bytes = cursor.read_u8()?;
        let right_pointer = if page_type.has_right_most_pointer() {
            Some(cursor.read_u32()?)
        } else {
            None
        };
        Ok(PageHeader {
            page_type,
            first_freeblock,
            num_cells,
            cell_content_start,
            free_bytes,
            right_pointer,
        })
    }

    fn invalid() -> PageHeader {
        PageHeader {
            page_type: PageType::Invalid,
            first_freeblock: 0,
            num_cells: 0,
            cell_content_start: 0,
            free_bytes: 0,
            right_pointer: None,
        }
    }

    pub fn len(&self) -> usize {
        self.page_type.header_len()
    }
}

// a decoded b-tree page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub page_header: PageHeader,
    pub cells: Vec<Cell>,
}

impl Page {
    /// Decodes one page's raw bytes.
    ///
    /// Page 1 starts with the database header, so its page header begins 100
    /// bytes in; cell offsets stay relative to the start of the page. A page
    /// that fails to decode comes back as [`PageType::Invalid`] with no cells.
    pub fn decode(data: &[u8], number: u32, usable_size: usize) -> Page {
        match Page::try_decode(data, number, usable_size) {
            Ok(page) => page,
            Err(e) => {
                warn!(page = number, error = %e, "treating undecodable page as empty");
                Page::invalid(number)
            }
        }
    }

    pub fn try_decode(data: &[u8], number: u32, usable_size: usize) -> Result<Page> {
        let db_header_start = if number == 1 { DB_HEADER_SIZE } else { 0 };
        let mut cursor = ByteCursor::at(data, db_header_start, "page header");
        let page_header = PageHeader::new(&mut cursor)?;

        let mut pointer_array: Vec<u16> = Vec::with_capacity(page_header.num_cells.into());
        for _ in 0..page_header.num_cells {
            pointer_array.push(cursor.read_u16()?);
        }
        // offset order, not key order
        pointer_array.sort_unstable();

        let mut cells: Vec<Cell> = Vec::with_capacity(pointer_array.len());
        for offset in pointer_array {
            let mut cell_cursor = ByteCursor::at(data, offset as usize, "cell");
            let cell = page_header
                .page_type
                .parse_cell(&mut cell_cursor, usable_size)
                .map_err(|e| {
                    SqliteError::format(
                        format!("page {number} cell at offset {offset}"),
                        e.to_string(),
                    )
                })?;
            cells.push(cell);
        }
        trace!(
            page = number,
            page_type = ?page_header.page_type,
            cells = cells.len(),
            "decoded page"
        );

        Ok(Page {
            number,
            page_header,
            cells,
        })
    }

    pub fn invalid(number: u32) -> Page {
        Page {
            number,
            page_header: PageHeader::invalid(),
            cells: Vec::new(),
        }
    }

    pub fn page_type(&self) -> PageType {
        self.page_header.page_type
    }

    pub fn right_pointer(&self) -> Option<u32> {
        self.page_header.right_pointer
    }

    pub fn is_valid(&self) -> bool {
        self.page_type() != PageType::Invalid
    }
}
