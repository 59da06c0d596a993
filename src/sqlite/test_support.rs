//! In-memory database builders for unit tests.

use super::data_containers::headers::{DB_HEADER_SIZE, DbTextEncoding, test_header};
use super::data_containers::page::{Page, PageType};
use super::data_containers::record::Value;
use super::db::PageReader;
use super::utils::encode_sqlite_varint;
use crate::error::{Result, SqliteError};
use std::collections::HashMap;
use std::rc::Rc;

pub const LEAF_TABLE: u8 = 0x0D;
pub const INTERIOR_TABLE: u8 = 0x05;
pub const LEAF_INDEX: u8 = 0x0A;
pub const INTERIOR_INDEX: u8 = 0x02;

fn int_width(v: i64) -> (u64, usize) {
    match v {
        _ if i8::try_from(v).is_ok() => (1, 1),
        _ if i16::try_from(v).is_ok() => (2, 2),
        _ if (-(1 << 23)..(1 << 23)).contains(&v) => (3, 3),
        _ if i32::try_from(v).is_ok() => (4, 4),
        _ if (-(1 << 47)..(1 << 47)).contains(&v) => (5, 6),
        _ => (6, 8),
    }
}

pub fn record(values: &[Value]) -> Vec<u8> {
    let mut types: Vec<u8> = Vec::new();
    let mut body: Vec<u8> = Vec::new();
    for value in values {
        let code = match value {
            Value::Null => 0,
            Value::Int(v) => {
                let (code, width) = int_width(*v);
                body.extend_from_slice(&v.to_be_bytes()[8 - width..]);
                code
            }
            Value::Float(v) => {
                body.extend_from_slice(&v.to_be_bytes());
                7
            }
            Value::Zero => 8,
            Value::One => 9,
            Value::Blob(bytes) => {
                body.extend_from_slice(bytes);
                bytes.len() as u64 * 2 + 12
            }
            Value::String(s) => {
                body.extend_from_slice(s.as_bytes());
                s.len() as u64 * 2 + 13
            }
        };
        types.extend(encode_sqlite_varint(code));
    }

    // the header length counts its own varint
    let mut header_len = types.len() + 1;
    if encode_sqlite_varint(header_len as u64).len() > 1 {
        header_len += 1;
    }
    let mut out = encode_sqlite_varint(header_len as u64);
    out.extend(types);
    out.extend(body);
    out
}

pub fn leaf_table_cell(row_id: i64, payload: &[u8]) -> Vec<u8> {
    let mut cell = encode_sqlite_varint(payload.len() as u64);
    cell.extend(encode_sqlite_varint(row_id as u64));
    cell.extend_from_slice(payload);
    cell
}

pub fn interior_table_cell(left_child: u32, row_id: i64) -> Vec<u8> {
    let mut cell = left_child.to_be_bytes().to_vec();
    cell.extend(encode_sqlite_varint(row_id as u64));
    cell
}

pub fn leaf_index_cell(payload: &[u8]) -> Vec<u8> {
    let mut cell = encode_sqlite_varint(payload.len() as u64);
    cell.extend_from_slice(payload);
    cell
}

pub fn interior_index_cell(left_child: u32, payload: &[u8]) -> Vec<u8> {
    let mut cell = left_child.to_be_bytes().to_vec();
    cell.extend(leaf_index_cell(payload));
    cell
}

/// Builds a leaf table cell whose payload spills onto overflow pages
/// numbered from `first_overflow`. Returns the cell and the overflow pages.
pub fn spilled_leaf_table_cell(
    row_id: i64,
    payload: &[u8],
    page_size: usize,
    first_overflow: u32,
) -> (Vec<u8>, Vec<Vec<u8>>) {
    let local_len = PageType::LeafTableBTreePage.local_payload_len(payload.len(), page_size);
    assert!(local_len < payload.len(), "payload fits on the page");

    let mut cell = encode_sqlite_varint(payload.len() as u64);
    cell.extend(encode_sqlite_varint(row_id as u64));
    cell.extend_from_slice(&payload[..local_len]);
    cell.extend_from_slice(&first_overflow.to_be_bytes());

    let chunks: Vec<&[u8]> = payload[local_len..].chunks(page_size - 4).collect();
    let overflow = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let next = if i + 1 == chunks.len() {
                0
            } else {
                first_overflow + i as u32 + 1
            };
            let mut page = vec![0_u8; page_size];
            page[..4].copy_from_slice(&next.to_be_bytes());
            page[4..4 + chunk.len()].copy_from_slice(chunk);
            page
        })
        .collect();
    (cell, overflow)
}

/// Lays out one b-tree page. Cells are packed downward from the end of the
/// page so that `cells[0]` ends up with the lowest offset.
pub fn build_page(
    page_size: usize,
    page_number: u32,
    type_byte: u8,
    cells: &[Vec<u8>],
    right_pointer: Option<u32>,
) -> Vec<u8> {
    lay_out_page(page_size, page_number, type_byte, cells, right_pointer, false)
}

/// Lays out one b-tree page the way SQLite fills it: every cell is written
/// below the previous one, so `cells[0]` ends up with the highest offset and
/// offset order is the reverse of key order.
pub fn build_page_descending(
    page_size: usize,
    page_number: u32,
    type_byte: u8,
    cells: &[Vec<u8>],
    right_pointer: Option<u32>,
) -> Vec<u8> {
    lay_out_page(page_size, page_number, type_byte, cells, right_pointer, true)
}

fn lay_out_page(
    page_size: usize,
    page_number: u32,
    type_byte: u8,
    cells: &[Vec<u8>],
    right_pointer: Option<u32>,
    first_cell_highest: bool,
) -> Vec<u8> {
    let mut data = vec![0_u8; page_size];
    let header_start = if page_number == 1 {
        data[..DB_HEADER_SIZE].copy_from_slice(&test_header(page_size as u32).to_bytes());
        DB_HEADER_SIZE
    } else {
        0
    };
    let header_len = if right_pointer.is_some() { 12 } else { 8 };

    let mut content_start = page_size;
    let mut offsets = vec![0_u16; cells.len()];
    let mut order: Vec<usize> = (0..cells.len()).collect();
    if !first_cell_highest {
        order.reverse();
    }
    for i in order {
        let cell = &cells[i];
        content_start -= cell.len();
        data[content_start..content_start + cell.len()].copy_from_slice(cell);
        offsets[i] = content_start as u16;
    }
    let pointer_start = header_start + header_len;
    assert!(
        pointer_start + 2 * cells.len() <= content_start,
        "cells overflow page {page_number}"
    );

    data[header_start] = type_byte;
    data[header_start + 3..header_start + 5].copy_from_slice(&(cells.len() as u16).to_be_bytes());
    data[header_start + 5..header_start + 7].copy_from_slice(&(content_start as u16).to_be_bytes());
    if let Some(right) = right_pointer {
        data[header_start + 8..header_start + 12].copy_from_slice(&right.to_be_bytes());
    }
    for (i, offset) in offsets.iter().enumerate() {
        let at = pointer_start + 2 * i;
        data[at..at + 2].copy_from_slice(&offset.to_be_bytes());
    }
    data
}

/// A page map standing in for an open database file.
#[derive(Debug, Clone)]
pub struct MemoryPages {
    pub page_size: usize,
    pub encoding: DbTextEncoding,
    pages: HashMap<u32, Vec<u8>>,
}

impl MemoryPages {
    pub fn new(page_size: usize) -> MemoryPages {
        MemoryPages {
            page_size,
            encoding: DbTextEncoding::Utf8,
            pages: HashMap::new(),
        }
    }

    pub fn insert(&mut self, page_number: u32, data: Vec<u8>) -> &mut MemoryPages {
        assert_eq!(data.len(), self.page_size);
        self.pages.insert(page_number, data);
        self
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.pages.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }

    /// Writes `rows` as a table b-tree at `root`. A single leaf when the rows
    /// fit in `per_leaf`, otherwise leaves on the pages after `root` under one
    /// interior root. Returns the next unused page number.
    pub fn table_tree(&mut self, root: u32, rows: &[(i64, Vec<Value>)], per_leaf: usize) -> u32 {
        let leaf_cell =
            |(row_id, values): &(i64, Vec<Value>)| leaf_table_cell(*row_id, &record(values));
        if rows.len() <= per_leaf {
            let cells: Vec<Vec<u8>> = rows.iter().map(leaf_cell).collect();
            let page = build_page(self.page_size, root, LEAF_TABLE, &cells, None);
            self.insert(root, page);
            return root + 1;
        }

        let chunks: Vec<&[(i64, Vec<Value>)]> = rows.chunks(per_leaf).collect();
        let mut interior_cells: Vec<Vec<u8>> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let leaf_number = root + 1 + i as u32;
            let cells: Vec<Vec<u8>> = chunk.iter().map(leaf_cell).collect();
            let page = build_page(self.page_size, leaf_number, LEAF_TABLE, &cells, None);
            self.insert(leaf_number, page);
            if i + 1 < chunks.len() {
                let max_row_id = chunk.iter().map(|(row_id, _)| *row_id).max().unwrap_or(0);
                interior_cells.push(interior_table_cell(leaf_number, max_row_id));
            }
        }
        let last_leaf = root + chunks.len() as u32;
        let page = build_page(
            self.page_size,
            root,
            INTERIOR_TABLE,
            &interior_cells,
            Some(last_leaf),
        );
        self.insert(root, page);
        last_leaf + 1
    }

    /// Writes `(key, row id)` entries as an index b-tree at `root`. With more
    /// than `per_leaf` entries, every entry following a full leaf becomes a
    /// divider cell on the interior root.
    pub fn index_tree(&mut self, root: u32, entries: &[(Value, i64)], per_leaf: usize) -> u32 {
        let payload = |(key, row_id): &(Value, i64)| record(&[key.clone(), Value::Int(*row_id)]);

        let mut leaves: Vec<&[(Value, i64)]> = Vec::new();
        let mut dividers: Vec<&(Value, i64)> = Vec::new();
        let mut rest = entries;
        while rest.len() > per_leaf {
            leaves.push(&rest[..per_leaf]);
            dividers.push(&rest[per_leaf]);
            rest = &rest[per_leaf + 1..];
        }
        leaves.push(rest);

        if leaves.len() == 1 {
            let cells: Vec<Vec<u8>> = rest.iter().map(|e| leaf_index_cell(&payload(e))).collect();
            let page = build_page(self.page_size, root, LEAF_INDEX, &cells, None);
            self.insert(root, page);
            return root + 1;
        }

        let mut interior_cells: Vec<Vec<u8>> = Vec::new();
        for (i, leaf) in leaves.iter().enumerate() {
            let leaf_number = root + 1 + i as u32;
            let cells: Vec<Vec<u8>> = leaf.iter().map(|e| leaf_index_cell(&payload(e))).collect();
            let page = build_page(self.page_size, leaf_number, LEAF_INDEX, &cells, None);
            self.insert(leaf_number, page);
            if let Some(divider) = dividers.get(i) {
                interior_cells.push(interior_index_cell(leaf_number, &payload(divider)));
            }
        }
        let last_leaf = root + leaves.len() as u32;
        let page = build_page(
            self.page_size,
            root,
            INTERIOR_INDEX,
            &interior_cells,
            Some(last_leaf),
        );
        self.insert(root, page);
        last_leaf + 1
    }
}

impl PageReader for MemoryPages {
    fn page(&self, page_number: u32) -> Result<Rc<Page>> {
        let data = self.raw_page(page_number)?;
        Ok(Rc::new(Page::decode(&data, page_number, self.page_size)))
    }

    fn raw_page(&self, page_number: u32) -> Result<Vec<u8>> {
        self.pages
            .get(&page_number)
            .cloned()
            .ok_or_else(|| SqliteError::NotFound {
                kind: "page",
                name: page_number.to_string(),
            })
    }

    fn usable_size(&self) -> usize {
        self.page_size
    }

    fn text_encoding(&self) -> DbTextEncoding {
        self.encoding
    }
}

pub fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn schema_row(kind: &str, name: &str, table: &str, root: i64, sql: Option<&str>) -> Vec<Value> {
    vec![
        text(kind),
        text(name),
        text(table),
        Value::Int(root),
        sql.map(text).unwrap_or(Value::Null),
    ]
}

/// Writes the schema table onto page 1 as a single leaf.
pub fn schema_page(pages: &mut MemoryPages, rows: &[Vec<Value>]) {
    let cells: Vec<Vec<u8>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| leaf_table_cell(i as i64 + 1, &record(row)))
        .collect();
    let page = build_page(pages.page_size, 1, LEAF_TABLE, &cells, None);
    pages.insert(1, page);
}
