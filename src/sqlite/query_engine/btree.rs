use crate::error::{Result, SqliteError};
use crate::sqlite::data_containers::page::{Cell, PageType, Payload};
use crate::sqlite::data_containers::record::{Record, Value};
use crate::sqlite::db::PageReader;
use crate::sqlite::utils::ByteCursor;
use tracing::trace;

/// Deepest tree the walkers will descend before treating the file as corrupt.
pub const MAX_TREE_DEPTH: usize = 64;

/// One decoded leaf row. Index rows carry no row id.
#[derive(Debug, Clone, PartialEq)]
pub struct BtreeRow {
    pub row_id: Option<i64>,
    pub values: Vec<Value>,
}

impl BtreeRow {
    // tables declaring `id integer primary key` store NULL in that column
    fn fill_id_slot(&mut self, id_slot: Option<usize>) {
        let (Some(slot), Some(row_id)) = (id_slot, self.row_id) else {
            return;
        };
        if self.values.len() <= slot {
            self.values.resize(slot + 1, Value::Null);
        }
        if self.values[slot].is_null() {
            self.values[slot] = Value::Int(row_id);
        }
    }
}

fn check_depth(page_number: u32, depth: usize) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        return Err(SqliteError::format(
            format!("b-tree at page {page_number}"),
            format!("deeper than {MAX_TREE_DEPTH} levels"),
        ));
    }
    Ok(())
}

/// Joins a cell's local payload with its overflow chain.
pub fn assemble_payload<R: PageReader + ?Sized>(reader: &R, payload: &Payload) -> Result<Vec<u8>> {
    let Some(first_overflow) = payload.overflow_page else {
        return Ok(payload.local.clone());
    };

    let content_per_page = reader.usable_size() - 4;
    let mut assembled: Vec<u8> = Vec::with_capacity(payload.total_size);
    assembled.extend_from_slice(&payload.local);

    let mut next_page = first_overflow;
    while assembled.len() < payload.total_size {
        if next_page == 0 {
            return Err(SqliteError::format(
                "overflow chain",
                format!(
                    "ended after {} of {} payload bytes",
                    assembled.len(),
                    payload.total_size
                ),
            ));
        }
        let data = reader.raw_page(next_page)?;
        let mut cursor = ByteCursor::new(&data, "overflow page");
        let following = cursor.read_u32()?;
        let take = content_per_page.min(payload.total_size - assembled.len());
        assembled.extend_from_slice(cursor.read_bytes(take)?);
        trace!(page = next_page, bytes = take, "read overflow page");
        next_page = following;
    }
    Ok(assembled)
}

fn decode_cell<R: PageReader + ?Sized>(reader: &R, cell: &Cell) -> Result<Vec<Vec<Value>>> {
    let Some(payload) = cell.payload() else {
        return Ok(Vec::new());
    };
    let bytes = assemble_payload(reader, payload)?;
    Record::decode(&bytes, reader.text_encoding())
}

/// Visits every row of the tree rooted at `root` in page order: a cell's left
/// child before the cell itself, the right-most child last. This is not key
/// order for index trees.
///
/// For table trees, `id_slot` names the column that aliases the row id; it
/// is filled from the cell's row id when the stored value is NULL.
pub fn full_scan<R: PageReader + ?Sized>(
    reader: &R,
    root: u32,
    id_slot: Option<usize>,
    visit: &mut dyn FnMut(BtreeRow) -> Result<()>,
) -> Result<()> {
    scan_page(reader, root, id_slot, visit, 0)
}

fn scan_page<R: PageReader + ?Sized>(
    reader: &R,
    page_number: u32,
    id_slot: Option<usize>,
    visit: &mut dyn FnMut(BtreeRow) -> Result<()>,
    depth: usize,
) -> Result<()> {
    check_depth(page_number, depth)?;
    let page = reader.page(page_number)?;

    for cell in &page.cells {
        if let Some(child) = cell.left_child() {
            scan_page(reader, child, id_slot, visit, depth + 1)?;
        }
        for values in decode_cell(reader, cell)? {
            let mut row = BtreeRow {
                row_id: cell.row_id(),
                values,
            };
            row.fill_id_slot(id_slot);
            visit(row)?;
        }
    }

    if let Some(right) = page.right_pointer() {
        scan_page(reader, right, id_slot, visit, depth + 1)?;
    }
    Ok(())
}

/// Descends a table tree to the leaf holding `row_id`. A miss is `Ok(None)`.
pub fn find_row_by_id<R: PageReader + ?Sized>(
    reader: &R,
    root: u32,
    row_id: i64,
    id_slot: Option<usize>,
) -> Result<Option<BtreeRow>> {
    find_in_page(reader, root, row_id, id_slot, 0)
}

fn find_in_page<R: PageReader + ?Sized>(
    reader: &R,
    page_number: u32,
    row_id: i64,
    id_slot: Option<usize>,
    depth: usize,
) -> Result<Option<BtreeRow>> {
    check_depth(page_number, depth)?;
    let page = reader.page(page_number)?;

    match page.page_type() {
        PageType::InteriorTableBTreePage => {
            let mut descended = false;
            for cell in &page.cells {
                let Cell::InteriorTable { left_child, row_id: key } = cell else {
                    continue;
                };
                if row_id <= *key {
                    descended = true;
                    let found = find_in_page(reader, *left_child, row_id, id_slot, depth + 1)?;
                    if let Some(row) = found {
                        return Ok(Some(row));
                    }
                }
            }
            match page.right_pointer() {
                Some(right) if !descended => {
                    find_in_page(reader, right, row_id, id_slot, depth + 1)
                }
                _ => Ok(None),
            }
        }
        PageType::LeafTableBTreePage => {
            let Some(cell) = page.cells.iter().find(|c| c.row_id() == Some(row_id)) else {
                return Ok(None);
            };
            let mut row = BtreeRow {
                row_id: Some(row_id),
                values: decode_cell(reader, cell)?.into_iter().next().unwrap_or_default(),
            };
            row.fill_id_slot(id_slot);
            Ok(Some(row))
        }
        // index pages and undecodable pages hold no table rows
        _ => Ok(None),
    }
}

/// Collects the row ids of every index entry whose key is the text `key`.
///
/// The whole tree is walked: equal keys may sit in several cells across
/// pages, including interior cells.
pub fn find_row_ids_by_key<R: PageReader + ?Sized>(
    reader: &R,
    root: u32,
    key: &str,
) -> Result<Vec<i64>> {
    let mut row_ids: Vec<i64> = Vec::new();
    full_scan(reader, root, None, &mut |row| {
        let matches = row.values.first().and_then(Value::as_str) == Some(key);
        if matches {
            if let Some(row_id) = row.values.last().and_then(Value::as_int) {
                row_ids.push(row_id);
            }
        }
        Ok(())
    })?;
    trace!(root, key, matches = row_ids.len(), "index lookup");
    Ok(row_ids)
}
