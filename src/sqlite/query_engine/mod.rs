use crate::error::{Result, SqliteError};
use crate::parser::Query;
use crate::sqlite::data_containers::schema::{IndexMetadata, SqliteSchema, TableMetadata};
use crate::sqlite::db::PageReader;
use btree::{BtreeRow, find_row_by_id, find_row_ids_by_key, full_scan};
use search::intersect_row_ids;
use std::collections::HashMap;
use tracing::debug;

pub mod btree;
mod search;

#[derive(Debug)]
enum QueryPlan<'a> {
    FullScan,
    // one index per condition column
    IndexLookup(Vec<(&'a str, &'a IndexMetadata)>),
}

fn plan_query<'a>(
    db_schema: &'a SqliteSchema,
    table: &TableMetadata,
    conditions: &'a HashMap<String, String>,
) -> QueryPlan<'a> {
    if conditions.is_empty() {
        return QueryPlan::FullScan;
    }
    match db_schema.resolve_query_metadata(&table.name, conditions.keys().map(String::as_str)) {
        Some(indexes) => QueryPlan::IndexLookup(indexes),
        None => QueryPlan::FullScan,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectedColumn {
    Slot(usize),
    RowId,
}

fn resolve_projection(table: &TableMetadata, columns: &[String]) -> Result<Vec<ProjectedColumn>> {
    let mut projection: Vec<ProjectedColumn> = Vec::with_capacity(columns.len());
    for column in columns {
        if column == "*" {
            projection.extend((0..table.columns.len()).map(ProjectedColumn::Slot));
        } else if let Some(i) = table.column_position(column) {
            projection.push(ProjectedColumn::Slot(i));
        } else if column.eq_ignore_ascii_case("id") {
            projection.push(ProjectedColumn::RowId);
        } else {
            return Err(SqliteError::column_not_found(column));
        }
    }
    Ok(projection)
}

fn project(row: &BtreeRow, projection: &[ProjectedColumn]) -> Vec<String> {
    projection
        .iter()
        .map(|column| match column {
            ProjectedColumn::Slot(i) => row
                .values
                .get(*i)
                .map(ToString::to_string)
                .unwrap_or_else(|| "null".to_string()),
            ProjectedColumn::RowId => row
                .row_id
                .map(|row_id| row_id.to_string())
                .unwrap_or_else(|| "null".to_string()),
        })
        .collect()
}

// only text values equal to the literal pass
fn matches_conditions(
    table: &TableMetadata,
    row: &BtreeRow,
    conditions: &HashMap<String, String>,
) -> bool {
    conditions.iter().all(|(column, expected)| {
        table
            .column_position(column)
            .and_then(|i| row.values.get(i))
            .and_then(|value| value.as_str())
            == Some(expected.as_str())
    })
}

fn scan_table<R: PageReader + ?Sized>(
    reader: &R,
    table: &TableMetadata,
    conditions: &HashMap<String, String>,
) -> Result<Vec<BtreeRow>> {
    let mut rows: Vec<BtreeRow> = Vec::new();
    full_scan(reader, table.root_page, table.id_slot(), &mut |row| {
        if matches_conditions(table, &row, conditions) {
            rows.push(row);
        }
        Ok(())
    })?;
    Ok(rows)
}

fn lookup_by_index<R: PageReader + ?Sized>(
    reader: &R,
    table: &TableMetadata,
    indexes: &[(&str, &IndexMetadata)],
    conditions: &HashMap<String, String>,
) -> Result<Vec<BtreeRow>> {
    let mut row_id_lists: Vec<Vec<i64>> = Vec::with_capacity(indexes.len());
    for (column, index) in indexes {
        let Some(expected) = conditions.get(*column) else {
            continue;
        };
        let row_ids = find_row_ids_by_key(reader, index.root_page, expected)?;
        debug!(index = %index.name, key = %expected, matches = row_ids.len(), "index lookup");
        row_id_lists.push(row_ids);
    }

    let row_ids = intersect_row_ids(row_id_lists);
    debug!(row_ids = row_ids.len(), "intersected index results");

    let mut rows: Vec<BtreeRow> = Vec::with_capacity(row_ids.len());
    for row_id in row_ids {
        match find_row_by_id(reader, table.root_page, row_id, table.id_slot())? {
            Some(row) => rows.push(row),
            None => debug!(row_id, table = %table.name, "indexed row id missing from table"),
        }
    }
    Ok(rows)
}

/// Runs `query` against the tables in `db_schema`.
///
/// Conditions use the indexes when every condition column has one, otherwise
/// the table is scanned. Results are rendered as strings, a count as a
/// single one-column row.
pub fn execute<R: PageReader + ?Sized>(
    reader: &R,
    db_schema: &SqliteSchema,
    query: &Query,
) -> Result<Vec<Vec<String>>> {
    let table = db_schema
        .fetch_table(query.table())
        .ok_or_else(|| SqliteError::table_not_found(query.table()))?;

    // unknown columns fail before any page is read
    let projection = match query {
        Query::Select { columns, .. } => Some(resolve_projection(table, columns)?),
        Query::Count { .. } => None,
    };

    let conditions = query.conditions();
    let plan = plan_query(db_schema, table, conditions);
    debug!(table = %table.name, ?plan, "planned query");

    let rows = match plan {
        QueryPlan::FullScan => scan_table(reader, table, conditions)?,
        QueryPlan::IndexLookup(indexes) => lookup_by_index(reader, table, &indexes, conditions)?,
    };

    Ok(match projection {
        Some(projection) => rows.iter().map(|row| project(row, &projection)).collect(),
        None => vec![vec![rows.len().to_string()]],
    })
}
