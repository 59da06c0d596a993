use super::record::Value;
use crate::error::Result;
use crate::parser::schema::{index_column_name, table_column_names};
use crate::sqlite::db::PageReader;
use crate::sqlite::query_engine::btree::full_scan;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Page holding the root of the schema table.
pub const SCHEMA_ROOT_PAGE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Table,
    Index,
    Trigger,
    View,
}

impl TryFrom<&str> for SchemaType {
    type Error = String;
    fn try_from(value: &str) -> std::result::Result<SchemaType, Self::Error> {
        match value.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "index" => Ok(Self::Index),
            "trigger" => Ok(Self::Trigger),
            "view" => Ok(Self::View),
            _ => Err(format!("invalid schema type {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    pub table_name: String,
    pub root_page: u32,
    pub sql: String,
    pub columns: Vec<String>,
}

impl TableMetadata {
    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Position of the column that aliases the row id, if the table has one.
    pub fn id_slot(&self) -> Option<usize> {
        self.column_position("id")
    }

    pub fn is_internal(&self) -> bool {
        self.name.to_ascii_lowercase().starts_with("sqlite_")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    pub name: String,
    pub table_name: String,
    pub root_page: u32,
    /// None for the automatic indexes backing UNIQUE and PRIMARY KEY.
    pub sql: Option<String>,
    pub indexed_column: Option<String>,
}

impl IndexMetadata {
    pub fn covers(&self, column: &str) -> bool {
        self.indexed_column
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(column))
    }
}

// triggers and views are catalogued but never queried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub name: String,
    pub table_name: String,
    pub root_page: u32,
    pub sql: Option<String>,
}

#[derive(Debug, Default)]
pub struct SqliteSchema {
    tables: Vec<TableMetadata>,
    indexes: Vec<IndexMetadata>,
    triggers: Vec<SchemaObject>,
    views: Vec<SchemaObject>,
    // lowercase table name to position in the table vec
    table_map: HashMap<String, usize>,
    // lowercase table name to offsets into the index vec
    table_indexes: HashMap<String, Vec<usize>>,
}

struct SchemaRow {
    schema_type: SchemaType,
    name: String,
    table_name: String,
    root_page: u32,
    sql: Option<String>,
}

impl TryFrom<&[Value]> for SchemaRow {
    type Error = String;
    fn try_from(row: &[Value]) -> std::result::Result<SchemaRow, Self::Error> {
        let [schema_type, name, table_name, root_page, sql, ..] = row else {
            return Err(format!("expected 5 columns, found {}", row.len()));
        };
        let text = |value: &Value, field: &str| {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("{field} is not text: {value:?}"))
        };

        let schema_type = SchemaType::try_from(text(schema_type, "type")?.as_str())?;
        let root_page = match root_page {
            Value::Null => 0,
            other => other
                .as_int()
                .and_then(|page| u32::try_from(page).ok())
                .ok_or_else(|| format!("rootpage is not a page number: {other:?}"))?,
        };
        let sql = match sql {
            Value::Null => None,
            other => Some(text(other, "sql")?),
        };

        Ok(SchemaRow {
            schema_type,
            name: text(name, "name")?,
            table_name: text(table_name, "tbl_name")?,
            root_page,
            sql,
        })
    }
}

impl SqliteSchema {
    /// Builds the catalog from decoded schema table rows, positionally
    /// `(type, name, tbl_name, rootpage, sql)`. Rows that do not fit that
    /// shape are skipped.
    pub fn new(rows: impl IntoIterator<Item = Vec<Value>>) -> SqliteSchema {
        let mut schema = SqliteSchema::default();
        for row in rows {
            match SchemaRow::try_from(row.as_slice()) {
                Ok(schema_row) => schema.push(schema_row),
                Err(reason) => warn!(%reason, "skipping schema row"),
            }
        }
        debug!(
            tables = schema.tables.len(),
            indexes = schema.indexes.len(),
            triggers = schema.triggers.len(),
            views = schema.views.len(),
            "loaded schema"
        );
        schema
    }

    /// Reads the whole schema tree rooted at page 1.
    pub fn load<R: PageReader>(reader: &R) -> Result<SqliteSchema> {
        let mut rows: Vec<Vec<Value>> = Vec::new();
        full_scan(reader, SCHEMA_ROOT_PAGE, None, &mut |row| {
            rows.push(row.values);
            Ok(())
        })?;
        Ok(SqliteSchema::new(rows))
    }

    fn push(&mut self, row: SchemaRow) {
        let SchemaRow {
            schema_type,
            name,
            table_name,
            root_page,
            sql,
        } = row;
        match schema_type {
            SchemaType::Table => {
                let sql = sql.unwrap_or_default();
                let columns = table_column_names(&sql);
                self.table_map
                    .insert(name.to_ascii_lowercase(), self.tables.len());
                self.tables.push(TableMetadata {
                    name,
                    table_name,
                    root_page,
                    sql,
                    columns,
                });
            }
            SchemaType::Index => {
                let indexed_column = sql.as_deref().and_then(index_column_name);
                self.table_indexes
                    .entry(table_name.to_ascii_lowercase())
                    .or_default()
                    .push(self.indexes.len());
                self.indexes.push(IndexMetadata {
                    name,
                    table_name,
                    root_page,
                    sql,
                    indexed_column,
                });
            }
            SchemaType::Trigger => self.triggers.push(SchemaObject {
                name,
                table_name,
                root_page,
                sql,
            }),
            SchemaType::View => self.views.push(SchemaObject {
                name,
                table_name,
                root_page,
                sql,
            }),
        }
    }

    pub fn tables(&self) -> &[TableMetadata] {
        &self.tables
    }

    pub fn indexes(&self) -> &[IndexMetadata] {
        &self.indexes
    }

    pub fn triggers(&self) -> &[SchemaObject] {
        &self.triggers
    }

    pub fn views(&self) -> &[SchemaObject] {
        &self.views
    }

    pub fn fetch_table(&self, table_name: &str) -> Option<&TableMetadata> {
        let i = self.table_map.get(&table_name.to_ascii_lowercase())?;
        self.tables.get(*i)
    }

    pub fn fetch_indexes(&self, table_name: &str) -> Vec<&IndexMetadata> {
        self.table_indexes
            .get(&table_name.to_ascii_lowercase())
            .map(|offsets| offsets.iter().filter_map(|i| self.indexes.get(*i)).collect())
            .unwrap_or_default()
    }

    pub fn index_for_column(&self, table_name: &str, column: &str) -> Option<&IndexMetadata> {
        self.fetch_indexes(table_name)
            .into_iter()
            .find(|index| index.root_page != 0 && index.covers(column))
    }

    /// Pairs every condition column with an index covering it. Returns None
    /// as soon as one column has no usable index.
    pub fn resolve_query_metadata<'a, 'c>(
        &'a self,
        table_name: &str,
        condition_columns: impl IntoIterator<Item = &'c str>,
    ) -> Option<Vec<(&'c str, &'a IndexMetadata)>> {
        condition_columns
            .into_iter()
            .map(|column| Some((column, self.index_for_column(table_name, column)?)))
            .collect()
    }
}
