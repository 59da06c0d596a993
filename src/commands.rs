use anyhow::{Context, Result};
use sqlite_reader::{Database, parse_query};
use std::io::Write;

pub fn run_command<W: Write>(db: &Database, command: &str, out: &mut W) -> Result<()> {
    match command {
        ".dbinfo" => db_info(db, out),
        ".tables" => {
            let names: Vec<&str> = db
                .schema()
                .tables()
                .iter()
                .filter(|t| !t.is_internal())
                .map(|t| t.name.as_str())
                .collect();
            writeln!(out, "{}", names.join(" "))?;
            Ok(())
        }
        ".indexes" => {
            let names: Vec<&str> = db.schema().indexes().iter().map(|i| i.name.as_str()).collect();
            writeln!(out, "{}", names.join(" "))?;
            Ok(())
        }
        sql if sql.trim_start().to_ascii_uppercase().starts_with("SELECT") => {
            let query = parse_query(sql)?;
            let rows = db
                .execute(&query)
                .with_context(|| format!("failed to run `{sql}`"))?;
            for row in rows {
                writeln!(out, "{}", row.join("|"))?;
            }
            Ok(())
        }
        other => {
            writeln!(out, "Missing or invalid command passed: {other}")?;
            Ok(())
        }
    }
}

fn db_info<W: Write>(db: &Database, out: &mut W) -> Result<()> {
    let header = db.header();
    let schema = db.schema();
    let schema_size = db.schema_size()?;

    writeln!(out, "database page size: {}", header.page_size)?;
    writeln!(out, "write format: {}", header.file_format_write_version.code())?;
    writeln!(out, "read format: {}", header.file_format_read_version.code())?;
    writeln!(out, "reserved bytes: {}", header.reserved_space)?;
    writeln!(out, "file change counter: {}", header.file_change_counter)?;
    writeln!(out, "database page count: {}", db.page_count())?;
    writeln!(out, "freelist page count: {}", header.num_freelist_pages)?;
    writeln!(out, "schema cookie: {}", header.schema_cookie)?;
    writeln!(out, "schema format: {}", header.schema_format_number)?;
    writeln!(out, "default cache size: {}", header.default_page_cache_size)?;
    writeln!(out, "autovacuum top root: {}", header.largest_root_b_tree_number)?;
    writeln!(out, "incremental vacuum: {}", header.incremental_vacuum_mode)?;
    writeln!(out, "text encoding: {}", header.text_encoding)?;
    writeln!(out, "user version: {}", header.user_version)?;
    writeln!(out, "application id: {}", header.application_id)?;
    writeln!(out, "software version: {}", header.sqlite_version_number)?;
    writeln!(out, "number of tables: {}", schema.tables().len())?;
    writeln!(out, "number of indexes: {}", schema.indexes().len())?;
    writeln!(out, "number of triggers: {}", schema.triggers().len())?;
    writeln!(out, "number of views: {}", schema.views().len())?;
    writeln!(out, "schema size: {schema_size}")?;
    writeln!(out, "data version {}", header.version_valid_for)?;
    Ok(())
}
