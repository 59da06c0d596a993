//! Read-only access to SQLite database files.
//!
//! A [`Database`] decodes the file header and schema at open time and answers
//! `SELECT COUNT(*)` and column projections with flat `AND`-joined equality
//! conditions, using single column indexes when every condition column has one.

pub mod config;
pub mod error;
pub mod parser;
pub mod sqlite;

pub use config::{PageLoading, ReaderConfig};
pub use error::{Result, SqliteError};
pub use parser::{Query, parse_query};
pub use sqlite::data_containers::headers::DatabaseHeader;
pub use sqlite::data_containers::record::Value;
pub use sqlite::data_containers::schema::SqliteSchema;
pub use sqlite::db::{Database, PageReader};
