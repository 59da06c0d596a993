use thiserror::Error;

/// Errors raised while decoding a database file or answering a query.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// The file does not follow the on-disk format: bad magic, an invalid
    /// enum byte, a reserved serial type, a fixed constant mismatch or a
    /// structure that runs past the bytes available.
    #[error("malformed {region}: {detail}")]
    Format { region: String, detail: String },

    /// A table, column or page referenced by the caller does not exist.
    #[error("no such {kind}: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The statement is outside the supported query shapes.
    #[error("not implemented: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqliteError {
    pub fn format(region: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Format {
            region: region.into(),
            detail: detail.into(),
        }
    }

    pub fn table_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "table",
            name: name.to_string(),
        }
    }

    pub fn column_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "column",
            name: name.to_string(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, SqliteError>;
