//! Splits the supported statement shapes into a [`Query`]:
//!
//! ```text
//! SELECT COUNT(*) FROM t [WHERE c1 = v1 [AND c2 = v2 ...]]
//! SELECT col[, col ...] FROM t [WHERE ...]
//! ```
//!
//! Keywords are located by searching the text rather than tokenizing it.

use crate::error::{Result, SqliteError};
use std::collections::HashMap;

pub mod schema;

// keywords that introduce shapes outside the supported grammar
const UNSUPPORTED_KEYWORDS: [&str; 6] = ["OR", "JOIN", "ORDER", "GROUP", "LIMIT", "LIKE"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Count {
        table: String,
        conditions: HashMap<String, String>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        conditions: HashMap<String, String>,
    },
}

impl Query {
    pub fn table(&self) -> &str {
        match self {
            Query::Count { table, .. } | Query::Select { table, .. } => table,
        }
    }

    /// Column name to expected text value, all of which must hold.
    pub fn conditions(&self) -> &HashMap<String, String> {
        match self {
            Query::Count { conditions, .. } | Query::Select { conditions, .. } => conditions,
        }
    }
}

fn unsupported(detail: impl Into<String>) -> SqliteError {
    SqliteError::Unsupported(detail.into())
}

// Uppercased copy of the statement with the contents of quoted literals
// blanked out, so keyword searches never land inside a value. Byte offsets
// line up with the original text.
fn keyword_mask(sql: &str) -> Vec<u8> {
    let mut in_quote = false;
    sql.bytes()
        .map(|b| {
            if b == b'\'' {
                in_quote = !in_quote;
                b
            } else if in_quote {
                b'_'
            } else {
                b.to_ascii_uppercase()
            }
        })
        .collect()
}

fn find_keyword(mask: &[u8], keyword: &str, from: usize) -> Option<usize> {
    let keyword = keyword.as_bytes();
    let last_start = mask.len().checked_sub(keyword.len())?;
    (from..=last_start).find(|&i| {
        let before_ok = i == 0 || mask[i - 1].is_ascii_whitespace() || mask[i - 1] == b')';
        let after_ok = mask
            .get(i + keyword.len())
            .is_none_or(|b| b.is_ascii_whitespace() || *b == b'(');
        before_ok && after_ok && &mask[i..i + keyword.len()] == keyword
    })
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
}

// `mask` is the keyword mask of `condition`, so operators inside quoted
// values are not seen
fn parse_condition(condition: &str, mask: &[u8]) -> Result<(String, String)> {
    let shown = condition.trim();
    let not_equal = mask.windows(2).any(|pair| pair == b"!=");
    if not_equal || mask.iter().any(|b| matches!(*b, b'<' | b'>')) {
        return Err(unsupported(format!("non-equality condition `{shown}`")));
    }
    let Some(eq) = mask.iter().position(|b| *b == b'=') else {
        return Err(unsupported(format!("condition without `=`: `{shown}`")));
    };
    let column = condition[..eq].trim();
    if column.is_empty() {
        return Err(unsupported(format!("condition without a column: `{shown}`")));
    }
    Ok((column.to_string(), strip_quotes(condition[eq + 1..].trim()).to_string()))
}

fn parse_conditions(where_clause: &str, mask: &[u8]) -> Result<HashMap<String, String>> {
    let mut conditions: HashMap<String, String> = HashMap::new();
    let mut start = 0_usize;
    loop {
        let end = find_keyword(mask, "AND", start).unwrap_or(where_clause.len());
        let (column, value) = parse_condition(&where_clause[start..end], &mask[start..end])?;
        conditions.insert(column, value);
        if end == where_clause.len() {
            break;
        }
        start = end + "AND".len();
    }
    Ok(conditions)
}

/// Splits `sql` into a [`Query`], or reports the statement as unsupported.
pub fn parse_query(sql: &str) -> Result<Query> {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    let mask = keyword_mask(sql);

    if find_keyword(&mask, "SELECT", 0) != Some(0) {
        return Err(unsupported("only SELECT statements are supported"));
    }
    if let Some(keyword) = UNSUPPORTED_KEYWORDS
        .iter()
        .find(|keyword| find_keyword(&mask, keyword, 0).is_some())
    {
        return Err(unsupported(format!("{keyword} clauses")));
    }
    let Some(from) = find_keyword(&mask, "FROM", 0) else {
        return Err(unsupported("statement without FROM"));
    };
    let where_at = find_keyword(&mask, "WHERE", from);

    let table_end = where_at.unwrap_or(sql.len());
    let table = sql[from + "FROM".len()..table_end].trim();
    if table.is_empty() || table.contains(char::is_whitespace) || table.contains(',') {
        return Err(unsupported(format!("table reference `{table}`")));
    }

    let conditions = match where_at {
        Some(where_at) => {
            let clause_start = where_at + "WHERE".len();
            parse_conditions(&sql[clause_start..], &mask[clause_start..])?
        }
        None => HashMap::new(),
    };

    let column_list = sql["SELECT".len()..from].trim();
    let squashed: String = column_list
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if squashed == "COUNT(*)" {
        return Ok(Query::Count {
            table: table.to_string(),
            conditions,
        });
    }
    if squashed.starts_with("COUNT(") {
        return Err(unsupported(format!("aggregate `{column_list}`")));
    }

    let columns: Vec<String> = column_list
        .split(',')
        .map(|c| c.trim().to_string())
        .collect();
    if columns.iter().any(String::is_empty) {
        return Err(unsupported(format!("column list `{column_list}`")));
    }
    Ok(Query::Select {
        table: table.to_string(),
        columns,
        conditions,
    })
}
