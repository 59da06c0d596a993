// Column names out of CREATE TABLE / CREATE INDEX text.
//
// The text between the first "(" and the last ")"
// is split on commas and the first token of every piece is taken as a column
// name. Type modifiers containing commas, e.g. DECIMAL(10, 2), and table level
// constraints such as PRIMARY KEY (a, b) produce bogus entries.

const QUOTE_CHARS: [char; 4] = ['"', '`', '[', ']'];

fn clean_definition(sql: &str) -> String {
    sql.replace(['\n', '\r', '\t'], " ").trim().to_string()
}

fn parenthesized(sql: &str) -> Option<&str> {
    let open = sql.find('(')?;
    let close = sql.rfind(')')?;
    (open < close).then(|| &sql[open + 1..close])
}

fn unquote(name: &str) -> String {
    name.trim_matches(|c| QUOTE_CHARS.contains(&c)).to_string()
}

/// Column names of a `CREATE TABLE` statement, in declaration order.
pub fn table_column_names(sql: &str) -> Vec<String> {
    let clean = clean_definition(sql);
    let Some(body) = parenthesized(&clean) else {
        return Vec::new();
    };
    body.split(',')
        .filter_map(|column_def| column_def.split_whitespace().next())
        .map(unquote)
        .filter(|name| !name.is_empty())
        .collect()
}

/// The indexed expression of a single column `CREATE INDEX` statement.
pub fn index_column_name(sql: &str) -> Option<String> {
    let clean = clean_definition(sql);
    let column = unquote(parenthesized(&clean)?.trim());
    (!column.is_empty()).then_some(column)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn multiline_table_definition() {
        let sql = "CREATE TABLE \"superheroes\" (\n\
            \tid integer primary key autoincrement,\n\
            \tname text not null,\n\
            \teye_color text,\n\
            \tfirst_appearance_year text\n\
            )";
        assert_eq!(
            table_column_names(sql),
            vec!["id", "name", "eye_color", "first_appearance_year"]
        );
    }

    #[test]
    fn tab_separated_column_type() {
        assert_eq!(
            table_column_names("CREATE TABLE apples(id\tinteger, color text)"),
            vec!["id", "color"]
        );
    }

    #[test]
    fn quoted_names_split_on_whitespace() {
        assert_eq!(
            table_column_names("CREATE TABLE t (\"size range\" text, `b` int)"),
            vec!["size", "b"]
        );
    }

    #[test]
    fn comma_in_type_modifier_yields_bogus_column() {
        let columns = table_column_names("CREATE TABLE p (id integer, price decimal(10, 2))");
        assert_eq!(columns, vec!["id", "price", "2)"]);
    }

    #[test]
    fn index_column() {
        assert_eq!(
            index_column_name("CREATE INDEX idx_companies_country\n\ton companies (country)"),
            Some("country".to_string())
        );
        assert_eq!(index_column_name("CREATE INDEX broken on t"), None);
    }
}
