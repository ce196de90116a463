//! Detection of tabular output captured from the sandbox.

use serde::{Deserialize, Serialize};

/// A parsed whitespace-delimited table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Try to read `text` as a whitespace-delimited table: a header line and
/// at least one data row of consistent width. A leading index column
/// (pandas prints one with `to_string()`) is dropped when every data row
/// is exactly one field wider than the header.
pub fn parse_table(text: &str) -> Option<TableData> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 2 {
        return None;
    }

    let columns: Vec<String> = lines[0].split_whitespace().map(str::to_string).collect();
    if columns.len() < 2 {
        return None;
    }

    let data: Vec<Vec<String>> = lines[1..]
        .iter()
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect();

    if data.iter().all(|r| r.len() == columns.len()) {
        Some(TableData {
            columns,
            rows: data,
        })
    } else if data.iter().all(|r| r.len() == columns.len() + 1) {
        let rows = data
            .into_iter()
            .map(|mut r| {
                r.remove(0);
                r
            })
            .collect();
        Some(TableData { columns, rows })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_table() {
        let table = parse_table("city age\nDelhi 30\nPune 25").unwrap();
        assert_eq!(table.columns, vec!["city", "age"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Delhi", "30"]);
    }

    #[test]
    fn drops_pandas_index_column() {
        let output = "city  age\n0  Delhi  30\n1  Pune  25";
        let table = parse_table(output).unwrap();
        assert_eq!(table.columns, vec!["city", "age"]);
        assert_eq!(table.rows[1], vec!["Pune", "25"]);
    }

    #[test]
    fn prose_is_not_a_table() {
        assert!(parse_table("The average age across cities is 27.5 years.").is_none());
        assert!(parse_table("mean 27.5\nand some trailing prose here").is_none());
    }

    #[test]
    fn single_line_is_not_a_table() {
        assert!(parse_table("city age").is_none());
        assert!(parse_table("").is_none());
    }

    #[test]
    fn single_column_is_not_a_table() {
        assert!(parse_table("age\n30\n25").is_none());
    }
}
