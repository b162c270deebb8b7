//! CSV ingestion
//!
//! Headers and fields are whitespace-trimmed on read (uploaded exports
//! routinely carry padded headers). Short rows are padded with empty cells
//! and long rows truncated to the header width, so a stray delimiter never
//! aborts an upload.

use super::{DataError, RawDataset};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

/// Read a CSV file into a [`RawDataset`]
pub fn read_csv(path: impl AsRef<Path>) -> Result<RawDataset, DataError> {
    let file = std::fs::File::open(path)?;
    from_reader(file)
}

/// Read CSV content from any reader
pub fn from_reader<R: Read>(reader: R) -> Result<RawDataset, DataError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(DataError::NoColumns);
    }

    let width = columns.len();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    RawDataset::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_csv() {
        let csv = "customerID,tenure,Churn\nA-1,12,Yes\nA-2,40,No\n";
        let ds = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.columns(), &["customerID", "tenure", "Churn"]);
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.rows()[1], vec!["A-2", "40", "No"]);
    }

    #[test]
    fn test_headers_and_fields_trimmed() {
        let csv = " customerID , tenure \n a , 12 \n";
        let ds = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.columns(), &["customerID", "tenure"]);
        assert_eq!(ds.rows()[0], vec!["a", "12"]);
    }

    #[test]
    fn test_short_rows_padded() {
        let csv = "a,b,c\n1,2\n";
        let ds = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.rows()[0], vec!["1", "2", ""]);
    }

    #[test]
    fn test_long_rows_truncated() {
        let csv = "a,b\n1,2,3,4\n";
        let ds = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.rows()[0], vec!["1", "2"]);
    }

    #[test]
    fn test_empty_input_is_no_columns() {
        let result = from_reader("".as_bytes());
        assert!(matches!(result, Err(DataError::NoColumns)));
    }

    #[test]
    fn test_missing_file() {
        let result = read_csv("/nonexistent/data.csv");
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
