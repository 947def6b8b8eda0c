use crate::extended_json::ExtendedValue;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;

/// A single value in a [`DataFrame`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(f) => Some(*f),
            Cell::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            // `{:?}` keeps the trailing `.0` so float columns stay floats.
            Cell::Float(x) => write!(f, "{x:?}"),
            Cell::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Str(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(x: f64) -> Self {
        Cell::Float(x)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

/// An in-memory table: named columns and rows of [`Cell`]s.
///
/// Every row is exactly as wide as `columns`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl DataFrame {
    /// Builds a frame, padding short rows with [`Cell::Null`] and dropping
    /// cells beyond the last column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Builds an all-string frame whose first row is the header.
    ///
    /// This is the shape spreadsheet APIs hand back: a grid of formatted
    /// strings, so no type inference is applied.
    pub fn from_string_grid(mut grid: Vec<Vec<String>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let columns = grid.remove(0);
        let rows = grid
            .into_iter()
            .map(|row| row.into_iter().map(Cell::Str).collect())
            .collect();
        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// One JSON object per row, keys in column order.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| (name.clone(), cell_to_json(cell)))
                    .collect();
                Value::Object(record)
            })
            .collect()
    }

    /// Writes the frame as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        out.flush()?;
        Ok(())
    }
}

fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Int(i) => Value::from(*i),
        Cell::Float(x) => serde_json::Number::from_f64(*x)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Cell::Str(s) => Value::String(s.clone()),
    }
}

/// The value a reader returns, shaped by the format tag it decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// `csv`, `xlsx` and `parquet` payloads.
    Table(DataFrame),
    /// Plain `json` payloads, object keys in document order.
    Json(Value),
    /// Extended `json` payloads from Cloud Storage.
    Document(ExtendedValue),
    /// `txt` payloads.
    Text(String),
}

impl Decoded {
    pub fn as_table(&self) -> Option<&DataFrame> {
        match self {
            Decoded::Table(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<DataFrame> {
        match self {
            Decoded::Table(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Decoded::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&ExtendedValue> {
        match self {
            Decoded::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Decoded::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(
            vec!["name".into(), "age".into()],
            vec![
                vec!["ada".into(), 36i64.into()],
                vec!["grace".into()],
            ],
        )
    }

    #[test]
    fn test_short_rows_are_padded() {
        let frame = sample();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.get(1, "age"), Some(&Cell::Null));
    }

    #[test]
    fn test_records_keep_column_order() {
        let records = sample().to_records();
        let keys: Vec<&String> = records[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["name", "age"]);
        assert_eq!(records[1]["age"], Value::Null);
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        sample().write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "name,age\nada,36\ngrace,\n");
    }

    #[test]
    fn test_string_grid_first_row_is_header() {
        let frame = DataFrame::from_string_grid(vec![
            vec!["a".into(), "b".into()],
            vec!["1".into(), "".into()],
        ]);
        assert_eq!(frame.columns(), ["a", "b"]);
        assert_eq!(frame.get(0, "b"), Some(&Cell::Str(String::new())));
        assert!(DataFrame::from_string_grid(Vec::new()).is_empty());
    }
}
