use crate::errors::DecodeError;
use crate::types::{Cell, DataFrame};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strings read as missing values.
const NULL_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "NULL", "null", "None", "#N/A"];
const TRUE_VALUES: &[&str] = &["true", "True", "TRUE"];
const FALSE_VALUES: &[&str] = &["false", "False", "FALSE"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
    /// Whether the first (non-skipped) row names the columns. Without a
    /// header, columns are named `0`, `1`, ...
    pub has_header: bool,
    /// Lines to drop before the header.
    pub skip_rows: usize,
    /// Type each column as int, float or bool when every value allows it.
    pub infer_types: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
            skip_rows: 0,
            infer_types: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Str,
}

/// Parses comma-separated text into a [`DataFrame`].
///
/// Rows shorter than the header are padded with nulls; a row with more fields
/// than the header is an error.
pub fn decode_csv(payload: &[u8], options: &CsvOptions) -> Result<DataFrame, DecodeError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .has_headers(false)
        .flexible(true)
        .from_reader(payload);

    let mut records = reader
        .records()
        .skip(options.skip_rows)
        .collect::<Result<Vec<StringRecord>, _>>()?;
    if records.is_empty() {
        return Ok(DataFrame::default());
    }

    let columns = if options.has_header {
        header_names(records.remove(0).iter())
    } else {
        (0..records[0].len()).map(|i| i.to_string()).collect()
    };
    let width = columns.len();

    let mut grid: Vec<Vec<Option<&str>>> = Vec::with_capacity(records.len());
    for record in &records {
        if record.len() > width {
            return Err(DecodeError::RaggedRow {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            });
        }
        grid.push(
            (0..width)
                .map(|i| record.get(i).filter(|v| !NULL_MARKERS.contains(v)))
                .collect(),
        );
    }

    let kinds: Vec<ColumnKind> = (0..width)
        .map(|i| {
            if options.infer_types {
                infer_column(grid.iter().filter_map(|row| row[i]))
            } else {
                ColumnKind::Str
            }
        })
        .collect();

    let rows = grid
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(value, kind)| value.map_or(Cell::Null, |v| to_cell(v, *kind)))
                .collect()
        })
        .collect();

    Ok(DataFrame::new(columns, rows))
}

/// Names empty headers `Unnamed: {i}` and suffixes repeats as `a.1`, `a.2`.
/// A suffixed name that is already taken gets suffixed again (`a.1.1`).
pub(super) fn header_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let mut unique = if name.is_empty() {
                format!("Unnamed: {i}")
            } else {
                name.to_string()
            };
            let mut count = counts.get(&unique).copied().unwrap_or(0);
            while count > 0 {
                counts.insert(unique.clone(), count + 1);
                unique = format!("{unique}.{count}");
                count = counts.get(&unique).copied().unwrap_or(0);
            }
            counts.insert(unique.clone(), count + 1);
            unique
        })
        .collect()
}

fn infer_column<'a>(values: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    let mut values = values.peekable();
    if values.peek().is_none() {
        return ColumnKind::Str;
    }
    let all = |pred: fn(&str) -> bool| values.clone().all(pred);
    if all(|v| v.parse::<i64>().is_ok()) {
        ColumnKind::Int
    } else if all(|v| v.parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else if all(|v| TRUE_VALUES.contains(&v) || FALSE_VALUES.contains(&v)) {
        ColumnKind::Bool
    } else {
        ColumnKind::Str
    }
}

fn to_cell(value: &str, kind: ColumnKind) -> Cell {
    match kind {
        ColumnKind::Int => value.parse().map(Cell::Int).unwrap_or(Cell::Null),
        ColumnKind::Float => value.parse().map(Cell::Float).unwrap_or(Cell::Null),
        ColumnKind::Bool => Cell::Bool(TRUE_VALUES.contains(&value)),
        ColumnKind::Str => Cell::Str(value.to_string()),
    }
}
