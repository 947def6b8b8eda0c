use super::csv::header_names;
use super::SheetSelector;
use crate::errors::DecodeError;
use crate::types::{Cell, DataFrame};
use calamine::{open_workbook_from_rs, Data, DataType, Reader, Xlsx};
use std::io::Cursor;
use tracing::debug;

/// Reads one worksheet of an Excel workbook into a [`DataFrame`].
///
/// Numbers stored as whole floats come back as integers unless the column also
/// holds fractional values. Dates are rendered as ISO-8601 strings.
pub fn decode_xlsx(
    payload: &[u8],
    sheet: &SheetSelector,
    has_header: bool,
) -> Result<DataFrame, DecodeError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(payload))?;
    let names = workbook.sheet_names();

    let name = match sheet {
        SheetSelector::Index(i) => names.get(*i).cloned(),
        SheetSelector::Name(wanted) => names.iter().find(|n| *n == wanted).cloned(),
    }
    .ok_or_else(|| DecodeError::SheetNotFound(sheet.to_string()))?;
    debug!("Reading worksheet '{}' of {:?}", name, names);

    let range = workbook.worksheet_range(&name)?;
    let mut grid: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| row.iter().map(to_cell).collect())
        .collect();
    if grid.is_empty() {
        return Ok(DataFrame::default());
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for col in 0..width {
        let fractional = grid
            .iter()
            .skip(usize::from(has_header))
            .any(|row| matches!(row.get(col), Some(Cell::Float(_))));
        if fractional {
            for row in grid.iter_mut().skip(usize::from(has_header)) {
                if let Some(&Cell::Int(i)) = row.get(col) {
                    row[col] = Cell::Float(i as f64);
                }
            }
        }
    }

    let columns = if has_header {
        let header: Vec<String> = grid.remove(0).iter().map(Cell::to_string).collect();
        header_names(header.iter().map(String::as_str))
    } else {
        (0..width).map(|i| i.to_string()).collect()
    };
    Ok(DataFrame::new(columns, grid))
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Int(*i),
        Data::Float(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => Cell::Int(*x as i64),
        Data::Float(x) => Cell::Float(*x),
        Data::String(s) => Cell::Str(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(_) => data
            .as_datetime()
            .map(|dt| Cell::Str(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Cell::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Str(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Null,
    }
}
