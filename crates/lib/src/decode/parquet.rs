use crate::errors::DecodeError;
use crate::types::{Cell, DataFrame};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow_array::{Array, RecordBatchReader};
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use arrow_schema::DataType;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;
use tracing::debug;

/// Reads every row group of a parquet file into a [`DataFrame`].
///
/// With `columns`, only those columns are read (projection pushdown) and they
/// come back in the requested order.
pub fn decode_parquet(
    payload: &[u8],
    columns: Option<&[String]>,
) -> Result<DataFrame, DecodeError> {
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(payload))?;

    if let Some(wanted) = columns {
        let schema = builder.schema().clone();
        let indices = wanted
            .iter()
            .map(|name| {
                schema.index_of(name).map_err(|_| {
                    ParquetError::General(format!("column '{name}' not found in file schema"))
                })
            })
            .collect::<Result<Vec<usize>, _>>()?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        builder = builder.with_projection(mask);
    }

    let reader = builder.build()?;
    let schema = reader.schema();
    let file_order: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    let mut columns_data: Vec<Vec<Cell>> = vec![Vec::new(); file_order.len()];
    for batch in reader {
        let batch = batch?;
        for (cells, array) in columns_data.iter_mut().zip(batch.columns()) {
            cells.extend(column_cells(array.as_ref())?);
        }
    }
    debug!(
        "Read {} parquet rows across columns {:?}",
        columns_data.first().map_or(0, Vec::len),
        file_order
    );

    let order: Vec<usize> = match columns {
        Some(wanted) => wanted
            .iter()
            .filter_map(|name| file_order.iter().position(|c| c == name))
            .collect(),
        None => (0..file_order.len()).collect(),
    };

    let height = columns_data.first().map_or(0, Vec::len);
    let rows = (0..height)
        .map(|r| order.iter().map(|&c| columns_data[c][r].clone()).collect())
        .collect();
    let names = order.iter().map(|&c| file_order[c].clone()).collect();
    Ok(DataFrame::new(names, rows))
}

macro_rules! primitive_cells {
    ($array:expr, $ty:ty, $variant:ident, $conv:expr) => {{
        let typed = $array.as_primitive::<$ty>();
        (0..typed.len())
            .map(|i| {
                if typed.is_null(i) {
                    Cell::Null
                } else {
                    Cell::$variant($conv(typed.value(i)))
                }
            })
            .collect()
    }};
}

fn column_cells(array: &dyn Array) -> Result<Vec<Cell>, DecodeError> {
    Ok(match array.data_type() {
        DataType::Boolean => {
            let typed = array.as_boolean();
            (0..typed.len())
                .map(|i| {
                    if typed.is_null(i) {
                        Cell::Null
                    } else {
                        Cell::Bool(typed.value(i))
                    }
                })
                .collect()
        }
        DataType::Int8 => primitive_cells!(array, Int8Type, Int, i64::from),
        DataType::Int16 => primitive_cells!(array, Int16Type, Int, i64::from),
        DataType::Int32 => primitive_cells!(array, Int32Type, Int, i64::from),
        DataType::Int64 => primitive_cells!(array, Int64Type, Int, i64::from),
        DataType::UInt8 => primitive_cells!(array, UInt8Type, Int, i64::from),
        DataType::UInt16 => primitive_cells!(array, UInt16Type, Int, i64::from),
        DataType::UInt32 => primitive_cells!(array, UInt32Type, Int, i64::from),
        DataType::UInt64 => {
            let typed = array.as_primitive::<UInt64Type>();
            (0..typed.len())
                .map(|i| {
                    if typed.is_null(i) {
                        Cell::Null
                    } else {
                        let v = typed.value(i);
                        i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int)
                    }
                })
                .collect()
        }
        DataType::Float32 => primitive_cells!(array, Float32Type, Float, f64::from),
        DataType::Float64 => primitive_cells!(array, Float64Type, Float, f64::from),
        DataType::Utf8 => string_cells(array.as_string::<i32>().iter()),
        DataType::LargeUtf8 => string_cells(array.as_string::<i64>().iter()),
        DataType::Utf8View => string_cells(array.as_string_view().iter()),
        // Dates, timestamps, decimals, nested types: arrow's own rendering.
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
            (0..array.len())
                .map(|i| {
                    if array.is_null(i) {
                        Cell::Null
                    } else {
                        Cell::Str(formatter.value(i).to_string())
                    }
                })
                .collect()
        }
    })
}

fn string_cells<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<Cell> {
    values.map(|v| v.map_or(Cell::Null, Cell::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyread_test_utils::parquet::scores_file;

    #[test]
    fn test_all_columns() {
        let payload = scores_file().unwrap();
        let frame = decode_parquet(&payload, None).unwrap();

        assert_eq!(frame.columns(), ["id", "name", "score", "active"]);
        assert_eq!(frame.height(), 3);
        assert_eq!(
            frame.row(1).unwrap(),
            [Cell::Int(2), Cell::Null, Cell::Float(7.25), Cell::Bool(false)]
        );
    }

    #[test]
    fn test_projection_keeps_requested_order() {
        let payload = scores_file().unwrap();
        let wanted = vec!["score".to_string(), "id".to_string()];
        let frame = decode_parquet(&payload, Some(wanted.as_slice())).unwrap();

        assert_eq!(frame.columns(), ["score", "id"]);
        assert_eq!(frame.row(2).unwrap(), [Cell::Float(8.0), Cell::Int(3)]);
    }

    #[test]
    fn test_unknown_column() {
        let payload = scores_file().unwrap();
        let err = decode_parquet(&payload, Some(&["missing".to_string()][..])).unwrap_err();
        assert!(matches!(err, DecodeError::Parquet(_)));
        assert!(err.to_string().contains("'missing'"));
    }

    #[test]
    fn test_not_parquet() {
        let err = decode_parquet(b"id,name\n1,ada\n", None).unwrap_err();
        assert!(matches!(err, DecodeError::Parquet(_)));
    }
}
