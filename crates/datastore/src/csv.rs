//! CSV inventory files
//!
//! Reading infers column types with arrow_csv and converts the record batches
//! into inventory cells. Integer, float and boolean columns keep their type;
//! every other column, and every iterable column, is read as text.

use crate::error::{Result, StoreError};
use arrow::util::pretty::pretty_format_batches;
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
};
use arrow_csv::reader::Format;
use arrow_schema::{DataType, Field, Schema};
use esmcat::{Cell, InventoryTable, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Rows per record batch while reading an inventory
const READ_BATCH_ROWS: usize = 4096;

/// Dialect of an inventory CSV file.
///
/// The first line is always the header; column names come from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CsvOptions {
    #[serde(default = "comma")]
    pub delimiter: char,

    /// Wraps fields holding the delimiter, such as bracketed iterable cells
    #[serde(default = "double_quote")]
    pub quote: char,

    /// Rows sampled when deciding whether a column is numeric.
    /// `None` samples the whole file.
    #[serde(default)]
    pub infer_rows: Option<usize>,
}

fn comma() -> char {
    ','
}

fn double_quote() -> char {
    '"'
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: comma(),
            quote: double_quote(),
            infer_rows: None,
        }
    }
}

impl CsvOptions {
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Delimiter and quote as single bytes; arrow-csv only takes ASCII
    fn dialect(&self) -> Result<(u8, u8)> {
        let byte = |c: char, what: &str| {
            u8::try_from(c)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| StoreError::invalid_descriptor(format!("CSV {what} {c:?} is not ASCII")))
        };
        Ok((byte(self.delimiter, "delimiter")?, byte(self.quote, "quote")?))
    }
}

/// Parse CSV bytes into an inventory table
pub fn read_inventory(bytes: &[u8], options: &CsvOptions, iterable_columns: &[String]) -> Result<InventoryTable> {
    let (delimiter, quote) = options.dialect()?;
    let (inferred, _) = Format::default()
        .with_header(true)
        .with_delimiter(delimiter)
        .with_quote(quote)
        .infer_schema(std::io::Cursor::new(bytes), options.infer_rows)?;

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|field| {
            let keep = matches!(
                field.data_type(),
                DataType::Int64 | DataType::Float64 | DataType::Boolean
            ) && !iterable_columns.iter().any(|c| c == field.name());
            let data_type = if keep { field.data_type().clone() } else { DataType::Utf8 };
            Field::new(field.name(), data_type, true)
        })
        .collect();
    let columns: Vec<String> = fields.iter().map(|f| f.name().clone()).collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = arrow_csv::ReaderBuilder::new(schema)
        .with_header(true)
        .with_delimiter(delimiter)
        .with_quote(quote)
        .with_batch_size(READ_BATCH_ROWS)
        .build(std::io::Cursor::new(bytes))?;

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for batch in reader {
        let batch = batch?;
        let cells = batch
            .columns()
            .iter()
            .map(array_cells)
            .collect::<Result<Vec<_>>>()?;
        for i in 0..batch.num_rows() {
            rows.push(cells.iter().map(|col| col[i].clone()).collect());
        }
    }

    Ok(InventoryTable::load(columns, rows, iterable_columns)?)
}

fn array_cells(array: &ArrayRef) -> Result<Vec<Cell>> {
    fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T> {
        array.as_any().downcast_ref::<T>().ok_or_else(|| {
            StoreError::invalid_descriptor(format!("unexpected CSV column type {}", array.data_type()))
        })
    }

    let len = array.len();
    let cells = match array.data_type() {
        DataType::Int64 => {
            let a = downcast::<Int64Array>(array)?;
            (0..len)
                .map(|i| if a.is_null(i) { Cell::null() } else { Cell::from(a.value(i)) })
                .collect()
        }
        DataType::Float64 => {
            let a = downcast::<Float64Array>(array)?;
            (0..len)
                .map(|i| if a.is_null(i) { Cell::null() } else { Cell::from(a.value(i)) })
                .collect()
        }
        DataType::Boolean => {
            let a = downcast::<BooleanArray>(array)?;
            (0..len)
                .map(|i| if a.is_null(i) { Cell::null() } else { Cell::from(a.value(i)) })
                .collect()
        }
        _ => {
            let a = downcast::<StringArray>(array)?;
            (0..len)
                .map(|i| {
                    if a.is_null(i) || a.value(i).is_empty() {
                        Cell::null()
                    } else {
                        Cell::from(a.value(i))
                    }
                })
                .collect()
        }
    };
    Ok(cells)
}

/// Narrowest arrow type able to hold every non-null cell of a column
fn column_type(cells: &[&Cell]) -> DataType {
    let mut data_type: Option<DataType> = None;
    for cell in cells {
        let next = match cell {
            Cell::Scalar(Value::Null) => continue,
            Cell::Scalar(Value::Int(_)) => DataType::Int64,
            Cell::Scalar(Value::Float(_)) => DataType::Float64,
            Cell::Scalar(Value::Bool(_)) => DataType::Boolean,
            _ => return DataType::Utf8,
        };
        data_type = match (data_type, next) {
            (None, t) => Some(t),
            (Some(a), b) if a == b => Some(a),
            (Some(DataType::Int64), DataType::Float64) | (Some(DataType::Float64), DataType::Int64) => {
                Some(DataType::Float64)
            }
            _ => return DataType::Utf8,
        };
    }
    data_type.unwrap_or(DataType::Utf8)
}

fn column_array(cells: &[&Cell], data_type: &DataType) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Scalar(Value::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Scalar(Value::Float(f)) => Some(*f),
                    Cell::Scalar(Value::Int(i)) => Some(*i as f64),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        DataType::Boolean => Arc::new(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Scalar(Value::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        _ => Arc::new(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Scalar(Value::Null) => None,
                    Cell::Scalar(Value::Str(s)) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<StringArray>(),
        ),
    }
}

/// Convert an inventory table to a single record batch.
///
/// Each column takes the narrowest type holding all of its cells. Iterable
/// cells become bracketed literals in a text column.
pub fn inventory_batch(table: &InventoryTable) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays = Vec::with_capacity(table.columns().len());
    for column in table.columns() {
        let cells = table.column_cells(&column.name).unwrap_or_default();
        let data_type = column_type(&cells);
        arrays.push(column_array(&cells, &data_type));
        fields.push(Field::new(&column.name, data_type, true));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Render an inventory table as an ASCII grid for display
pub fn format_inventory(table: &InventoryTable) -> Result<String> {
    let batch = inventory_batch(table)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

/// Render an inventory table as CSV.
///
/// Iterable cells are written as bracketed literals.
pub fn write_inventory(table: &InventoryTable, options: &CsvOptions) -> Result<Vec<u8>> {
    let batch = inventory_batch(table)?;

    let (delimiter, quote) = options.dialect()?;
    let mut writer = arrow_csv::WriterBuilder::new()
        .with_header(true)
        .with_delimiter(delimiter)
        .with_quote(quote)
        .build(Vec::new());
    writer.write(&batch)?;
    Ok(writer.into_inner())
}
