//! Inline `catalog_dict` rows

use crate::error::{Result, StoreError};
use esmcat::{Cell, InventoryTable};
use serde_json::{Map, Value as JsonValue};

pub type Record = Map<String, JsonValue>;

/// Build an inventory table from inline records.
///
/// The column set is the union of record keys in first-seen order; a key
/// absent from a record reads as null. Columns holding a JSON array in any
/// record are iterable, in addition to `iterable_columns`.
pub fn table_from_records(records: &[Record], iterable_columns: &[String]) -> Result<InventoryTable> {
    let mut columns: Vec<String> = Vec::new();
    let mut iterables: Vec<String> = iterable_columns.to_vec();
    for record in records {
        for (key, value) in record {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
            if value.is_array() && !iterables.contains(key) {
                iterables.push(key.clone());
            }
        }
    }
    iterables.retain(|c| columns.contains(c));

    let mut rows = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let mut row = Vec::with_capacity(columns.len());
        for column in &columns {
            let cell = match record.get(column) {
                None => Cell::null(),
                Some(value) => Cell::from_json(value).ok_or_else(|| {
                    StoreError::invalid_descriptor(format!(
                        "catalog_dict row {index} has a nested value in column '{column}'"
                    ))
                })?,
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(InventoryTable::load(columns, rows, &iterables)?)
}

/// Render an inventory table as inline records, one per row
pub fn records_from_table(table: &InventoryTable) -> Vec<Record> {
    table
        .rows()
        .map(|row| {
            row.iter()
                .map(|(name, cell)| (name.to_string(), cell.to_json()))
                .collect()
        })
        .collect()
}
