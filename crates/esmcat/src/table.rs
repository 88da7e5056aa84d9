//! In-memory inventory table: one row per asset

use crate::error::{Error, Result};
use crate::value::{Cell, Value, parse_iterable_literal};
use std::collections::{BTreeMap, HashSet};

/// Whether a column holds scalars or small sets of scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar,
    Iterable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn scalar<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Scalar,
        }
    }

    pub fn iterable<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Iterable,
        }
    }

    pub fn is_iterable(&self) -> bool {
        self.kind == ColumnKind::Iterable
    }
}

/// Ordered rows over a fixed header.
///
/// Every row has exactly one cell per column. The table is never mutated in
/// place; filtering and concatenation build new tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InventoryTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl InventoryTable {
    /// Build a table from raw rows.
    ///
    /// Cells of a column named in `iterable_columns` are parsed as literal
    /// collections when they arrive as strings; nulls become the empty set.
    pub fn load(columns: Vec<String>, rows: Vec<Vec<Cell>>, iterable_columns: &[String]) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(Error::schema(format!("duplicate column '{}'", name)));
            }
        }
        for name in iterable_columns {
            if !seen.contains(name.as_str()) {
                return Err(Error::missing_column(name, "columns_with_iterables"));
            }
        }

        let columns: Vec<Column> = columns
            .into_iter()
            .map(|name| {
                if iterable_columns.contains(&name) {
                    Column::iterable(name)
                } else {
                    Column::scalar(name)
                }
            })
            .collect();

        let mut loaded = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::schema(format!(
                    "row {} has {} cells but the header has {} columns",
                    index,
                    row.len(),
                    columns.len()
                )));
            }
            let cells = row
                .into_iter()
                .zip(&columns)
                .map(|(cell, column)| normalize_cell(cell, column, index))
                .collect::<Result<Vec<_>>>()?;
            loaded.push(cells);
        }

        Ok(Self {
            columns,
            rows: loaded,
        })
    }

    /// A table with the given header and no rows
    pub fn empty(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn is_iterable(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name && c.is_iterable())
    }

    pub fn iterable_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_iterable())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    /// Cell at `(row, column)`, if both exist
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|cells| &cells[col])
    }

    /// All cells of one column, in row order
    pub fn column_cells(&self, column: &str) -> Option<Vec<&Cell>> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(|cells| &cells[col]).collect())
    }

    /// Distinct non-null values of a column in first-seen order.
    ///
    /// Iterable columns contribute the union of their elements. Returns an
    /// empty list for an unknown column.
    pub fn distinct_values(&self, column: &str) -> Vec<Value> {
        let Some(col) = self.column_index(column) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for cells in &self.rows {
            for value in cells[col].elements() {
                if seen.insert(value) {
                    out.push(value.clone());
                }
            }
        }
        out
    }

    /// Distinct cells of a column, set cells compared as whole values
    pub fn distinct_cells(&self, column: &str) -> Vec<Cell> {
        let Some(col) = self.column_index(column) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for cells in &self.rows {
            if seen.insert(&cells[col]) {
                out.push(cells[col].clone());
            }
        }
        out
    }

    /// True when every cell of the column is null (or an empty set)
    pub fn is_all_null(&self, column: &str) -> bool {
        match self.column_index(column) {
            Some(col) => self.rows.iter().all(|cells| cells[col].elements().is_empty()),
            None => true,
        }
    }

    /// Distinct values for every column
    pub fn unique(&self) -> BTreeMap<String, Vec<Value>> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), self.distinct_values(&c.name)))
            .collect()
    }

    /// Distinct value counts for every column
    pub fn nunique(&self) -> BTreeMap<String, usize> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), self.distinct_values(&c.name).len()))
            .collect()
    }

    /// New table holding the rows at `indices`, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Rows of `self` followed by rows of `other` not already present.
    ///
    /// `other` must share the header of `self`.
    pub fn concat_dedup(&self, other: &InventoryTable) -> Result<Self> {
        if self.columns != other.columns {
            return Err(Error::schema("cannot concatenate tables with different headers"));
        }
        let mut seen: HashSet<&Vec<Cell>> = HashSet::new();
        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        for row in self.rows.iter().chain(&other.rows) {
            if seen.insert(row) {
                rows.push(row.clone());
            }
        }
        Ok(Self {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Fail unless the column exists and no row leaves it empty
    pub fn require_non_empty(&self, column: &str) -> Result<()> {
        let col = self
            .column_index(column)
            .ok_or_else(|| Error::missing_column(column, "the asset descriptor"))?;
        for (index, cells) in self.rows.iter().enumerate() {
            let empty = match &cells[col] {
                Cell::Scalar(Value::Null) => true,
                Cell::Scalar(Value::Str(s)) => s.is_empty(),
                Cell::Set(values) => values.is_empty(),
                Cell::Scalar(_) => false,
            };
            if empty {
                return Err(Error::schema(format!(
                    "row {} has an empty '{}' asset location",
                    index, column
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

fn normalize_cell(cell: Cell, column: &Column, row: usize) -> Result<Cell> {
    match (column.kind, cell) {
        (ColumnKind::Scalar, Cell::Set(_)) => Err(Error::schema(format!(
            "row {} holds a collection in column '{}', which is not declared iterable",
            row, column.name
        ))),
        (ColumnKind::Scalar, cell) => Ok(cell),
        (ColumnKind::Iterable, Cell::Set(values)) => Ok(Cell::set(values)),
        (ColumnKind::Iterable, Cell::Scalar(Value::Null)) => Ok(Cell::Set(Vec::new())),
        (ColumnKind::Iterable, Cell::Scalar(Value::Str(text))) => parse_iterable_literal(&text)
            .map(Cell::set)
            .ok_or_else(|| {
                Error::schema(format!(
                    "row {} column '{}': cannot parse {:?} as a collection",
                    row, column.name, text
                ))
            }),
        (ColumnKind::Iterable, Cell::Scalar(other)) => Err(Error::schema(format!(
            "row {} column '{}': {} is not a collection",
            row, column.name, other
        ))),
    }
}

/// Borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [Column],
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        let idx = self.columns.iter().position(|c| c.name == column)?;
        self.cells.get(idx)
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }

    /// `(column, cell)` pairs in header order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Cell)> {
        self.columns.iter().map(|c| c.name.as_str()).zip(self.cells.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> InventoryTable {
        InventoryTable::load(
            cols(&["experiment", "variable", "path"]),
            vec![
                vec!["20C".into(), "['FLNS', 'PRECC']".into(), "a.nc".into()],
                vec!["RCP85".into(), "['FLNS']".into(), "b.nc".into()],
                vec!["20C".into(), Cell::null(), "c.nc".into()],
            ],
            &cols(&["variable"]),
        )
        .unwrap()
    }

    #[test]
    fn test_load_parses_iterable_columns() {
        let table = sample();
        assert!(table.is_iterable("variable"));
        assert!(!table.is_iterable("experiment"));
        assert_eq!(
            table.cell(0, "variable"),
            Some(&Cell::Set(vec!["FLNS".into(), "PRECC".into()]))
        );
        assert_eq!(table.cell(2, "variable"), Some(&Cell::Set(Vec::new())));
    }

    #[test]
    fn test_load_rejects_unparseable_iterable() {
        let err = InventoryTable::load(
            cols(&["variable", "path"]),
            vec![vec!["FLNS".into(), "a.nc".into()]],
            &cols(&["variable"]),
        )
        .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_load_rejects_set_in_scalar_column() {
        let err = InventoryTable::load(
            cols(&["variable", "path"]),
            vec![vec![Cell::set(vec!["FLNS".into()]), "a.nc".into()]],
            &[],
        )
        .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_load_rejects_ragged_rows_and_unknown_iterables() {
        assert!(InventoryTable::load(cols(&["a", "b"]), vec![vec!["x".into()]], &[]).is_err());
        assert!(InventoryTable::load(cols(&["a"]), vec![], &cols(&["b"])).is_err());
        assert!(InventoryTable::load(cols(&["a", "a"]), vec![], &[]).is_err());
    }

    #[test]
    fn test_distinct_values_flattens_iterables() {
        let table = sample();
        assert_eq!(
            table.distinct_values("variable"),
            vec![Value::from("FLNS"), Value::from("PRECC")]
        );
        assert_eq!(
            table.distinct_values("experiment"),
            vec![Value::from("20C"), Value::from("RCP85")]
        );
        assert!(table.distinct_values("nope").is_empty());
    }

    #[test]
    fn test_nunique() {
        let counts = sample().nunique();
        assert_eq!(counts["experiment"], 2);
        assert_eq!(counts["variable"], 2);
        assert_eq!(counts["path"], 3);
    }

    #[test]
    fn test_select_and_concat_dedup() {
        let table = sample();
        let first = table.select(&[0, 1]);
        let second = table.select(&[1, 2]);
        let merged = first.concat_dedup(&second).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.cell(2, "path"), Some(&Cell::from("c.nc")));
    }

    #[test]
    fn test_require_non_empty() {
        let table = sample();
        assert!(table.require_non_empty("path").is_ok());
        assert!(table.require_non_empty("missing").is_err());

        let table = InventoryTable::load(
            cols(&["path"]),
            vec![vec!["a.nc".into()], vec!["".into()]],
            &[],
        )
        .unwrap();
        assert!(table.require_non_empty("path").unwrap_err().is_schema());
    }

    #[test]
    fn test_row_view() {
        let table = sample();
        let row = table.row(1).unwrap();
        assert_eq!(row.get("experiment"), Some(&Cell::from("RCP85")));
        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["experiment", "variable", "path"]);
        assert!(table.row(5).is_none());
    }
}
