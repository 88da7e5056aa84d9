//! Aggregation spec: which column is the variable, how rows are grouped,
//! and which combine operations apply within a group

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of combine step applied to a group's assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Concatenate along a dimension already present in every asset
    JoinExisting,
    /// Stack along a newly created dimension named after the attribute
    JoinNew,
    /// Merge distinct attribute values as separate data variables
    Union,
}

impl OperationKind {
    /// Position of this kind in a group's operation list.
    ///
    /// Concatenation along an existing axis must complete before any new axis
    /// is stacked, and variable merging sees fully concatenated datasets.
    pub fn rank(&self) -> u8 {
        match self {
            OperationKind::JoinExisting => 0,
            OperationKind::JoinNew => 1,
            OperationKind::Union => 2,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, OperationKind::JoinExisting | OperationKind::JoinNew)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::JoinExisting => "join_existing",
            OperationKind::JoinNew => "join_new",
            OperationKind::Union => "union",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared combine step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,

    pub attribute_name: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl AggregationOperation {
    pub fn new<S: Into<String>>(kind: OperationKind, attribute_name: S) -> Self {
        Self {
            kind,
            attribute_name: attribute_name.into(),
            options: serde_json::Map::new(),
        }
    }

    pub fn join_existing<S: Into<String>>(attribute_name: S) -> Self {
        Self::new(OperationKind::JoinExisting, attribute_name)
    }

    pub fn join_new<S: Into<String>>(attribute_name: S) -> Self {
        Self::new(OperationKind::JoinNew, attribute_name)
    }

    pub fn union<S: Into<String>>(attribute_name: S) -> Self {
        Self::new(OperationKind::Union, attribute_name)
    }

    #[must_use]
    pub fn with_option<K: Into<String>, V: Into<serde_json::Value>>(mut self, key: K, value: V) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Per-catalog aggregation control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    #[serde(rename = "variable_column_name")]
    pub variable_column: String,

    #[serde(rename = "groupby_attrs", default)]
    pub groupby_columns: Vec<String>,

    #[serde(rename = "aggregations", default)]
    pub operations: Vec<AggregationOperation>,
}

impl AggregationSpec {
    pub fn new<S: Into<String>>(variable_column: S) -> Self {
        Self {
            variable_column: variable_column.into(),
            groupby_columns: Vec::new(),
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_groupby<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groupby_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: AggregationOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Attribute names of all declared operations, in declaration order
    pub fn operation_attributes(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.attribute_name.as_str()).collect()
    }

    /// Check this aggregation spec against a table header
    pub fn validate(&self, header: &[String]) -> Result<()> {
        let has = |name: &str| header.iter().any(|h| h == name);

        if self.variable_column.is_empty() {
            return Err(Error::spec("variable_column_name must be set"));
        }
        if !has(&self.variable_column) {
            return Err(Error::spec(format!(
                "variable column '{}' is not in the inventory header",
                self.variable_column
            )));
        }
        for op in &self.operations {
            if op.attribute_name.is_empty() {
                return Err(Error::spec(format!("{} operation has no attribute_name", op.kind)));
            }
            if !has(&op.attribute_name) {
                return Err(Error::spec(format!(
                    "{} attribute '{}' is not in the inventory header",
                    op.kind, op.attribute_name
                )));
            }
        }
        Ok(())
    }
}
