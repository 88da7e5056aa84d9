//! Catalog query and aggregation planning for collections of ESM data assets
//!
//! A catalog pairs a [`CatalogDescriptor`] (attribute schema, asset column,
//! optional [`AggregationSpec`]) with an [`InventoryTable`] holding one row
//! per asset. [`Catalog::search`] filters the rows; [`Catalog::plans`] turns
//! the rows into one [`AggregationPlan`] per output dataset, each carrying
//! the ordered combine operations a loader applies to the member assets.
//!
//! Nothing in this crate performs I/O. See the `datastore` crate for opening
//! and saving catalogs.

pub mod aggregation;
pub mod catalog;
pub mod derived;
pub mod descriptor;
pub mod error;
pub mod options;
pub mod plan;
pub mod query;
pub mod schema;
pub mod table;
pub mod value;

pub use aggregation::{AggregationOperation, AggregationSpec, OperationKind};
pub use catalog::Catalog;
pub use derived::{
    BoxError, DerivedDataset, DerivedRequirement, DerivedVariable, DerivedVariableError,
    DerivedVariableRegistry,
};
pub use descriptor::{CatalogDescriptor, ESMCAT_VERSION};
pub use error::{Error, Result};
pub use options::CatalogOptions;
pub use plan::{
    AggregationPlan, AggregationPlans, AssetRef, GroupKey, Irregularity, PlannedOperation, Planner,
    WILDCARD_KEY,
};
pub use query::{Predicate, Query, QueryResult, search};
pub use schema::{AssetSpec, AttributeColumn, DataFormat};
pub use table::{Column, ColumnKind, InventoryTable, Row};
pub use value::{Cell, Value, parse_iterable_literal};
