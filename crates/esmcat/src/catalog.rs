//! The catalog: descriptor, inventory table and options, validated together

use crate::aggregation::AggregationSpec;
use crate::derived::{DerivedRequirement, DerivedVariableRegistry};
use crate::descriptor::CatalogDescriptor;
use crate::error::{Error, Result};
use crate::options::CatalogOptions;
use crate::plan::{AggregationPlans, GroupKey, Planner};
use crate::query::{self, Query};
use crate::schema::DataFormat;
use crate::table::InventoryTable;
use crate::value::{Cell, Value};
use diagnostics::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// An immutable, validated catalog.
///
/// Searching produces a new catalog over the matching rows; the original is
/// never modified. Clones share the descriptor and table.
#[derive(Debug, Clone)]
pub struct Catalog {
    descriptor: Arc<CatalogDescriptor>,
    table: Arc<InventoryTable>,
    options: Arc<CatalogOptions>,
    derived: Vec<DerivedRequirement>,
    requested_variables: Vec<String>,
}

impl Catalog {
    pub fn new(descriptor: CatalogDescriptor, table: InventoryTable, options: CatalogOptions) -> Result<Self> {
        validate(&descriptor, &table)?;
        Ok(Self {
            descriptor: Arc::new(descriptor),
            table: Arc::new(table),
            options: Arc::new(options),
            derived: Vec::new(),
            requested_variables: Vec::new(),
        })
    }

    pub fn descriptor(&self) -> &CatalogDescriptor {
        &self.descriptor
    }

    pub fn table(&self) -> &InventoryTable {
        &self.table
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    pub fn aggregation_spec(&self) -> Option<&AggregationSpec> {
        self.descriptor.aggregation_control.as_ref()
    }

    /// Number of assets (inventory rows)
    pub fn asset_count(&self) -> usize {
        self.table.len()
    }

    /// True when one asset may hold several variables
    pub fn has_multiple_variable_assets(&self) -> bool {
        self.aggregation_spec()
            .is_some_and(|spec| self.table.is_iterable(&spec.variable_column))
    }

    /// Variables recorded by the search that produced this catalog
    pub fn requested_variables(&self) -> &[String] {
        &self.requested_variables
    }

    /// Names of the derived variables attached to this catalog
    pub fn derived_variables(&self) -> Vec<&str> {
        self.derived.iter().map(|d| d.variable.as_str()).collect()
    }

    /// Replace the inventory, keeping descriptor, options and derived variables
    pub fn with_table(&self, table: InventoryTable) -> Result<Self> {
        validate(&self.descriptor, &table)?;
        Ok(Self {
            descriptor: Arc::clone(&self.descriptor),
            table: Arc::new(table),
            options: Arc::clone(&self.options),
            derived: self.derived.clone(),
            requested_variables: Vec::new(),
        })
    }

    /// Attach derived variables after checking their queries against the
    /// catalog
    pub fn with_derived_variables<D>(mut self, registry: &DerivedVariableRegistry<D>) -> Result<Self> {
        if registry.is_empty() {
            self.derived.clear();
            return Ok(self);
        }
        let Some(spec) = self.aggregation_spec() else {
            return Err(Error::spec(
                "variable derivation requires aggregation_control in the catalog",
            ));
        };
        let variable_column = spec.variable_column.clone();

        let requirements = registry.requirements();
        for req in &requirements {
            if req.query.get(&variable_column).is_none() {
                return Err(Error::spec(format!(
                    "derived variable {} must query the '{}' column",
                    req.variable, variable_column
                )));
            }
            if let Some(column) = req.query.columns().find(|c| !self.table.has_column(c)) {
                return Err(Error::spec(format!(
                    "derived variable {} depends on unknown column '{}'",
                    req.variable, column
                )));
            }
        }
        self.derived = requirements;
        Ok(self)
    }

    /// Rows matching `query`, plus the inputs of any requested derived
    /// variable
    pub fn search(&self, query: &Query) -> Result<Catalog> {
        let mut results = query::search(&self.table, query)?.into_table();

        let variable_column = self.aggregation_spec().map(|spec| spec.variable_column.clone());
        let variables: Option<Vec<String>> = variable_column.as_deref().and_then(|column| {
            query.get(column).map(|p| {
                p.literals()
                    .into_iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
        });

        let mut dependents: Vec<String> = Vec::new();
        let mut derived_subset: Vec<DerivedRequirement> = Vec::new();
        if let (Some(column), Some(variables)) = (variable_column.as_deref(), variables.as_ref()) {
            let mut others = query.clone();
            others.remove(column);

            for req in self.derived.iter().filter(|d| variables.contains(&d.variable)) {
                let derived_query = req
                    .query
                    .merge(&others)
                    .require_all_on(query.required_columns().iter().cloned());
                let found = query::search(&self.table, &derived_query)?;
                if found.is_empty() {
                    continue;
                }
                let name = req.variable.as_str();
                let count = found.len();
                debug!("derived variable {name} adds {count} candidate rows", name: name, count: count);
                results = results.concat_dedup(found.table())?;
                dependents.extend(req.dependent_variables(column));
                derived_subset.push(req.clone());
            }
        }

        let requested_variables = if self.has_multiple_variable_assets() {
            let mut all: BTreeSet<String> = variables.iter().flatten().cloned().collect();
            all.extend(dependents);
            all.into_iter().collect()
        } else {
            Vec::new()
        };

        let mut descriptor = (*self.descriptor).clone();
        descriptor.catalog_file = None;
        descriptor.catalog_dict = None;

        Ok(Catalog {
            descriptor: Arc::new(descriptor),
            table: Arc::new(results),
            options: Arc::clone(&self.options),
            derived: if variables.is_some() {
                derived_subset
            } else {
                self.derived.clone()
            },
            requested_variables,
        })
    }

    /// Planner configured for this catalog
    pub fn planner(&self) -> Planner<'_> {
        Planner::new(self.aggregation_spec(), &self.options)
            .with_assets(&self.descriptor.assets)
            .with_attribute_columns(
                self.descriptor
                    .attribute_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            )
            .with_requested_variables(self.requested_variables.clone())
    }

    /// One plan per group of the current rows
    pub fn plans(&self) -> Result<AggregationPlans> {
        self.planner().plan(&self.table)
    }

    /// One plan per row, ignoring the aggregation spec
    pub fn plans_without_aggregation(&self) -> Result<AggregationPlans> {
        self.planner().without_aggregation().plan(&self.table)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.plans()?.keys().into_iter().map(str::to_string).collect())
    }

    /// Each key with the `(column, value)` pairs it stands for
    pub fn keys_info(&self) -> Result<Vec<(String, GroupKey)>> {
        Ok(self
            .plans()?
            .into_iter()
            .map(|plan| (plan.key, plan.group_key))
            .collect())
    }

    /// How keys are composed: groupby columns (or every column) joined by
    /// the separator
    pub fn key_template(&self) -> String {
        match self.aggregation_spec() {
            Some(spec) if !spec.groupby_columns.is_empty() => spec.groupby_columns.join(&self.options.sep),
            _ => self.table.column_names().join(&self.options.sep),
        }
    }

    /// Distinct values per column, plus registered derived variables
    pub fn unique(&self) -> BTreeMap<String, Vec<Value>> {
        let mut unique = self.table.unique();
        if let Some(spec) = self.aggregation_spec() {
            unique.insert(
                format!("derived_{}", spec.variable_column),
                self.derived.iter().map(|d| Value::from(d.variable.as_str())).collect(),
            );
        }
        unique
    }

    /// Distinct value counts per column, plus the derived variable count
    pub fn nunique(&self) -> BTreeMap<String, usize> {
        let mut nunique = self.table.nunique();
        if let Some(spec) = self.aggregation_spec() {
            nunique.insert(format!("derived_{}", spec.variable_column), self.derived.len());
        }
        nunique
    }
}

fn validate(descriptor: &CatalogDescriptor, table: &InventoryTable) -> Result<()> {
    descriptor.validate()?;

    for attribute in &descriptor.attributes {
        if !table.has_column(&attribute.name) {
            return Err(Error::missing_column(&attribute.name, "attributes"));
        }
    }

    let assets = &descriptor.assets;
    table.require_non_empty(&assets.location_column)?;

    if let Some(format_column) = &assets.format_column {
        let cells = table
            .column_cells(format_column)
            .ok_or_else(|| Error::missing_column(format_column, "assets.format_column_name"))?;
        for cell in cells {
            let known = match cell {
                Cell::Scalar(Value::Str(s)) => DataFormat::parse(s).is_some(),
                _ => false,
            };
            if !known {
                return Err(Error::schema(format!(
                    "unknown data format {} in column '{}'",
                    cell, format_column
                )));
            }
        }
    }

    if let Some(spec) = &descriptor.aggregation_control {
        spec.validate(&table.column_names())?;
        for column in &spec.groupby_columns {
            if !table.has_column(column) {
                return Err(Error::spec(format!(
                    "groupby column '{}' is not in the inventory header",
                    column
                )));
            }
        }
    }
    Ok(())
}
