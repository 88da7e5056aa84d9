//! Aggregation planner.
//!
//! Partitions a query result into groups and computes, for each group, the
//! ordered combine operations a loader must apply to its member assets.
//! Planning is a pure function of the table and the aggregation spec.

use crate::aggregation::{AggregationOperation, AggregationSpec, OperationKind};
use crate::error::Result;
use crate::options::CatalogOptions;
use crate::schema::{AssetSpec, DataFormat};
use crate::table::InventoryTable;
use crate::value::{Cell, Value};
use diagnostics::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Key string of the single group formed when no groupby column remains
pub const WILDCARD_KEY: &str = "*";

/// `(column, value)` pairs identifying one group, in groupby order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GroupKey(Vec<(String, Cell)>);

impl GroupKey {
    pub fn new(pairs: Vec<(String, Cell)>) -> Self {
        Self(pairs)
    }

    pub fn pairs(&self) -> &[(String, Cell)] {
        &self.0
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, cell)| cell)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values joined by `sep`, or `*` for the empty key
    pub fn to_key_string(&self, sep: &str) -> String {
        if self.0.is_empty() {
            return WILDCARD_KEY.to_string();
        }
        self.0
            .iter()
            .map(|(_, cell)| cell.to_string())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// An operation as it applies to one group
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOperation {
    pub operation: AggregationOperation,
    /// Declared options with inferred entries (such as `dim`) filled in
    pub options: serde_json::Map<String, serde_json::Value>,
    /// Sorted distinct values of the attribute within the group
    pub keys: Vec<Cell>,
}

impl PlannedOperation {
    pub fn kind(&self) -> OperationKind {
        self.operation.kind
    }

    pub fn attribute_name(&self) -> &str {
        &self.operation.attribute_name
    }

    /// Dimension name recorded for join operations
    pub fn dim(&self) -> Option<&str> {
        self.options.get("dim").and_then(serde_json::Value::as_str)
    }
}

/// Structural reason a group cannot be combined into a complete hypercube
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Irregularity {
    /// Values of a joined attribute have different member counts
    UnevenMembers {
        attribute: String,
        counts: Vec<(Cell, usize)>,
    },
    /// Member count differs from the product of distinct values across the
    /// operation attributes
    NotRectangular { expected: usize, actual: usize },
}

impl fmt::Display for Irregularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Irregularity::UnevenMembers { attribute, counts } => {
                let counts: Vec<String> = counts.iter().map(|(v, n)| format!("{v}: {n}")).collect();
                write!(f, "uneven members across '{}' ({})", attribute, counts.join(", "))
            }
            Irregularity::NotRectangular { expected, actual } => {
                write!(f, "expected {expected} members for a complete group, found {actual}")
            }
        }
    }
}

/// Location and format of one member asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub location: String,
    pub format: Option<DataFormat>,
}

/// Everything a loader needs to build one combined dataset
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPlan {
    pub key: String,
    pub group_key: GroupKey,
    pub members: InventoryTable,
    pub operations: Vec<PlannedOperation>,
    pub irregularities: Vec<Irregularity>,
    pub assets: Vec<AssetRef>,
    pub requested_variables: Vec<String>,
}

impl AggregationPlan {
    pub fn is_irregular(&self) -> bool {
        !self.irregularities.is_empty()
    }

    pub fn operation_kinds(&self) -> Vec<OperationKind> {
        self.operations.iter().map(PlannedOperation::kind).collect()
    }

    /// Attributes a loader stamps on the combined dataset
    pub fn dataset_attributes(&self, options: &CatalogOptions) -> BTreeMap<String, serde_json::Value> {
        let mut attrs = BTreeMap::new();
        for column in self.members.columns() {
            let cells = self.members.distinct_cells(&column.name);
            if let [only] = cells.as_slice() {
                if !only.is_null() {
                    attrs.insert(format!("{}:{}", options.attrs_prefix, column.name), only.to_json());
                }
            }
        }
        attrs.insert(options.dataset_key.clone(), serde_json::Value::String(self.key.clone()));
        if !self.requested_variables.is_empty() {
            attrs.insert(
                options.vars_key.clone(),
                serde_json::Value::Array(
                    self.requested_variables
                        .iter()
                        .cloned()
                        .map(serde_json::Value::String)
                        .collect(),
                ),
            );
        }
        attrs
    }
}

/// Plans for every group, in first-seen group order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationPlans {
    key_template: String,
    plans: Vec<AggregationPlan>,
}

impl AggregationPlans {
    /// Groupby column names joined by the key separator
    pub fn key_template(&self) -> &str {
        &self.key_template
    }

    pub fn get(&self, key: &str) -> Option<&AggregationPlan> {
        self.plans.iter().find(|p| p.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.plans.iter().map(|p| p.key.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AggregationPlan> {
        self.plans.iter()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, AggregationPlan> {
        self.plans.into_iter().map(|p| (p.key.clone(), p)).collect()
    }
}

impl IntoIterator for AggregationPlans {
    type Item = AggregationPlan;
    type IntoIter = std::vec::IntoIter<AggregationPlan>;

    fn into_iter(self) -> Self::IntoIter {
        self.plans.into_iter()
    }
}

impl<'a> IntoIterator for &'a AggregationPlans {
    type Item = &'a AggregationPlan;
    type IntoIter = std::slice::Iter<'a, AggregationPlan>;

    fn into_iter(self) -> Self::IntoIter {
        self.plans.iter()
    }
}

/// Builds [`AggregationPlans`] from a table
pub struct Planner<'a> {
    spec: Option<&'a AggregationSpec>,
    options: &'a CatalogOptions,
    assets: Option<&'a AssetSpec>,
    attribute_columns: Option<Vec<String>>,
    aggregate: bool,
    requested_variables: Vec<String>,
}

impl<'a> Planner<'a> {
    pub fn new(spec: Option<&'a AggregationSpec>, options: &'a CatalogOptions) -> Self {
        Self {
            spec,
            options,
            assets: None,
            attribute_columns: None,
            aggregate: true,
            requested_variables: Vec::new(),
        }
    }

    /// Plan every row as its own unit even when a spec is present
    #[must_use]
    pub fn without_aggregation(mut self) -> Self {
        self.aggregate = false;
        self
    }

    /// Resolve member asset locations and formats
    #[must_use]
    pub fn with_assets(mut self, assets: &'a AssetSpec) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Declared attribute columns, used when the aggregation spec leaves groupby empty
    #[must_use]
    pub fn with_attribute_columns(mut self, columns: Vec<String>) -> Self {
        self.attribute_columns = Some(columns);
        self
    }

    #[must_use]
    pub fn with_requested_variables(mut self, variables: Vec<String>) -> Self {
        self.requested_variables = variables;
        self
    }

    pub fn plan(&self, table: &InventoryTable) -> Result<AggregationPlans> {
        match self.spec {
            Some(spec) if self.aggregate => self.plan_groups(spec, table),
            _ => Ok(self.plan_rows(table)),
        }
    }

    /// One plan per distinct row, keyed by every non-null column
    fn plan_rows(&self, table: &InventoryTable) -> AggregationPlans {
        let columns: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|c| !table.is_all_null(c))
            .collect();

        let plans = self
            .partition(table, &columns)
            .into_iter()
            .map(|(group_key, indices)| self.build_plan(group_key, table.select(&indices), Vec::new(), Vec::new()))
            .collect();

        AggregationPlans {
            key_template: columns.join(&self.options.sep),
            plans,
        }
    }

    fn plan_groups(&self, spec: &AggregationSpec, table: &InventoryTable) -> Result<AggregationPlans> {
        spec.validate(&table.column_names())?;

        let groupby = self.resolve_groupby(spec, table);
        let key_template = if groupby.is_empty() {
            WILDCARD_KEY.to_string()
        } else {
            groupby.join(&self.options.sep)
        };

        let mut plans = Vec::new();
        for (group_key, indices) in self.partition(table, &groupby) {
            let members = table.select(&indices);
            let operations = self.plan_operations(spec, &members);
            let irregularities = find_irregularities(&members, &operations);
            let plan = self.build_plan(group_key, members, operations, irregularities);
            if plan.is_irregular() {
                let key = plan.key.clone();
                let reasons = plan.irregularities.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
                warn!("group {key} is irregular: {reasons}", key: key, reasons: reasons);
            }
            plans.push(plan);
        }

        Ok(AggregationPlans { key_template, plans })
    }

    /// Groupby columns after defaulting, dropping unknown columns, and
    /// dropping columns that are entirely null
    fn resolve_groupby(&self, spec: &AggregationSpec, table: &InventoryTable) -> Vec<String> {
        let requested: Vec<String> = if spec.groupby_columns.is_empty() {
            let mut excluded: HashSet<&str> = spec.operation_attributes().into_iter().collect();
            excluded.insert(spec.variable_column.as_str());
            if let Some(assets) = self.assets {
                excluded.insert(assets.location_column.as_str());
                if let Some(format_column) = &assets.format_column {
                    excluded.insert(format_column.as_str());
                }
            }
            let candidates = match &self.attribute_columns {
                Some(columns) if !columns.is_empty() => columns.clone(),
                _ => table.column_names(),
            };
            candidates
                .into_iter()
                .filter(|c| !excluded.contains(c.as_str()))
                .collect()
        } else {
            spec.groupby_columns.clone()
        };

        requested
            .into_iter()
            .filter(|c| {
                let keep = table.has_column(c) && !table.is_all_null(c);
                if !keep {
                    debug!("dropping groupby column {column}", column: c.as_str());
                }
                keep
            })
            .collect()
    }

    /// Row indices per distinct value tuple of `columns`, first-seen order
    fn partition(&self, table: &InventoryTable, columns: &[String]) -> Vec<(GroupKey, Vec<usize>)> {
        let positions: Vec<usize> = columns.iter().filter_map(|c| table.column_index(c)).collect();
        let rows = table.raw_rows();

        let mut slots: HashMap<Vec<&Cell>, usize> = HashMap::new();
        let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let values: Vec<&Cell> = positions.iter().map(|&p| &row[p]).collect();
            match slots.get(&values) {
                Some(&slot) => groups[slot].1.push(i),
                None => {
                    let key = GroupKey::new(
                        columns
                            .iter()
                            .cloned()
                            .zip(values.iter().map(|&c| c.clone()))
                            .collect(),
                    );
                    slots.insert(values, groups.len());
                    groups.push((key, vec![i]));
                }
            }
        }
        groups
    }

    /// Surviving operations for one group, in execution order
    fn plan_operations(&self, spec: &AggregationSpec, members: &InventoryTable) -> Vec<PlannedOperation> {
        let variable = spec.variable_column.as_str();
        let varies = |column: &str| members.distinct_cells(column).len() > 1;
        let implicit_union = AggregationOperation::union(variable);

        let mut selected: Vec<&AggregationOperation> = Vec::new();
        for op in &spec.operations {
            if varies(&op.attribute_name) {
                selected.push(op);
            } else {
                let kind = op.kind.as_str();
                let attribute = op.attribute_name.as_str();
                debug!("pruned {kind} on constant attribute {attribute}", kind: kind, attribute: attribute);
            }
        }

        if varies(variable) && !selected.iter().any(|op| op.attribute_name == variable) {
            selected.push(&implicit_union);
        }

        // Stable: declaration order is kept within each kind, and the
        // variable union follows any other union.
        selected.sort_by_key(|op| (op.kind.rank(), op.attribute_name == variable));

        selected
            .into_iter()
            .map(|op| self.realize(op, members))
            .collect()
    }

    fn realize(&self, op: &AggregationOperation, members: &InventoryTable) -> PlannedOperation {
        let mut options = op.options.clone();
        match op.kind {
            OperationKind::JoinExisting => {
                options
                    .entry("dim")
                    .or_insert_with(|| serde_json::Value::String(self.options.default_concat_dim.clone()));
            }
            OperationKind::JoinNew => {
                options
                    .entry("dim")
                    .or_insert_with(|| serde_json::Value::String(op.attribute_name.clone()));
            }
            OperationKind::Union => {}
        }

        let mut keys = members.distinct_cells(&op.attribute_name);
        keys.sort();

        PlannedOperation {
            operation: op.clone(),
            options,
            keys,
        }
    }

    fn build_plan(
        &self,
        group_key: GroupKey,
        members: InventoryTable,
        operations: Vec<PlannedOperation>,
        irregularities: Vec<Irregularity>,
    ) -> AggregationPlan {
        let assets = self.asset_refs(&members);
        AggregationPlan {
            key: group_key.to_key_string(&self.options.sep),
            group_key,
            members,
            operations,
            irregularities,
            assets,
            requested_variables: self.requested_variables.clone(),
        }
    }

    fn asset_refs(&self, members: &InventoryTable) -> Vec<AssetRef> {
        let Some(assets) = self.assets else {
            return Vec::new();
        };
        members
            .rows()
            .filter_map(|row| {
                let location = match row.get(&assets.location_column)? {
                    Cell::Scalar(Value::Str(s)) => s.clone(),
                    other => other.to_string(),
                };
                let format = match &assets.format_column {
                    Some(column) => row
                        .get(column)
                        .and_then(Cell::as_scalar)
                        .and_then(Value::as_str)
                        .and_then(DataFormat::parse),
                    None => assets.format,
                };
                Some(AssetRef { location, format })
            })
            .collect()
    }
}

/// Completeness checks for groups with at least one join
fn find_irregularities(members: &InventoryTable, operations: &[PlannedOperation]) -> Vec<Irregularity> {
    if !operations.iter().any(|op| op.kind().is_join()) {
        return Vec::new();
    }

    let mut found = Vec::new();
    for op in operations.iter().filter(|op| op.kind().is_join()) {
        let counts = member_counts(members, op.attribute_name());
        let first = counts.first().map(|(_, n)| *n);
        if counts.iter().any(|(_, n)| Some(*n) != first) {
            found.push(Irregularity::UnevenMembers {
                attribute: op.attribute_name().to_string(),
                counts,
            });
        }
    }

    let expected: usize = operations.iter().map(|op| op.keys.len()).product();
    let actual = members.len();
    if expected != actual {
        found.push(Irregularity::NotRectangular { expected, actual });
    }
    found
}

/// Member rows per distinct value of `column`, sorted by value
fn member_counts(members: &InventoryTable, column: &str) -> Vec<(Cell, usize)> {
    let mut counts: BTreeMap<Cell, usize> = BTreeMap::new();
    if let Some(cells) = members.column_cells(column) {
        for cell in cells {
            *counts.entry(cell.clone()).or_default() += 1;
        }
    }
    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[&str; 4]]) -> InventoryTable {
        InventoryTable::load(
            vec!["experiment".into(), "variable".into(), "member_id".into(), "path".into()],
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::from(*v)).collect())
                .collect(),
            &[],
        )
        .unwrap()
    }

    fn spec() -> AggregationSpec {
        AggregationSpec::new("variable")
            .with_groupby(["experiment"])
            .with_operation(AggregationOperation::join_new("member_id"))
            .with_operation(AggregationOperation::union("variable"))
    }

    #[test]
    fn test_union_follows_join_new() {
        let t = table(&[
            ["20C", "FLNS", "1", "a"],
            ["20C", "FLNS", "2", "b"],
            ["20C", "PRECC", "1", "c"],
            ["20C", "PRECC", "2", "d"],
        ]);
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec()), &options).plan(&t).unwrap();
        assert_eq!(plans.keys(), vec!["20C"]);

        let plan = plans.get("20C").unwrap();
        assert_eq!(plan.operation_kinds(), vec![OperationKind::JoinNew, OperationKind::Union]);
        assert_eq!(plan.operations[0].keys, vec![Cell::from("1"), Cell::from("2")]);
        assert_eq!(plan.operations[0].dim(), Some("member_id"));
        assert!(!plan.is_irregular());
    }

    #[test]
    fn test_missing_member_is_irregular() {
        let t = table(&[
            ["20C", "FLNS", "1", "a"],
            ["20C", "FLNS", "2", "b"],
            ["20C", "PRECC", "1", "c"],
        ]);
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec()), &options).plan(&t).unwrap();
        let plan = plans.get("20C").unwrap();
        assert!(plan.is_irregular());
        assert!(plan.irregularities.contains(&Irregularity::NotRectangular { expected: 4, actual: 3 }));
        assert_eq!(plan.operation_kinds(), vec![OperationKind::JoinNew, OperationKind::Union]);
    }

    #[test]
    fn test_constant_attribute_is_pruned() {
        let t = table(&[["RCP85", "FLNS", "1", "a"], ["RCP85", "PRECC", "1", "b"]]);
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec()), &options).plan(&t).unwrap();
        let plan = plans.get("RCP85").unwrap();
        assert_eq!(plan.operation_kinds(), vec![OperationKind::Union]);
        assert!(!plan.is_irregular());
    }

    #[test]
    fn test_implicit_union_for_variable() {
        let t = table(&[["20C", "FLNS", "1", "a"], ["20C", "PRECC", "1", "b"]]);
        let spec = AggregationSpec::new("variable").with_groupby(["experiment"]);
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec), &options).plan(&t).unwrap();
        let plan = plans.get("20C").unwrap();
        assert_eq!(plan.operations.len(), 1);
        assert_eq!(plan.operations[0].attribute_name(), "variable");
        assert_eq!(plan.operations[0].kind(), OperationKind::Union);
    }

    #[test]
    fn test_join_existing_precedes_join_new() {
        let t = InventoryTable::load(
            vec!["member_id".into(), "time_range".into(), "variable".into(), "path".into()],
            vec![
                vec!["1".into(), "1850".into(), "TS".into(), "a".into()],
                vec!["1".into(), "1900".into(), "TS".into(), "b".into()],
                vec!["2".into(), "1850".into(), "TS".into(), "c".into()],
                vec!["2".into(), "1900".into(), "TS".into(), "d".into()],
            ],
            &[],
        )
        .unwrap();
        let spec = AggregationSpec::new("variable")
            .with_groupby(["variable"])
            .with_operation(AggregationOperation::join_new("member_id"))
            .with_operation(AggregationOperation::join_existing("time_range"));
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec), &options).plan(&t).unwrap();
        let plan = plans.get("TS").unwrap();
        assert_eq!(
            plan.operation_kinds(),
            vec![OperationKind::JoinExisting, OperationKind::JoinNew]
        );
        assert_eq!(plan.operations[0].dim(), Some("time"));
    }

    #[test]
    fn test_declared_dim_is_kept() {
        let t = table(&[["20C", "FLNS", "1", "a"], ["20C", "FLNS", "2", "b"]]);
        let spec = AggregationSpec::new("variable")
            .with_groupby(["experiment"])
            .with_operation(AggregationOperation::join_existing("member_id").with_option("dim", "ens"));
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec), &options).plan(&t).unwrap();
        assert_eq!(plans.get("20C").unwrap().operations[0].dim(), Some("ens"));
    }

    #[test]
    fn test_no_spec_plans_each_row() {
        let t = table(&[["20C", "FLNS", "1", "a"], ["20C", "FLNS", "2", "b"]]);
        let options = CatalogOptions::default();
        let plans = Planner::new(None, &options).plan(&t).unwrap();
        assert_eq!(plans.keys(), vec!["20C.FLNS.1.a", "20C.FLNS.2.b"]);
        assert_eq!(plans.key_template(), "experiment.variable.member_id.path");
        for plan in &plans {
            assert_eq!(plan.members.len(), 1);
            assert!(plan.operations.is_empty());
        }

        let plans = Planner::new(Some(&spec()), &options).without_aggregation().plan(&t).unwrap();
        assert_eq!(plans.len(), 2);
    }

    #[test]
    fn test_all_null_groupby_column_is_dropped() {
        let t = InventoryTable::load(
            vec!["experiment".into(), "variable".into(), "path".into()],
            vec![
                vec![Cell::null(), "FLNS".into(), "a".into()],
                vec![Cell::null(), "PRECC".into(), "b".into()],
            ],
            &[],
        )
        .unwrap();
        let spec = AggregationSpec::new("variable").with_groupby(["experiment"]);
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec), &options).plan(&t).unwrap();
        assert_eq!(plans.keys(), vec![WILDCARD_KEY]);
        assert_eq!(plans.get("*").unwrap().members.len(), 2);
    }

    #[test]
    fn test_iterable_groupby_value_is_one_key() {
        let t = InventoryTable::load(
            vec!["experiment".into(), "variable".into(), "member_id".into(), "path".into()],
            vec![
                vec!["20C".into(), "['FLNS', 'TS']".into(), "1".into(), "a.zarr".into()],
                vec!["20C".into(), "['FLNS', 'TS']".into(), "2".into(), "b.zarr".into()],
                vec!["20C".into(), "['TS']".into(), "1".into(), "c.zarr".into()],
                vec!["RCP85".into(), "['FLNS', 'TS']".into(), "1".into(), "d.zarr".into()],
            ],
            &["variable".to_string()],
        )
        .unwrap();
        let spec = AggregationSpec::new("variable")
            .with_groupby(["variable"])
            .with_operation(AggregationOperation::join_new("member_id"));
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec), &options).plan(&t).unwrap();

        assert_eq!(plans.keys(), vec!["['FLNS', 'TS']", "['TS']"]);
        let both = plans.get("['FLNS', 'TS']").unwrap();
        assert_eq!(both.members.len(), 3);
        assert_eq!(
            both.group_key.get("variable"),
            Some(&Cell::set(vec!["FLNS".into(), "TS".into()]))
        );
        assert_eq!(plans.get("['TS']").unwrap().members.len(), 1);
        assert!(!plans.contains_key("FLNS"));
    }

    #[test]
    fn test_default_groupby_excludes_variable_and_operations() {
        let t = table(&[
            ["20C", "FLNS", "1", "a"],
            ["20C", "PRECC", "2", "b"],
            ["RCP85", "FLNS", "1", "c"],
        ]);
        let spec = AggregationSpec::new("variable").with_operation(AggregationOperation::join_new("member_id"));
        let assets = AssetSpec::unformatted("path");
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec), &options)
            .with_assets(&assets)
            .plan(&t)
            .unwrap();
        assert_eq!(plans.keys(), vec!["20C", "RCP85"]);
        assert_eq!(plans.key_template(), "experiment");
    }

    #[test]
    fn test_spec_errors() {
        let t = table(&[["20C", "FLNS", "1", "a"]]);
        let options = CatalogOptions::default();
        let bad = AggregationSpec::new("varname");
        assert!(Planner::new(Some(&bad), &options).plan(&t).unwrap_err().is_spec());

        let bad = AggregationSpec::new("variable").with_operation(AggregationOperation::join_new("realization"));
        assert!(Planner::new(Some(&bad), &options).plan(&t).unwrap_err().is_spec());
    }

    #[test]
    fn test_planning_is_deterministic() {
        let t = table(&[
            ["RCP85", "FLNS", "1", "e"],
            ["20C", "FLNS", "1", "a"],
            ["20C", "PRECC", "2", "b"],
            ["20C", "FLNS", "2", "c"],
        ]);
        let options = CatalogOptions::default().with_sep("/");
        let planner_spec = spec();
        let planner = Planner::new(Some(&planner_spec), &options);
        let first = planner.plan(&t).unwrap();
        let second = planner.plan(&t).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.keys(), vec!["RCP85", "20C"]);
    }

    #[test]
    fn test_dataset_attributes_and_assets() {
        let t = table(&[["20C", "FLNS", "1", "a.nc"], ["20C", "FLNS", "2", "b.nc"]]);
        let assets = AssetSpec::with_format("path", DataFormat::Netcdf);
        let options = CatalogOptions::default();
        let plans = Planner::new(Some(&spec()), &options)
            .with_assets(&assets)
            .with_requested_variables(vec!["FLNS".to_string()])
            .plan(&t)
            .unwrap();
        let plan = plans.get("20C").unwrap();
        assert_eq!(
            plan.assets,
            vec![
                AssetRef {
                    location: "a.nc".to_string(),
                    format: Some(DataFormat::Netcdf)
                },
                AssetRef {
                    location: "b.nc".to_string(),
                    format: Some(DataFormat::Netcdf)
                },
            ]
        );

        let attrs = plan.dataset_attributes(&options);
        assert_eq!(attrs["intake_esm_attrs:experiment"], "20C");
        assert_eq!(attrs["intake_esm_attrs:variable"], "FLNS");
        assert!(!attrs.contains_key("intake_esm_attrs:member_id"));
        assert_eq!(attrs["intake_esm_dataset_key"], "20C");
        assert_eq!(attrs["intake_esm_vars"], serde_json::json!(["FLNS"]));
    }
}
