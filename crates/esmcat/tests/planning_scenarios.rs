//! End-to-end search and planning over a small CESM-style inventory

use anyhow::Result;
use esmcat::{
    AggregationOperation, AggregationSpec, AssetSpec, Catalog, CatalogDescriptor, CatalogOptions,
    Cell, DataFormat, InventoryTable, Irregularity, OperationKind, Query,
};

fn inventory(rows: &[[&str; 4]]) -> Result<InventoryTable> {
    Ok(InventoryTable::load(
        vec![
            "experiment".to_string(),
            "variable".to_string(),
            "member_id".to_string(),
            "path".to_string(),
        ],
        rows.iter()
            .map(|r| r.iter().map(|v| Cell::from(*v)).collect())
            .collect(),
        &[],
    )?)
}

fn cesm_rows() -> Vec<[&'static str; 4]> {
    vec![
        ["20C", "FLNS", "1", "20C.FLNS.1.nc"],
        ["20C", "FLNS", "2", "20C.FLNS.2.nc"],
        ["20C", "PRECC", "1", "20C.PRECC.1.nc"],
        ["20C", "PRECC", "2", "20C.PRECC.2.nc"],
        ["RCP85", "FLNS", "1", "RCP85.FLNS.1.nc"],
        ["RCP85", "FLNS", "2", "RCP85.FLNS.2.nc"],
    ]
}

fn descriptor(aggregation: Option<AggregationSpec>) -> CatalogDescriptor {
    let desc = CatalogDescriptor::new("cesm-sample", AssetSpec::with_format("path", DataFormat::Netcdf))
        .with_description("CESM sample inventory")
        .with_attributes(["experiment", "variable", "member_id"]);
    match aggregation {
        Some(spec) => desc.with_aggregation(spec),
        None => desc,
    }
}

fn member_spec() -> AggregationSpec {
    AggregationSpec::new("variable")
        .with_groupby(["experiment"])
        .with_operation(AggregationOperation::join_new("member_id"))
        .with_operation(AggregationOperation::union("variable"))
}

fn catalog(rows: &[[&str; 4]], aggregation: Option<AggregationSpec>) -> Result<Catalog> {
    Ok(Catalog::new(
        descriptor(aggregation),
        inventory(rows)?,
        CatalogOptions::default(),
    )?)
}

fn paths(cat: &Catalog) -> Vec<String> {
    cat.table()
        .rows()
        .filter_map(|row| row.get("path").map(ToString::to_string))
        .collect()
}

#[test]
fn test_search_across_experiments() -> Result<()> {
    let cat = catalog(&cesm_rows(), Some(member_spec()))?;
    let sub = cat.search(&Query::new().with("experiment", ["20C", "RCP85"]).with("variable", "FLNS"))?;
    assert_eq!(
        paths(&sub),
        vec!["20C.FLNS.1.nc", "20C.FLNS.2.nc", "RCP85.FLNS.1.nc", "RCP85.FLNS.2.nc"]
    );
    Ok(())
}

#[test]
fn test_require_all_on_drops_incomplete_experiment() -> Result<()> {
    let cat = catalog(&cesm_rows(), Some(member_spec()))?;
    let query = Query::new()
        .with("variable", ["FLNS", "PRECC"])
        .require_all_on(["experiment"]);
    let sub = cat.search(&query)?;
    assert_eq!(sub.asset_count(), 4);
    assert!(sub.table().rows().all(|row| row.get("experiment") == Some(&Cell::from("20C"))));

    // Without the constraint RCP85 stays
    let loose = cat.search(&Query::new().with("variable", ["FLNS", "PRECC"]))?;
    assert_eq!(loose.asset_count(), 6);
    Ok(())
}

#[test]
fn test_member_and_variable_plan() -> Result<()> {
    let cat = catalog(&cesm_rows(), Some(member_spec()))?;
    let sub = cat.search(&Query::new().with("experiment", "20C"))?;
    let plans = sub.plans()?;
    assert_eq!(plans.keys(), vec!["20C"]);

    let plan = plans.get("20C").ok_or_else(|| anyhow::anyhow!("missing 20C plan"))?;
    assert_eq!(plan.members.len(), 4);
    assert_eq!(plan.operation_kinds(), vec![OperationKind::JoinNew, OperationKind::Union]);
    assert_eq!(plan.operations[0].attribute_name(), "member_id");
    assert_eq!(plan.operations[1].keys, vec![Cell::from("FLNS"), Cell::from("PRECC")]);
    assert!(!plan.is_irregular());
    Ok(())
}

#[test]
fn test_incomplete_group_is_flagged_but_planned() -> Result<()> {
    let rows = [
        ["20C", "FLNS", "1", "a.nc"],
        ["20C", "FLNS", "2", "b.nc"],
        ["20C", "PRECC", "1", "c.nc"],
    ];
    let cat = catalog(&rows, Some(member_spec()))?;
    let plans = cat.plans()?;
    let plan = plans.get("20C").ok_or_else(|| anyhow::anyhow!("missing 20C plan"))?;

    assert!(plan.is_irregular());
    assert!(
        plan.irregularities
            .iter()
            .any(|i| matches!(i, Irregularity::UnevenMembers { attribute, .. } if attribute == "member_id"))
    );
    assert_eq!(plan.operation_kinds(), vec![OperationKind::JoinNew, OperationKind::Union]);
    Ok(())
}

#[test]
fn test_unknown_column_is_an_empty_result() -> Result<()> {
    let cat = catalog(&cesm_rows(), Some(member_spec()))?;
    let sub = cat.search(&Query::new().with("foo", "bar"))?;
    assert_eq!(sub.asset_count(), 0);
    assert!(sub.plans()?.is_empty());
    Ok(())
}

#[test]
fn test_catalog_without_aggregation_plans_each_row() -> Result<()> {
    let cat = catalog(&cesm_rows(), None)?;
    let sub = cat.search(&Query::new().with("variable", "FLNS"))?;
    let plans = sub.plans()?;
    assert_eq!(plans.len(), sub.asset_count());
    for plan in &plans {
        assert_eq!(plan.members.len(), 1);
        assert!(plan.operations.is_empty());
        assert_eq!(plan.assets.len(), 1);
    }
    assert_eq!(cat.key_template(), "experiment.variable.member_id.path");
    Ok(())
}

#[test]
fn test_aggregate_false_plans_each_row() -> Result<()> {
    let cat = catalog(&cesm_rows(), Some(member_spec()))?;
    let plans = cat.plans_without_aggregation()?;
    assert_eq!(plans.len(), 6);
    assert!(plans.iter().all(|p| p.operations.is_empty()));
    Ok(())
}

#[test]
fn test_operation_order_and_pruning_hold_for_every_group() -> Result<()> {
    let rows = [
        ["20C", "FLNS", "1", "a.nc"],
        ["20C", "FLNS", "2", "b.nc"],
        ["20C", "PRECC", "1", "c.nc"],
        ["RCP85", "FLNS", "1", "d.nc"],
        ["RCP85", "PRECC", "1", "e.nc"],
        ["RCP45", "TS", "3", "f.nc"],
    ];
    let spec = AggregationSpec::new("variable")
        .with_groupby(["experiment"])
        .with_operation(AggregationOperation::union("variable"))
        .with_operation(AggregationOperation::join_new("member_id"))
        .with_operation(AggregationOperation::join_existing("path"));
    let cat = catalog(&rows, Some(spec))?;
    let plans = cat.plans()?;
    assert_eq!(plans.keys(), vec!["20C", "RCP85", "RCP45"]);

    for plan in &plans {
        let kinds = plan.operation_kinds();
        let last_existing = kinds.iter().rposition(|k| *k == OperationKind::JoinExisting);
        let first_new = kinds.iter().position(|k| *k == OperationKind::JoinNew);
        if let (Some(existing), Some(new)) = (last_existing, first_new) {
            assert!(existing < new, "join_existing after join_new in {}", plan.key);
        }
        for op in &plan.operations {
            assert!(op.keys.len() > 1, "{} kept a constant attribute", plan.key);
        }
    }

    assert!(plans.get("RCP45").map(|p| p.operations.is_empty()).unwrap_or(false));
    assert_eq!(
        plans.get("RCP85").map(|p| p.operation_kinds()),
        Some(vec![OperationKind::JoinExisting, OperationKind::Union])
    );
    Ok(())
}

#[test]
fn test_iterable_variable_column_records_requested_variables() -> Result<()> {
    let table = InventoryTable::load(
        vec!["experiment".to_string(), "variable".to_string(), "path".to_string()],
        vec![
            vec!["20C".into(), "['FLNS', 'PRECC', 'TS']".into(), "a.zarr".into()],
            vec!["RCP85".into(), "['FLNS', 'TS']".into(), "b.zarr".into()],
        ],
        &["variable".to_string()],
    )?;
    let desc = CatalogDescriptor::new("multi", AssetSpec::with_format("path", DataFormat::Zarr))
        .with_attributes(["experiment", "variable"])
        .with_aggregation(AggregationSpec::new("variable").with_groupby(["experiment"]));
    let options = CatalogOptions::default().with_iterable_columns(["variable"]);
    let cat = Catalog::new(desc, table, options)?;
    assert!(cat.has_multiple_variable_assets());

    let sub = cat.search(&Query::new().with("variable", ["TS", "PRECC"]))?;
    assert_eq!(sub.requested_variables(), ["PRECC", "TS"]);
    assert_eq!(sub.asset_count(), 2);

    let plans = sub.plans()?;
    let plan = plans.get("20C").ok_or_else(|| anyhow::anyhow!("missing 20C plan"))?;
    let attrs = plan.dataset_attributes(cat.options());
    assert_eq!(attrs["intake_esm_vars"], serde_json::json!(["PRECC", "TS"]));
    assert_eq!(attrs["intake_esm_attrs:variable"], serde_json::json!(["FLNS", "PRECC", "TS"]));
    Ok(())
}
