//! Persisted catalog descriptor (ESM collection JSON)

use crate::aggregation::AggregationSpec;
use crate::error::{Error, Result};
use crate::schema::{AssetSpec, AttributeColumn};
use serde::{Deserialize, Serialize};

pub const ESMCAT_VERSION: &str = "0.1.0";

fn default_esmcat_version() -> String {
    ESMCAT_VERSION.to_string()
}

/// Top-level catalog metadata plus a reference to (or inline copy of) the
/// inventory rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDescriptor {
    #[serde(default = "default_esmcat_version")]
    pub esmcat_version: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    #[serde(default)]
    pub attributes: Vec<AttributeColumn>,

    pub assets: AssetSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_control: Option<AggregationSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_dict: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
}

impl CatalogDescriptor {
    pub fn new<S: Into<String>>(id: S, assets: AssetSpec) -> Self {
        Self {
            esmcat_version: default_esmcat_version(),
            id: id.into(),
            description: String::new(),
            title: None,
            last_updated: None,
            attributes: Vec::new(),
            assets,
            aggregation_control: None,
            catalog_file: None,
            catalog_dict: None,
        }
    }

    #[must_use]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = names.into_iter().map(AttributeColumn::new).collect();
        self
    }

    #[must_use]
    pub fn with_aggregation(mut self, spec: AggregationSpec) -> Self {
        self.aggregation_control = Some(spec);
        self
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Structural checks that need no inventory rows
    pub fn validate(&self) -> Result<()> {
        self.assets.validate()?;
        if self.catalog_file.is_some() && self.catalog_dict.is_some() {
            return Err(Error::schema(
                "catalog_file and catalog_dict are mutually exclusive",
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregationOperation;
    use crate::schema::DataFormat;

    const CESM_JSON: &str = r#"{
        "esmcat_version": "0.1.0",
        "id": "aws-cesm1-le",
        "description": "CESM Large Ensemble",
        "catalog_file": "cesm1-le.csv",
        "attributes": [
            {"column_name": "component", "vocabulary": ""},
            {"column_name": "frequency", "vocabulary": ""},
            {"column_name": "experiment", "vocabulary": ""},
            {"column_name": "variable", "vocabulary": ""}
        ],
        "assets": {"column_name": "path", "format": "zarr"},
        "aggregation_control": {
            "variable_column_name": "variable",
            "groupby_attrs": ["component", "experiment", "frequency"],
            "aggregations": [
                {"type": "union", "attribute_name": "variable", "options": {"compat": "override"}}
            ]
        }
    }"#;

    #[test]
    fn test_parse_descriptor() {
        let desc = CatalogDescriptor::from_json(CESM_JSON).unwrap();
        assert_eq!(desc.id, "aws-cesm1-le");
        assert_eq!(desc.assets.format, Some(DataFormat::Zarr));
        assert_eq!(
            desc.attribute_names(),
            vec!["component", "frequency", "experiment", "variable"]
        );
        assert_eq!(desc.catalog_file.as_deref(), Some("cesm1-le.csv"));
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_round_trip_keeps_spec_and_attributes() {
        let desc = CatalogDescriptor::from_json(CESM_JSON).unwrap();
        let json = desc.to_json_pretty().unwrap();
        let back = CatalogDescriptor::from_json(&json).unwrap();

        assert_eq!(back.aggregation_control, desc.aggregation_control);
        assert_eq!(back.attributes, desc.attributes);
        assert_eq!(back, desc);
    }

    #[test]
    fn test_built_descriptor_round_trip() {
        let desc = CatalogDescriptor::new("built", AssetSpec::with_format("path", DataFormat::Netcdf))
            .with_description("built in code")
            .with_attributes(["experiment", "variable", "member_id"])
            .with_aggregation(
                AggregationSpec::new("variable")
                    .with_groupby(["experiment"])
                    .with_operation(AggregationOperation::join_new("member_id"))
                    .with_operation(AggregationOperation::join_existing("time_range").with_option("dim", "time")),
            );
        let back = CatalogDescriptor::from_json(&desc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn test_catalog_file_and_dict_are_exclusive() {
        let mut desc = CatalogDescriptor::from_json(CESM_JSON).unwrap();
        desc.catalog_dict = Some(Vec::new());
        assert!(desc.validate().unwrap_err().is_schema());
    }

    #[test]
    fn test_missing_assets_is_a_parse_error() {
        assert!(CatalogDescriptor::from_json(r#"{"id": "x"}"#).is_err());
    }
}
