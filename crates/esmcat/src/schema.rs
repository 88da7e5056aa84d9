//! Attribute schema and asset descriptor of a catalog

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Declares one inventory column and, optionally, its controlled vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeColumn {
    #[serde(rename = "column_name")]
    pub name: String,

    #[serde(
        rename = "vocabulary",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub vocabulary_url: Option<String>,
}

impl AttributeColumn {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            vocabulary_url: None,
        }
    }

    #[must_use]
    pub fn with_vocabulary<S: Into<String>>(mut self, url: S) -> Self {
        self.vocabulary_url = Some(url.into());
        self
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// File format of the assets named by the location column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Netcdf,
    Zarr,
    Zarr2,
    Zarr3,
    Opendap,
    Reference,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Netcdf => "netcdf",
            DataFormat::Zarr => "zarr",
            DataFormat::Zarr2 => "zarr2",
            DataFormat::Zarr3 => "zarr3",
            DataFormat::Opendap => "opendap",
            DataFormat::Reference => "reference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "netcdf" => Some(DataFormat::Netcdf),
            "zarr" => Some(DataFormat::Zarr),
            "zarr2" => Some(DataFormat::Zarr2),
            "zarr3" => Some(DataFormat::Zarr3),
            "opendap" => Some(DataFormat::Opendap),
            "reference" => Some(DataFormat::Reference),
            _ => None,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which column holds the asset location and how its format is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    #[serde(rename = "column_name")]
    pub location_column: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormat>,

    #[serde(
        rename = "format_column_name",
        alias = "format_column",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub format_column: Option<String>,
}

impl AssetSpec {
    /// Assets of a single, catalog-wide format
    pub fn with_format<S: Into<String>>(location_column: S, format: DataFormat) -> Self {
        Self {
            location_column: location_column.into(),
            format: Some(format),
            format_column: None,
        }
    }

    /// Assets whose format is read per row from `format_column`
    pub fn with_format_column<S: Into<String>, F: Into<String>>(location_column: S, format_column: F) -> Self {
        Self {
            location_column: location_column.into(),
            format: None,
            format_column: Some(format_column.into()),
        }
    }

    /// Assets of unspecified, assumed uniform format
    pub fn unformatted<S: Into<String>>(location_column: S) -> Self {
        Self {
            location_column: location_column.into(),
            format: None,
            format_column: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.location_column.is_empty() {
            return Err(Error::schema("assets.column_name must not be empty"));
        }
        if self.format.is_some() && self.format_column.is_some() {
            return Err(Error::schema(format!(
                "assets for '{}' set both format and format_column_name; pick one",
                self.location_column
            )));
        }
        Ok(())
    }
}
