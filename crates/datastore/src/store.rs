//! Opening and saving catalogs
//!
//! A catalog on disk is a JSON descriptor plus its inventory, held either
//! inline (`catalog_dict`) or in a CSV file named by `catalog_file`.

use crate::csv::{CsvOptions, read_inventory, write_inventory};
use crate::error::{Result, StoreError};
use crate::records::{records_from_table, table_from_records};
use diagnostics::*;
use esmcat::{Catalog, CatalogDescriptor, CatalogOptions, InventoryTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffixes of compressed inventory files, which are not readable here
const COMPRESSED_SUFFIXES: &[&str] = &["gz", "bz2", "zip", "xz", "zst"];

const LAST_UPDATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Options for opening a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreOptions {
    #[serde(default)]
    pub catalog: CatalogOptions,

    /// Inventory CSV format
    #[serde(default)]
    pub csv: CsvOptions,
}

impl DatastoreOptions {
    #[must_use]
    pub fn with_catalog(mut self, catalog: CatalogOptions) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_csv(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }
}

/// Where `serialize` puts the inventory rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogType {
    /// Rows inline in the descriptor as `catalog_dict`
    Dict,
    /// Rows in a sibling `<name>.csv` named by `catalog_file`
    File,
}

/// Open a catalog from its JSON descriptor file
pub async fn open<P: AsRef<Path>>(path: P, options: &DatastoreOptions) -> Result<Catalog> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path).await?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    from_json_str(&json, base_dir, options).await
}

/// Open a catalog from descriptor JSON already in memory.
///
/// A relative `catalog_file` that does not exist as given is looked up
/// under `base_dir`.
pub async fn from_json_str(json: &str, base_dir: &Path, options: &DatastoreOptions) -> Result<Catalog> {
    let descriptor = CatalogDescriptor::from_json(json)?;
    descriptor.validate()?;

    let table = load_inventory(&descriptor, base_dir, options).await?;
    let catalog = Catalog::new(descriptor, table, options.catalog.clone())?;

    let id = catalog.descriptor().id.as_str();
    let asset_count = catalog.asset_count();
    info!("opened catalog {id} with {asset_count} assets", id: id, asset_count: asset_count);

    Ok(catalog)
}

async fn load_inventory(
    descriptor: &CatalogDescriptor,
    base_dir: &Path,
    options: &DatastoreOptions,
) -> Result<InventoryTable> {
    let iterable_columns = &options.catalog.columns_with_iterables;
    match (&descriptor.catalog_file, &descriptor.catalog_dict) {
        (Some(file), _) => {
            let path = resolve_catalog_file(file, base_dir).await?;
            let display_path = path.display().to_string();
            debug!("reading inventory from {display_path}", display_path: display_path);
            let bytes = tokio::fs::read(&path).await?;
            read_inventory(&bytes, &options.csv, iterable_columns)
        }
        (None, Some(records)) => table_from_records(records, iterable_columns),
        (None, None) => Err(StoreError::invalid_descriptor(
            "descriptor has neither catalog_file nor catalog_dict",
        )),
    }
}

async fn resolve_catalog_file(file: &str, base_dir: &Path) -> Result<PathBuf> {
    if file.contains("://") {
        return Err(StoreError::invalid_descriptor(format!(
            "remote catalog_file {file} is not supported"
        )));
    }

    let candidate = Path::new(file);
    let extension = candidate
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if COMPRESSED_SUFFIXES.contains(&extension.as_str()) {
        return Err(StoreError::invalid_descriptor(format!(
            "compressed catalog_file {file} is not supported"
        )));
    }
    if extension == "parquet" {
        return Err(StoreError::invalid_descriptor(format!(
            "catalog_file {file} is not a CSV file"
        )));
    }

    if tokio::fs::try_exists(candidate).await? {
        return Ok(candidate.to_path_buf());
    }
    if candidate.is_relative() {
        let joined = base_dir.join(candidate);
        if tokio::fs::try_exists(&joined).await? {
            return Ok(joined);
        }
    }
    Err(StoreError::CatalogFileNotFound {
        path: file.to_string(),
    })
}

/// Write a catalog as `<directory>/<name>.json`, returning that path
pub async fn serialize(
    catalog: &Catalog,
    name: &str,
    directory: &Path,
    catalog_type: CatalogType,
) -> Result<PathBuf> {
    serialize_with_csv(catalog, name, directory, catalog_type, &CsvOptions::default()).await
}

/// Same as [`serialize`], writing any CSV inventory with the given format
pub async fn serialize_with_csv(
    catalog: &Catalog,
    name: &str,
    directory: &Path,
    catalog_type: CatalogType,
    csv: &CsvOptions,
) -> Result<PathBuf> {
    if name.is_empty() {
        return Err(StoreError::invalid_descriptor("catalog name must not be empty"));
    }
    tokio::fs::create_dir_all(directory).await?;

    let mut descriptor = catalog.descriptor().clone();
    descriptor.id = name.to_string();
    descriptor.last_updated = Some(chrono::Utc::now().format(LAST_UPDATED_FORMAT).to_string());
    descriptor.catalog_file = None;
    descriptor.catalog_dict = None;

    match catalog_type {
        CatalogType::File => {
            let csv_path = directory.join(format!("{name}.csv"));
            let bytes = write_inventory(catalog.table(), csv)?;
            tokio::fs::write(&csv_path, bytes).await?;
            descriptor.catalog_file = Some(csv_path.to_string_lossy().into_owned());
        }
        CatalogType::Dict => {
            descriptor.catalog_dict = Some(records_from_table(catalog.table()));
        }
    }

    let json_path = directory.join(format!("{name}.json"));
    tokio::fs::write(&json_path, descriptor.to_json_pretty()?).await?;

    let path = json_path.display().to_string();
    info!("wrote catalog {name} to {path}", name: name, path: path);

    Ok(json_path)
}
