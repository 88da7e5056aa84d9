//! Opening and saving ESM catalogs
//!
//! [`open`] reads a JSON catalog descriptor and its inventory (a CSV file
//! named by `catalog_file`, or inline `catalog_dict` rows) into an
//! [`esmcat::Catalog`]. [`serialize`] writes a catalog back out in either
//! form.

pub mod csv;
pub mod error;
pub mod records;
pub mod store;

pub use csv::{CsvOptions, format_inventory, inventory_batch, read_inventory, write_inventory};
pub use error::{Result, StoreError};
pub use records::{Record, records_from_table, table_from_records};
pub use store::{CatalogType, DatastoreOptions, from_json_str, open, serialize, serialize_with_csv};
