/// Errors raised while opening or saving a catalog
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The catalog content violates the schema or aggregation spec
    #[error("Catalog error: {0}")]
    Catalog(#[from] esmcat::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Descriptor JSON could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV inventory could not be read or written
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// The descriptor is well-formed JSON but cannot be used
    #[error("Invalid catalog descriptor: {message}")]
    InvalidDescriptor { message: String },

    /// The inventory file named by `catalog_file` does not exist
    #[error("Catalog file not found: {path}")]
    CatalogFileNotFound { path: String },
}

impl StoreError {
    pub fn invalid_descriptor<S: Into<String>>(message: S) -> Self {
        StoreError::InvalidDescriptor {
            message: message.into(),
        }
    }
}

/// Result type for datastore operations
pub type Result<T> = std::result::Result<T, StoreError>;
