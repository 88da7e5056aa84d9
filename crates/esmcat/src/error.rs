// Error types for catalog construction and planning

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort catalog construction or plan setup.
///
/// Queries that match nothing and groups that are not rectangular are not
/// errors; they are reported as data (empty results, flagged plans).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The inventory table or descriptor is inconsistent with the declared schema
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// The aggregation spec references unknown columns or is incomplete
    #[error("Aggregation spec error: {message}")]
    Spec { message: String },

    /// An explicitly requested regular expression failed to compile
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    pub fn schema<S: Into<String>>(message: S) -> Self {
        Error::Schema {
            message: message.into(),
        }
    }

    pub fn spec<S: Into<String>>(message: S) -> Self {
        Error::Spec {
            message: message.into(),
        }
    }

    pub fn missing_column<S: AsRef<str>>(column: S, context: &str) -> Self {
        Error::schema(format!(
            "column '{}' required by {} is not in the inventory header",
            column.as_ref(),
            context
        ))
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Error::Schema { .. })
    }

    pub fn is_spec(&self) -> bool {
        matches!(self, Error::Spec { .. })
    }
}
