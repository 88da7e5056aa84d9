//! Catalog options

use serde::{Deserialize, Serialize};

fn default_sep() -> String {
    ".".to_string()
}

fn default_concat_dim() -> String {
    "time".to_string()
}

fn default_attrs_prefix() -> String {
    "intake_esm_attrs".to_string()
}

fn default_dataset_key() -> String {
    "intake_esm_dataset_key".to_string()
}

fn default_vars_key() -> String {
    "intake_esm_vars".to_string()
}

/// Caller-supplied knobs that are not part of the persisted descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOptions {
    /// Separator between group-key values in a key string
    #[serde(default = "default_sep")]
    pub sep: String,

    /// Columns whose cells hold literal collections
    #[serde(default)]
    pub columns_with_iterables: Vec<String>,

    /// Dimension recorded for a `join_existing` operation without a `dim` option
    #[serde(default = "default_concat_dim")]
    pub default_concat_dim: String,

    #[serde(default = "default_attrs_prefix")]
    pub attrs_prefix: String,

    #[serde(default = "default_dataset_key")]
    pub dataset_key: String,

    #[serde(default = "default_vars_key")]
    pub vars_key: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            sep: default_sep(),
            columns_with_iterables: Vec::new(),
            default_concat_dim: default_concat_dim(),
            attrs_prefix: default_attrs_prefix(),
            dataset_key: default_dataset_key(),
            vars_key: default_vars_key(),
        }
    }
}

impl CatalogOptions {
    #[must_use]
    pub fn with_sep<S: Into<String>>(mut self, sep: S) -> Self {
        self.sep = sep.into();
        self
    }

    #[must_use]
    pub fn with_iterable_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns_with_iterables = columns.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let options: CatalogOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CatalogOptions::default());
        assert_eq!(options.sep, ".");
        assert_eq!(options.default_concat_dim, "time");
        assert_eq!(options.vars_key, "intake_esm_vars");
    }

    #[test]
    fn test_partial_override() {
        let options: CatalogOptions =
            serde_json::from_str(r#"{"sep": "/", "columns_with_iterables": ["variable"]}"#).unwrap();
        assert_eq!(options.sep, "/");
        assert_eq!(options.columns_with_iterables, vec!["variable"]);
        assert_eq!(options.attrs_prefix, "intake_esm_attrs");
    }
}
