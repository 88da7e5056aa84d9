//! Derived variables.
//!
//! A derived variable is computed from other variables after a group's
//! assets have been combined. The planning core only needs each derived
//! variable's input query; the transform itself runs on the caller's dataset
//! type through [`DerivedVariableRegistry::update_datasets`].

use crate::query::Query;
use crate::value::Value;
use diagnostics::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Transform<D> = Arc<dyn Fn(&D) -> Result<D, BoxError> + Send + Sync>;

/// Dataset type a derived-variable transform operates on
pub trait DerivedDataset {
    fn has_variable(&self, name: &str) -> bool;
}

/// A derivation failed
#[derive(Debug, thiserror::Error)]
#[error("Unable to derive variable {variable} with dependent variables {dependents:?}: {source}")]
pub struct DerivedVariableError {
    pub variable: String,
    pub dependents: Vec<String>,
    #[source]
    pub source: BoxError,
}

/// Name and input query of a derived variable, independent of dataset type
#[derive(Debug, Clone)]
pub struct DerivedRequirement {
    pub variable: String,
    pub query: Query,
}

impl DerivedRequirement {
    pub fn dependent_variables(&self, variable_column: &str) -> Vec<String> {
        dependent_variables(&self.query, variable_column)
    }
}

fn dependent_variables(query: &Query, variable_column: &str) -> Vec<String> {
    query
        .get(variable_column)
        .map(|p| {
            p.literals()
                .into_iter()
                .map(|v| match v {
                    Value::Str(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct DerivedVariable<D> {
    pub variable: String,
    pub query: Query,
    /// Recompute even when the dataset already holds the variable
    pub prefer_derived: bool,
    func: Transform<D>,
}

impl<D> DerivedVariable<D> {
    pub fn new<S, F>(variable: S, query: Query, func: F) -> Self
    where
        S: Into<String>,
        F: Fn(&D) -> Result<D, BoxError> + Send + Sync + 'static,
    {
        Self {
            variable: variable.into(),
            query,
            prefer_derived: false,
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub fn prefer_derived(mut self, prefer: bool) -> Self {
        self.prefer_derived = prefer;
        self
    }

    pub fn dependent_variables(&self, variable_column: &str) -> Vec<String> {
        dependent_variables(&self.query, variable_column)
    }

    pub fn requirement(&self) -> DerivedRequirement {
        DerivedRequirement {
            variable: self.variable.clone(),
            query: self.query.clone(),
        }
    }

    pub fn apply(&self, dataset: &D, variable_column: &str) -> Result<D, DerivedVariableError> {
        (self.func)(dataset).map_err(|source| DerivedVariableError {
            variable: self.variable.clone(),
            dependents: self.dependent_variables(variable_column),
            source,
        })
    }
}

impl<D> Clone for DerivedVariable<D> {
    fn clone(&self) -> Self {
        Self {
            variable: self.variable.clone(),
            query: self.query.clone(),
            prefer_derived: self.prefer_derived,
            func: Arc::clone(&self.func),
        }
    }
}

impl<D> fmt::Debug for DerivedVariable<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedVariable")
            .field("variable", &self.variable)
            .field("query", &self.query)
            .field("prefer_derived", &self.prefer_derived)
            .finish_non_exhaustive()
    }
}

/// Derived variables by name
pub struct DerivedVariableRegistry<D> {
    entries: BTreeMap<String, DerivedVariable<D>>,
}

impl<D> Default for DerivedVariableRegistry<D> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<D> Clone for DerivedVariableRegistry<D> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<D> fmt::Debug for DerivedVariableRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<D> DerivedVariableRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a derived variable, returning any previous definition
    pub fn register(&mut self, derived: DerivedVariable<D>) -> Option<DerivedVariable<D>> {
        self.entries.insert(derived.variable.clone(), derived)
    }

    pub fn get(&self, variable: &str) -> Option<&DerivedVariable<D>> {
        self.entries.get(variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.entries.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedVariable<D>> {
        self.entries.values()
    }

    /// Sub-registry holding only the named variables
    pub fn search<S: AsRef<str>>(&self, variables: &[S]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(name, _)| variables.iter().any(|v| v.as_ref() == name.as_str()))
                .map(|(name, derived)| (name.clone(), derived.clone()))
                .collect(),
        }
    }

    pub fn requirements(&self) -> Vec<DerivedRequirement> {
        self.entries.values().map(DerivedVariable::requirement).collect()
    }
}

impl<D: DerivedDataset> DerivedVariableRegistry<D> {
    /// Add derived variables to every dataset holding all of their inputs.
    ///
    /// A variable already present is only recomputed when `prefer_derived`
    /// is set. With `skip_on_error` a failed derivation leaves the dataset as
    /// it was.
    pub fn update_datasets(
        &self,
        mut datasets: BTreeMap<String, D>,
        variable_column: &str,
        skip_on_error: bool,
    ) -> Result<BTreeMap<String, D>, DerivedVariableError> {
        for (key, dataset) in datasets.iter_mut() {
            for derived in self.entries.values() {
                let inputs_present = derived
                    .dependent_variables(variable_column)
                    .iter()
                    .all(|v| dataset.has_variable(v));
                let wanted = !dataset.has_variable(&derived.variable) || derived.prefer_derived;
                if !(inputs_present && wanted) {
                    continue;
                }

                match derived.apply(dataset, variable_column) {
                    Ok(updated) => *dataset = updated,
                    Err(err) if skip_on_error => {
                        let variable = derived.variable.as_str();
                        let reason = err.to_string();
                        warn!(
                            "skipping derived variable {variable} for {key}: {reason}",
                            variable: variable,
                            key: key.as_str(),
                            reason: reason
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(datasets)
    }
}
