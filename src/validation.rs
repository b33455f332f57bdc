//! National provider identifier validation.
//!
//! Flags each roster row with whether its identifier appears in the national
//! registry. The flag is computed once on the corrected roster and rides
//! along through resolution and registry linkage.

use crate::config::defaults::{DEFAULT_FLAG_FIELD, DEFAULT_IDENTIFIER_FIELD};
use crate::model::{Record, Table, Value};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Field names used by identifier validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Roster field holding the identifier
    pub identifier_field: String,
    /// Boolean column appended to every row
    pub flag_field: String,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
            flag_field: DEFAULT_FLAG_FIELD.to_string(),
        }
    }
}

/// Set of valid external provider identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    ids: HashSet<String>,
}

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the key text of every non-null value
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        Self {
            ids: values.into_iter().filter_map(Value::key_text).collect(),
        }
    }

    /// Identifiers from one column of a registry table
    pub fn from_column(table: &Table, column: &str) -> Self {
        Self::from_values(table.records().iter().map(|r| r.value(column)))
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn contains(&self, value: &Value) -> bool {
        value.key_text().is_some_and(|id| self.ids.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Copy of `table` with the boolean validity flag appended to every row.
    ///
    /// A roster without the identifier column flags every row invalid.
    pub fn flag_records(&self, table: &Table, rules: &ValidationRules) -> Table {
        if !table.is_empty() && !table.has_column(&rules.identifier_field) {
            warn!(
                field = %rules.identifier_field,
                "identifier column absent; every row flagged invalid"
            );
        }

        let mut columns = table.columns().to_vec();
        if !columns.iter().any(|c| *c == rules.flag_field) {
            columns.push(rules.flag_field.clone());
        }

        let records: Vec<Record> = table
            .records()
            .iter()
            .map(|record| {
                let valid = self.contains(record.value(&rules.identifier_field));
                record.clone().with(rules.flag_field.as_str(), valid)
            })
            .collect();

        Table::with_columns(columns, records)
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for IdentifierSet {
    /// Accepts a list of identifiers given as strings or numbers
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Value>::deserialize(deserializer)?;
        Ok(Self::from_values(values.iter()))
    }
}

/// Count of rows whose flag is set, and of rows whose flag is not
pub fn flag_counts(table: &Table, flag_field: &str) -> (usize, usize) {
    if !table.has_column(flag_field) {
        return (0, 0);
    }
    let valid = table
        .records()
        .iter()
        .filter(|r| r.value(flag_field).as_bool() == Some(true))
        .count();
    (valid, table.len() - valid)
}
