//! # Ontology Module
//!
//! Matching rules for provider rosters: the ordered match keys used by the
//! blocking passes and the fields that drive canonical selection.

use crate::config::defaults::*;
use crate::model::{field_list, Table};
use serde::{Deserialize, Serialize};

/// A match key defines which fields must agree (and be non-null) for two
/// records to be considered the same entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    /// Reason label recorded on every edge this key produces
    pub name: String,
    /// Fields that must all be present in the schema
    pub fields: Vec<String>,
    /// Fields appended to the key only when the schema has them
    #[serde(default)]
    pub optional_fields: Vec<String>,
}

impl MatchKey {
    /// Create a new match key
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            optional_fields: Vec::new(),
        }
    }

    /// Add a field that joins the key only if the input carries it
    pub fn with_optional(mut self, field: impl Into<String>) -> Self {
        self.optional_fields.push(field.into());
        self
    }

    /// Resolve the effective key fields against a table schema.
    ///
    /// Returns the missing required fields as the error value.
    pub fn resolve_fields(&self, table: &Table) -> Result<Vec<String>, Vec<String>> {
        let missing = table.missing_columns(&self.fields);
        if !missing.is_empty() {
            return Err(missing);
        }
        let mut fields = self.fields.clone();
        fields.extend(
            self.optional_fields
                .iter()
                .filter(|f| table.has_column(f))
                .cloned(),
        );
        Ok(fields)
    }
}

/// Matching and canonical-selection rules for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ontology {
    /// Match keys, evaluated in order
    pub match_keys: Vec<MatchKey>,
    /// Business primary key copied into `duplicate_of`
    pub primary_key: String,
    /// Status field consulted by canonical selection
    pub status_field: String,
    /// Status value preferred by canonical selection
    pub active_status: String,
}

impl Ontology {
    /// Rules with no match keys: every record resolves to its own cluster
    pub fn new() -> Self {
        Self {
            match_keys: Vec::new(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            status_field: DEFAULT_STATUS_FIELD.to_string(),
            active_status: DEFAULT_ACTIVE_STATUS.to_string(),
        }
    }

    /// Default provider roster rules: name + phone, license (+ state),
    /// name + education, in that order
    pub fn provider_defaults() -> Self {
        let mut ontology = Self::new();
        for key in default_match_keys() {
            ontology.add_match_key(key);
        }
        ontology
    }

    pub fn add_match_key(&mut self, key: MatchKey) {
        self.match_keys.push(key);
    }

    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }

    pub fn with_status(mut self, field: impl Into<String>, active: impl Into<String>) -> Self {
        self.status_field = field.into();
        self.active_status = active.into();
        self
    }

    pub fn match_keys(&self) -> &[MatchKey] {
        &self.match_keys
    }
}

impl Default for Ontology {
    fn default() -> Self {
        Self::provider_defaults()
    }
}

/// The default match keys in evaluation order
pub fn default_match_keys() -> Vec<MatchKey> {
    vec![
        MatchKey::new(
            REASON_NAME_PHONE,
            field_list(&[FIRST_NAME, LAST_NAME, PRACTICE_PHONE]),
        ),
        MatchKey::new(REASON_LICENSE, field_list(&[LICENSE_NUMBER])).with_optional(LICENSE_STATE),
        MatchKey::new(
            REASON_NAME_EDU,
            field_list(&[FIRST_NAME, LAST_NAME, MEDICAL_SCHOOL, RESIDENCY_PROGRAM]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    #[test]
    fn test_default_key_order() {
        let ontology = Ontology::provider_defaults();
        let names: Vec<_> = ontology.match_keys().iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["name_phone", "license", "name_edu"]);
        assert_eq!(ontology.primary_key, "provider_id");
    }

    #[test]
    fn test_license_key_adds_state_when_present() {
        let key = &default_match_keys()[1];

        let with_state = Table::from_records(vec![Record::new()
            .with("license_number", "A1")
            .with("license_state", "CA")]);
        assert_eq!(
            key.resolve_fields(&with_state).unwrap(),
            vec!["license_number".to_string(), "license_state".to_string()]
        );

        let without_state =
            Table::from_records(vec![Record::new().with("license_number", "A1")]);
        assert_eq!(
            key.resolve_fields(&without_state).unwrap(),
            vec!["license_number".to_string()]
        );
    }

    #[test]
    fn test_missing_required_field_is_reported() {
        let key = &default_match_keys()[0];
        let table = Table::from_records(vec![Record::new()
            .with("first_name", "Jo")
            .with("last_name", "Lee")]);
        assert_eq!(
            key.resolve_fields(&table).unwrap_err(),
            vec!["practice_phone".to_string()]
        );
    }
}
