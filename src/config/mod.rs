//! Configuration for rosterlink runs.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (rosterlink.toml)
//! ```toml
//! [matching]
//! primary_key = "provider_id"
//!
//! [[matching.keys]]
//! name = "license"
//! fields = ["license_number"]
//! optional_fields = ["license_state"]
//!
//! [linkage]
//! jurisdiction_field = "practice_state"
//!
//! [inputs]
//! roster = "data/roster.json"
//! corrections = "data/corrections.json"
//! identifiers = "data/npi.json"
//!
//! [inputs.registries]
//! CA = "data/ca_registry.json"
//! NY = "data/ny_registry.json"
//! ```
//!
//! Environment variables use the `ROSTERLINK_` prefix with `__` between
//! nested keys, e.g. `ROSTERLINK_LINKAGE__REGISTRY_SUFFIX=_ref`. Keys read
//! from the environment are lowercased, so `ROSTERLINK_INPUTS__REGISTRIES__CA`
//! loads as `ca`; registry lookup ignores ASCII case for that reason.

pub mod defaults;

pub use defaults::*;

use crate::error::ResolveError;
use crate::linkage::{default_jurisdictions, JurisdictionRule, LinkageRules};
use crate::model::Table;
use crate::ontology::{default_match_keys, MatchKey, Ontology};
use crate::pipeline::{PipelineInputs, PipelineRun};
use crate::quality::CorrectionReport;
use crate::validation::{IdentifierSet, ValidationRules};
use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration for a rosterlink run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Match keys and canonical selection
    pub matching: MatchingConfig,
    /// Registry linkage
    pub linkage: LinkageConfig,
    /// Identifier validation
    pub validation: ValidationRules,
    /// Input artifact locations
    pub inputs: InputsConfig,
}

impl RosterConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - CLI overrides to apply on top
    pub fn load(
        config_path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(RosterConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::new(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with ROSTERLINK_ prefix
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));

        // Layer 3: CLI overrides
        figment = figment.merge(Serialized::defaults(overrides));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment and optional config file only (no CLI overrides)
    pub fn from_env(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }

    /// Reject rule sets that cannot run
    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in &self.matching.keys {
            if key.name.is_empty() {
                return Err(ConfigError::new("match key with an empty name"));
            }
            if key.fields.is_empty() {
                return Err(ConfigError::new(format!(
                    "match key {} has no fields",
                    key.name
                )));
            }
        }

        if self.linkage.registry_suffix.is_empty() {
            return Err(ConfigError::new("registry suffix must not be empty"));
        }

        let mut codes = HashSet::new();
        for rule in &self.linkage.jurisdictions {
            if !codes.insert(rule.code.as_str()) {
                return Err(ConfigError::new(format!(
                    "jurisdiction {} configured twice",
                    rule.code
                )));
            }
            for (strategy, key) in [("exact", &rule.exact), ("fallback", &rule.fallback)] {
                if key.roster_fields.is_empty()
                    || key.roster_fields.len() != key.registry_fields.len()
                {
                    return Err(ConfigError::new(format!(
                        "{} {strategy} join needs paired roster and registry fields",
                        rule.code
                    )));
                }
            }
        }
        Ok(())
    }

    /// Matching and canonical-selection rules
    pub fn ontology(&self) -> Ontology {
        Ontology {
            match_keys: self.matching.keys.clone(),
            primary_key: self.matching.primary_key.clone(),
            status_field: self.matching.status_field.clone(),
            active_status: self.matching.active_status.clone(),
        }
    }

    pub fn linkage_rules(&self) -> LinkageRules {
        LinkageRules {
            jurisdiction_field: self.linkage.jurisdiction_field.clone(),
            preview_field: self.linkage.preview_field.clone(),
            primary_key: self.matching.primary_key.clone(),
            registry_suffix: self.linkage.registry_suffix.clone(),
            registry_status_field: self.linkage.registry_status_field.clone(),
            flag_field: self.validation.flag_field.clone(),
            jurisdictions: self.linkage.jurisdictions.clone(),
        }
    }

    pub fn validation_rules(&self) -> ValidationRules {
        self.validation.clone()
    }

    pub fn pipeline(&self) -> PipelineRun {
        PipelineRun::new(self.ontology(), self.linkage_rules(), self.validation_rules())
    }
}

/// Match keys and canonical selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub primary_key: String,
    pub status_field: String,
    pub active_status: String,
    /// Match keys, evaluated in order
    pub keys: Vec<MatchKey>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            status_field: DEFAULT_STATUS_FIELD.to_string(),
            active_status: DEFAULT_ACTIVE_STATUS.to_string(),
            keys: default_match_keys(),
        }
    }
}

/// Registry linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkageConfig {
    pub jurisdiction_field: String,
    pub preview_field: String,
    pub registry_suffix: String,
    pub registry_status_field: String,
    pub jurisdictions: Vec<JurisdictionRule>,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            jurisdiction_field: DEFAULT_JURISDICTION_FIELD.to_string(),
            preview_field: DEFAULT_PREVIEW_FIELD.to_string(),
            registry_suffix: DEFAULT_REGISTRY_SUFFIX.to_string(),
            registry_status_field: DEFAULT_REGISTRY_STATUS_FIELD.to_string(),
            jurisdictions: default_jurisdictions(),
        }
    }
}

/// JSON input locations.
///
/// The roster and registries are arrays of objects; the correction report is
/// an object of field name to count; the identifier registry is an array of
/// identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    pub roster: Option<PathBuf>,
    /// Registry file per jurisdiction code
    pub registries: BTreeMap<String, PathBuf>,
    pub corrections: Option<PathBuf>,
    pub identifiers: Option<PathBuf>,
}

impl InputsConfig {
    /// Read every configured artifact.
    ///
    /// A missing roster path is an error here; a missing correction report
    /// or identifier registry is left for the pipeline to reject.
    pub fn load(&self) -> anyhow::Result<PipelineInputs> {
        let roster_path = self.roster.as_ref().ok_or_else(|| {
            ResolveError::data_availability("corrected roster", "no roster path configured")
        })?;
        let roster: Table = read_json(roster_path)?;

        let mut registries = BTreeMap::new();
        for (code, path) in &self.registries {
            let registry: Table = read_json(path)?;
            debug!(jurisdiction = %code, records = registry.len(), "loaded registry");
            registries.insert(code.clone(), registry);
        }

        let corrections = self
            .corrections
            .as_deref()
            .map(read_json::<CorrectionReport>)
            .transpose()?;
        let identifiers = self
            .identifiers
            .as_deref()
            .map(read_json::<IdentifierSet>)
            .transpose()?;

        Ok(PipelineInputs {
            roster,
            registries,
            corrections,
            identifiers,
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse {}", path.display()))
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching: Option<MatchingOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<InputsOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrections: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
