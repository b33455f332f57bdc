//! # Pipeline
//!
//! One batch run over a corrected roster: identifier flagging, matching,
//! canonical resolution, registry linkage and quality scoring. Every stage
//! reads the previous stage's output and builds a new collection, so a failed
//! run leaves the inputs untouched and produces nothing partial.

use crate::error::{ErrorReport, ResolveError};
use crate::linkage::{link_all, LinkageRules, LinkedDataset};
use crate::linker::{build_clusters, PassSummary};
use crate::model::Table;
use crate::ontology::Ontology;
use crate::quality::{round2, score, CorrectionReport, QualityMetrics};
use crate::resolver::{resolve_clusters_at, Resolution};
use crate::validation::{IdentifierSet, ValidationRules};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Artifacts produced upstream of resolution
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    /// Standardized and spelling-corrected roster
    pub roster: Table,
    /// Reference registry per jurisdiction code
    pub registries: BTreeMap<String, Table>,
    pub corrections: Option<CorrectionReport>,
    pub identifiers: Option<IdentifierSet>,
}

/// Immutable rules for a run
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    pub ontology: Ontology,
    pub linkage: LinkageRules,
    pub validation: ValidationRules,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Roster with the identifier validity flag
    pub roster: Table,
    pub passes: Vec<PassSummary>,
    pub resolution: Resolution,
    pub linked: Vec<LinkedDataset>,
    pub quality: QualityMetrics,
    /// Non-fatal conditions: skipped passes and strategies, empty input
    pub warnings: Vec<ErrorReport>,
}

impl PipelineRun {
    pub fn new(ontology: Ontology, linkage: LinkageRules, validation: ValidationRules) -> Self {
        Self {
            ontology,
            linkage,
            validation,
        }
    }

    pub fn execute(&self, inputs: &PipelineInputs) -> Result<PipelineOutput> {
        self.execute_at(inputs, Utc::now())
    }

    /// Run every stage, stamping duplicates with `moved_at`
    #[instrument(skip_all, fields(records = inputs.roster.len()))]
    pub fn execute_at(
        &self,
        inputs: &PipelineInputs,
        moved_at: DateTime<Utc>,
    ) -> Result<PipelineOutput> {
        let corrections = inputs.corrections.as_ref().ok_or_else(|| {
            ResolveError::data_availability("correction report", "run spelling correction first")
        })?;
        let identifiers = inputs.identifiers.as_ref().ok_or_else(|| {
            ResolveError::data_availability("identifier registry", "not loaded")
        })?;

        let mut warnings = Vec::new();
        if inputs.roster.is_empty() {
            let err = ResolveError::empty_input("roster");
            warn!(error = %err, "continuing with empty outputs");
            warnings.push(ErrorReport::from(&err));
        }

        let roster = identifiers.flag_records(&inputs.roster, &self.validation);

        let outcome = build_clusters(&roster, &self.ontology)?;
        warnings.extend(
            outcome
                .passes
                .iter()
                .filter_map(PassSummary::skip_error)
                .map(|err| ErrorReport::from(&err)),
        );

        let resolution = resolve_clusters_at(&roster, &outcome, &self.ontology, moved_at)?;
        info!(
            canonical = resolution.canonical.len(),
            duplicates = resolution.duplicates.len(),
            "deduplication complete"
        );

        let linked = link_all(&resolution.canonical_table(), &inputs.registries, &self.linkage)?;
        warnings.extend(linked.iter().flat_map(|dataset| dataset.skipped.iter().cloned()));

        let quality = score(roster.len(), corrections, resolution.duplicates.len());
        info!(quality_score = quality.quality_score, "run complete");

        Ok(PipelineOutput {
            roster,
            passes: outcome.passes,
            resolution,
            linked,
            quality,
            warnings,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationStats {
    pub initial_rows: usize,
    pub final_rows: usize,
    pub duplicates_removed: usize,
    pub duplicates_count: usize,
    pub removal_percentage: f64,
}

/// Record count after one stage of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub step: String,
    pub records: usize,
    pub description: String,
}

impl PipelineStep {
    fn new(step: &str, records: usize, description: &str) -> Self {
        Self {
            step: step.to_string(),
            records,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionStats {
    pub jurisdiction: String,
    pub candidates: usize,
    pub providers: usize,
    pub exact_matches: usize,
    pub fallback_matches: usize,
    pub status_distribution: BTreeMap<String, usize>,
    pub valid_identifiers: usize,
    pub invalid_identifiers: usize,
}

impl From<&LinkedDataset> for JurisdictionStats {
    fn from(dataset: &LinkedDataset) -> Self {
        Self {
            jurisdiction: dataset.jurisdiction.clone(),
            candidates: dataset.candidates,
            providers: dataset.len(),
            exact_matches: dataset.exact_matches,
            fallback_matches: dataset.fallback_matches,
            status_distribution: dataset.status_distribution.clone(),
            valid_identifiers: dataset.valid_identifiers,
            invalid_identifiers: dataset.invalid_identifiers,
        }
    }
}

/// Identifier validity over all linked providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierValidation {
    pub valid_count: usize,
    pub invalid_count: usize,
    pub total_count: usize,
    pub valid_percentage: f64,
    pub invalid_percentage: f64,
}

/// Serializable statistics of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub deduplication: DeduplicationStats,
    pub pipeline_steps: Vec<PipelineStep>,
    pub passes: Vec<PassSummary>,
    pub jurisdictions: Vec<JurisdictionStats>,
    pub total_providers: usize,
    pub identifier_validation: IdentifierValidation,
    pub quality_metrics: QualityMetrics,
    pub warnings: Vec<ErrorReport>,
}

impl PipelineOutput {
    pub fn report(&self) -> PipelineReport {
        let initial_rows = self.roster.len();
        let final_rows = self.resolution.canonical.len();
        let duplicates_removed = initial_rows - final_rows;
        let total_providers: usize = self.linked.iter().map(LinkedDataset::len).sum();

        let valid_count: usize = self.linked.iter().map(|d| d.valid_identifiers).sum();
        let invalid_count: usize = self.linked.iter().map(|d| d.invalid_identifiers).sum();
        let total_count = valid_count + invalid_count;

        PipelineReport {
            deduplication: DeduplicationStats {
                initial_rows,
                final_rows,
                duplicates_removed,
                duplicates_count: self.resolution.duplicates.len(),
                removal_percentage: percentage(duplicates_removed, initial_rows),
            },
            // Standardization and correction rewrite values but never drop rows
            pipeline_steps: vec![
                PipelineStep::new("Initial Upload", initial_rows, "Raw data uploaded to system"),
                PipelineStep::new(
                    "Standardization",
                    initial_rows,
                    "Name and address standardization",
                ),
                PipelineStep::new(
                    "Misspelling Correction",
                    initial_rows,
                    "Fuzzy matching and correction",
                ),
                PipelineStep::new("Deduplication", final_rows, "Duplicate record removal"),
                PipelineStep::new(
                    "Quality Check",
                    total_providers,
                    "Final quality validation and merging",
                ),
            ],
            passes: self.passes.clone(),
            jurisdictions: self.linked.iter().map(JurisdictionStats::from).collect(),
            total_providers,
            identifier_validation: IdentifierValidation {
                valid_count,
                invalid_count,
                total_count,
                valid_percentage: percentage(valid_count, total_count),
                invalid_percentage: percentage(invalid_count, total_count),
            },
            quality_metrics: self.quality,
            warnings: self.warnings.clone(),
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}
