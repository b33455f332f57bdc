//! # Rosterlink
//!
//! Deterministic entity resolution for healthcare provider rosters.
//!
//! A run groups roster rows that describe the same provider with multi-pass
//! blocking over a union-find forest, keeps one canonical record per group
//! with the reasons each duplicate was matched, links canonical records to
//! per-jurisdiction license registries, and scores the run's data quality.
//!
//! ```no_run
//! use rosterlink::{PipelineInputs, PipelineRun};
//!
//! # fn run(inputs: PipelineInputs) -> anyhow::Result<()> {
//! let output = PipelineRun::default().execute(&inputs)?;
//! println!("{}", serde_json::to_string_pretty(&output.report())?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dsu;
pub mod error;
pub mod index;
pub mod linkage;
pub mod linker;
pub mod model;
pub mod ontology;
pub mod pipeline;
pub mod quality;
pub mod resolver;
pub mod validation;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigOverrides, RosterConfig};
pub use dsu::{Cluster, Clusters, DisjointSet};
pub use error::{ErrorKind, ErrorReport, ResolveError};
pub use linkage::{link_all, JoinKey, JurisdictionRule, LinkageRules, LinkedDataset};
pub use linker::{build_clusters, MatchOutcome, PassSummary};
pub use model::{ClusterId, Record, RecordIndex, Table, Value};
pub use ontology::{MatchKey, Ontology};
pub use pipeline::{PipelineInputs, PipelineOutput, PipelineReport, PipelineRun};
pub use quality::{CorrectionReport, QualityMetrics};
pub use resolver::{dedupe, CanonicalRecord, DuplicateRecord, Resolution};
pub use validation::{IdentifierSet, ValidationRules};
