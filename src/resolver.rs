//! # Cluster Resolver
//!
//! Picks one canonical record per cluster and classifies the remaining
//! members as duplicates with their match provenance.
//!
//! Canonical selection is deterministic:
//! 1. if the status field exists and any member carries the active status,
//!    only active members are candidates;
//! 2. the candidate with the most non-null fields wins, ties going to the
//!    lowest original record index.

use crate::dsu::Cluster;
use crate::linker::{build_clusters, MatchOutcome};
use crate::model::{ClusterId, Record, RecordIndex, Table, Value};
use crate::ontology::Ontology;
use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Reason used when a duplicate has no direct edge to any cluster member
pub const UNKNOWN_REASON: &str = "unknown";

/// Separator between reason labels in `duplicate_reason`
pub const REASON_SEPARATOR: &str = "|";

pub const DUPLICATE_OF_FIELD: &str = "duplicate_of";
pub const DUPLICATE_REASON_FIELD: &str = "duplicate_reason";
pub const MOVED_AT_FIELD: &str = "moved_at";

/// The representative chosen for a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub cluster_id: ClusterId,
    pub index: RecordIndex,
    pub cluster_size: usize,
    /// Original fields, unchanged
    pub record: Record,
}

/// A non-chosen cluster member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub cluster_id: ClusterId,
    pub index: RecordIndex,
    pub record: Record,
    /// Primary key of the canonical record
    pub duplicate_of: Value,
    /// Sorted, pipe-joined reason labels
    pub duplicate_reason: String,
    pub moved_at: DateTime<Utc>,
}

impl DuplicateRecord {
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.duplicate_reason.split(REASON_SEPARATOR)
    }

    /// Original fields plus the provenance columns
    pub fn to_record(&self) -> Record {
        let mut record = self.record.clone();
        record.set(DUPLICATE_OF_FIELD, self.duplicate_of.clone());
        record.set(DUPLICATE_REASON_FIELD, self.duplicate_reason.clone());
        record.set(
            MOVED_AT_FIELD,
            self.moved_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        record
    }
}

/// Canonical and duplicate collections of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub canonical: Vec<CanonicalRecord>,
    pub duplicates: Vec<DuplicateRecord>,
    /// Schema of the input roster
    pub columns: Vec<String>,
}

impl Resolution {
    /// Number of input records covered; always `canonical + duplicates`
    pub fn input_len(&self) -> usize {
        self.canonical.len() + self.duplicates.len()
    }

    /// Canonical records as a table with the roster schema
    pub fn canonical_table(&self) -> Table {
        Table::with_columns(
            self.columns.clone(),
            self.canonical.iter().map(|c| c.record.clone()).collect(),
        )
    }

    /// Duplicates as a table with the roster schema plus provenance columns
    pub fn duplicates_table(&self) -> Table {
        let mut columns = self.columns.clone();
        for field in [DUPLICATE_OF_FIELD, DUPLICATE_REASON_FIELD, MOVED_AT_FIELD] {
            if !columns.iter().any(|c| c == field) {
                columns.push(field.to_string());
            }
        }
        Table::with_columns(
            columns,
            self.duplicates.iter().map(DuplicateRecord::to_record).collect(),
        )
    }
}

/// Match and resolve `table` in one step, stamping duplicates with the current time
pub fn dedupe(table: &Table, ontology: &Ontology) -> Result<Resolution> {
    let outcome = build_clusters(table, ontology)?;
    resolve_clusters(table, &outcome, ontology)
}

pub fn resolve_clusters(
    table: &Table,
    outcome: &MatchOutcome,
    ontology: &Ontology,
) -> Result<Resolution> {
    resolve_clusters_at(table, outcome, ontology, Utc::now())
}

/// Resolve clusters with an explicit classification timestamp
#[instrument(skip(table, outcome, ontology), fields(clusters = outcome.clusters.len()))]
pub fn resolve_clusters_at(
    table: &Table,
    outcome: &MatchOutcome,
    ontology: &Ontology,
    moved_at: DateTime<Utc>,
) -> Result<Resolution> {
    anyhow::ensure!(
        outcome.clusters.record_count() == table.len(),
        "partition covers {} records but the roster has {}",
        outcome.clusters.record_count(),
        table.len()
    );

    let mut resolution = Resolution {
        canonical: Vec::with_capacity(outcome.clusters.len()),
        duplicates: Vec::with_capacity(table.len() - outcome.clusters.len()),
        columns: table.columns().to_vec(),
    };

    let reasons = outcome.edges.reasons_by_record();
    for cluster in outcome.clusters.iter() {
        let chosen = select_canonical(table, cluster, ontology)?;
        let chosen_record = fetch(table, chosen)?;

        resolution.canonical.push(CanonicalRecord {
            cluster_id: cluster.id,
            index: chosen,
            cluster_size: cluster.len(),
            record: chosen_record.clone(),
        });

        if cluster.is_singleton() {
            continue;
        }

        let duplicate_of = if table.has_column(&ontology.primary_key) {
            chosen_record.value(&ontology.primary_key).clone()
        } else {
            Value::from(chosen.0)
        };

        for &member in cluster.records.iter().filter(|&&m| m != chosen) {
            resolution.duplicates.push(DuplicateRecord {
                cluster_id: cluster.id,
                index: member,
                record: fetch(table, member)?.clone(),
                duplicate_of: duplicate_of.clone(),
                duplicate_reason: duplicate_reason(reasons.get(&member)),
                moved_at,
            });
        }
    }

    debug!(
        canonical = resolution.canonical.len(),
        duplicates = resolution.duplicates.len(),
        "clusters resolved"
    );
    Ok(resolution)
}

/// Choose the canonical member of `cluster`
pub fn select_canonical(
    table: &Table,
    cluster: &Cluster,
    ontology: &Ontology,
) -> Result<RecordIndex> {
    let mut members: Vec<(RecordIndex, &Record)> = cluster
        .records
        .iter()
        .map(|&index| fetch(table, index).map(|record| (index, record)))
        .collect::<Result<_>>()?;
    members.sort_by_key(|(index, _)| *index);

    if table.has_column(&ontology.status_field) {
        let active = Value::from(ontology.active_status.as_str());
        if members
            .iter()
            .any(|(_, record)| record.value(&ontology.status_field) == &active)
        {
            members.retain(|(_, record)| record.value(&ontology.status_field) == &active);
        }
    }

    // max_by_key keeps the last maximum, so compare on reversed index to keep
    // the first-seen record among equally complete ones
    members
        .iter()
        .max_by_key(|(index, record)| (record.non_null_count(), std::cmp::Reverse(*index)))
        .map(|(index, _)| *index)
        .ok_or_else(|| anyhow!("cluster {} has no members", cluster.id))
}

/// Sorted, joined reasons for one duplicate, or the unknown marker
fn duplicate_reason(reasons: Option<&BTreeSet<&str>>) -> String {
    match reasons {
        Some(reasons) if !reasons.is_empty() => {
            reasons.iter().copied().collect::<Vec<_>>().join(REASON_SEPARATOR)
        }
        _ => UNKNOWN_REASON.to_string(),
    }
}

fn fetch(table: &Table, index: RecordIndex) -> Result<&Record> {
    table
        .get(index)
        .ok_or_else(|| anyhow!("record {} not found in roster", index))
}
