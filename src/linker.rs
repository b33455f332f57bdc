//! # Batch Linker Module
//!
//! Multi-pass blocking-and-matching. Each match key partitions the records
//! into blocks; every block with more than one member is unioned in the
//! disjoint-set forest and an edge is logged per unioned pair with the key's
//! reason label. Passes are cumulative, so later keys can bridge clusters
//! formed by earlier ones.
//!
//! Blocking for all passes runs in parallel on a read-only view of the
//! table. Unions are applied by a single writer, one pass at a time in key
//! order.

use crate::dsu::{Clusters, DisjointSet};
use crate::error::ResolveError;
use crate::index::BlockingIndex;
use crate::model::{RecordIndex, Table};
use crate::ontology::{MatchKey, Ontology};
use anyhow::Result;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument, warn};

/// Decision for one match key against a table schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassPlan {
    /// Group on these fields
    Run { fields: Vec<String> },
    /// Required fields are absent; the pass is skipped
    Skip { missing: Vec<String> },
}

/// Decide up front whether `key` can run against `table`
pub fn plan_pass(key: &MatchKey, table: &Table) -> PassPlan {
    match key.resolve_fields(table) {
        Ok(fields) => PassPlan::Run { fields },
        Err(missing) => PassPlan::Skip { missing },
    }
}

/// Two records unioned by one match key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEdge {
    pub a: RecordIndex,
    pub b: RecordIndex,
    pub reason: String,
}

/// All edges of a run, with reasons accumulated per unordered pair
#[derive(Debug, Clone, Default)]
pub struct EdgeLog {
    edges: Vec<MatchEdge>,
    pair_reasons: FxHashMap<(RecordIndex, RecordIndex), BTreeSet<String>>,
}

impl EdgeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, a: RecordIndex, b: RecordIndex, reason: &str) {
        self.pair_reasons
            .entry(ordered_pair(a, b))
            .or_default()
            .insert(reason.to_string());
        self.edges.push(MatchEdge {
            a,
            b,
            reason: reason.to_string(),
        });
    }

    /// Reasons recorded between `a` and `b` in either direction
    pub fn reasons_between(&self, a: RecordIndex, b: RecordIndex) -> Option<&BTreeSet<String>> {
        self.pair_reasons.get(&ordered_pair(a, b))
    }

    /// Reasons touching each record, gathered over all of its partners.
    /// Edges never cross clusters, so this equals the union over its cluster.
    pub fn reasons_by_record(&self) -> FxHashMap<RecordIndex, BTreeSet<&str>> {
        let mut by_record: FxHashMap<RecordIndex, BTreeSet<&str>> = FxHashMap::default();
        for (&(a, b), reasons) in &self.pair_reasons {
            for index in [a, b] {
                by_record
                    .entry(index)
                    .or_default()
                    .extend(reasons.iter().map(String::as_str));
            }
        }
        by_record
    }

    pub fn edges(&self) -> &[MatchEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

fn ordered_pair(a: RecordIndex, b: RecordIndex) -> (RecordIndex, RecordIndex) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Statistics for one matching pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub reason: String,
    /// Effective key fields; empty when the pass was skipped
    pub fields: Vec<String>,
    /// Required fields absent from the schema
    pub missing: Vec<String>,
    /// Blocks with more than one member
    pub groups: usize,
    /// Unions that actually merged two sets
    pub unions: usize,
    pub edges: usize,
}

impl PassSummary {
    pub fn skipped(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Schema error describing why this pass was skipped
    pub fn skip_error(&self) -> Option<ResolveError> {
        self.skipped()
            .then(|| ResolveError::schema(format!("match pass {}", self.reason), self.missing.clone()))
    }
}

/// Final partition of a run plus its match provenance
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub clusters: Clusters,
    pub edges: EdgeLog,
    pub passes: Vec<PassSummary>,
}

impl MatchOutcome {
    /// Unions performed across all passes
    pub fn merges(&self) -> usize {
        self.passes.iter().map(|p| p.unions).sum()
    }
}

/// Single-writer linker that applies blocking passes to one forest
#[derive(Debug, Clone)]
pub struct BatchLinker {
    dsu: DisjointSet,
    edges: EdgeLog,
    passes: Vec<PassSummary>,
}

impl BatchLinker {
    pub fn new(record_count: usize) -> Self {
        Self {
            dsu: DisjointSet::new(record_count),
            edges: EdgeLog::new(),
            passes: Vec::new(),
        }
    }

    /// Union every multi-member block, chaining members to the first one
    pub fn apply_pass(&mut self, key: &MatchKey, index: &BlockingIndex) {
        let mut summary = PassSummary {
            reason: key.name.clone(),
            fields: index.fields().to_vec(),
            missing: Vec::new(),
            groups: 0,
            unions: 0,
            edges: 0,
        };

        for members in index.candidate_groups() {
            summary.groups += 1;
            let base = members[0];
            for &other in &members[1..] {
                if self.dsu.union(base, other) {
                    summary.unions += 1;
                }
                self.edges.record(base, other, &key.name);
                summary.edges += 1;
            }
        }

        debug!(
            reason = %summary.reason,
            groups = summary.groups,
            unions = summary.unions,
            "applied match pass"
        );
        self.passes.push(summary);
    }

    pub fn skip_pass(&mut self, key: &MatchKey, missing: Vec<String>) {
        warn!(reason = %key.name, missing = ?missing, "skipping match pass: key columns absent");
        self.passes.push(PassSummary {
            reason: key.name.clone(),
            fields: Vec::new(),
            missing,
            groups: 0,
            unions: 0,
            edges: 0,
        });
    }

    pub fn finish(mut self) -> MatchOutcome {
        MatchOutcome {
            clusters: self.dsu.clusters(),
            edges: self.edges,
            passes: self.passes,
        }
    }
}

/// Run every match pass of `ontology` over `table` and return the partition.
#[instrument(skip(table, ontology), fields(records = table.len()))]
pub fn build_clusters(table: &Table, ontology: &Ontology) -> Result<MatchOutcome> {
    anyhow::ensure!(
        table.len() <= u32::MAX as usize,
        "roster too large to index: {} records",
        table.len()
    );

    // Blocking is read-only and independent per pass
    let blocked: Vec<(&MatchKey, std::result::Result<BlockingIndex, Vec<String>>)> = ontology
        .match_keys()
        .par_iter()
        .map(|key| {
            let index = match plan_pass(key, table) {
                PassPlan::Run { fields } => Ok(BlockingIndex::build(table, &fields)),
                PassPlan::Skip { missing } => Err(missing),
            };
            (key, index)
        })
        .collect();

    let mut linker = BatchLinker::new(table.len());
    for (key, index) in blocked {
        match index {
            Ok(index) => linker.apply_pass(key, &index),
            Err(missing) => linker.skip_pass(key, missing),
        }
    }

    let outcome = linker.finish();
    debug!(
        clusters = outcome.clusters.len(),
        merges = outcome.merges(),
        "matching complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{field_list, Record, Value};

    fn provider(first: &str, last: &str, phone: Option<&str>, license: Option<&str>) -> Record {
        Record::new()
            .with("first_name", first)
            .with("last_name", last)
            .with("practice_phone", phone)
            .with("license_number", license)
            .with("medical_school", Value::Null)
            .with("residency_program", Value::Null)
    }

    #[test]
    fn test_name_phone_pass_links_pair() {
        let table = Table::from_records(vec![
            provider("Jo", "Lee", Some("5551234567"), None),
            provider("Jo", "Lee", Some("5551234567"), None),
        ]);
        let outcome = build_clusters(&table, &Ontology::provider_defaults()).unwrap();

        assert_eq!(outcome.clusters.len(), 1);
        let reasons = outcome
            .edges
            .reasons_between(RecordIndex(1), RecordIndex(0))
            .unwrap();
        assert_eq!(reasons.iter().collect::<Vec<_>>(), vec!["name_phone"]);
    }

    #[test]
    fn test_passes_are_transitive() {
        // 0~1 on name+phone, 1~2 on license; 0 and 2 share nothing directly
        let table = Table::from_records(vec![
            provider("Jo", "Lee", Some("555"), Some("L-1")),
            provider("Jo", "Lee", Some("555"), Some("L-2")),
            provider("Joe", "Leigh", Some("777"), Some("L-2")),
        ]);
        let outcome = build_clusters(&table, &Ontology::provider_defaults()).unwrap();

        assert_eq!(outcome.clusters.len(), 1);
        assert!(outcome
            .edges
            .reasons_between(RecordIndex(0), RecordIndex(2))
            .is_none());
        assert_eq!(outcome.merges(), 2);
    }

    #[test]
    fn test_missing_columns_skip_pass() {
        let table = Table::from_records(vec![
            Record::new().with("first_name", "Jo").with("last_name", "Lee"),
            Record::new().with("first_name", "Jo").with("last_name", "Lee"),
        ]);
        let outcome = build_clusters(&table, &Ontology::provider_defaults()).unwrap();

        assert_eq!(outcome.clusters.len(), 2);
        assert!(outcome.passes.iter().all(PassSummary::skipped));
        let err = outcome.passes[0].skip_error().unwrap();
        assert!(err.to_string().contains("practice_phone"));
    }

    #[test]
    fn test_reasons_accumulate_across_passes() {
        let table = Table::from_records(vec![
            provider("Jo", "Lee", Some("555"), Some("L-1")),
            provider("Jo", "Lee", Some("555"), Some("L-1")),
        ]);
        let outcome = build_clusters(&table, &Ontology::provider_defaults()).unwrap();

        let reasons = outcome
            .edges
            .reasons_between(RecordIndex(0), RecordIndex(1))
            .unwrap();
        assert_eq!(
            reasons.iter().collect::<Vec<_>>(),
            vec!["license", "name_phone"]
        );
        assert_eq!(outcome.edges.len(), 2);
        assert_eq!(outcome.merges(), 1);
    }

    #[test]
    fn test_reasons_by_record_merges_partners() {
        let mut log = EdgeLog::new();
        log.record(RecordIndex(0), RecordIndex(1), "name_phone");
        log.record(RecordIndex(0), RecordIndex(2), "license");
        log.record(RecordIndex(2), RecordIndex(0), "name_edu");

        let by_record = log.reasons_by_record();
        assert_eq!(
            by_record[&RecordIndex(0)].iter().copied().collect::<Vec<_>>(),
            vec!["license", "name_edu", "name_phone"]
        );
        assert_eq!(
            by_record[&RecordIndex(2)].iter().copied().collect::<Vec<_>>(),
            vec!["license", "name_edu"]
        );
        assert!(!by_record.contains_key(&RecordIndex(3)));
    }

    #[test]
    fn test_block_chains_members_to_first() {
        let key = MatchKey::new("license", field_list(&["license_number"]));
        let table = Table::from_records(vec![
            provider("A", "A", None, Some("L-9")),
            provider("B", "B", None, Some("L-9")),
            provider("C", "C", None, Some("L-9")),
        ]);
        let index = BlockingIndex::build(&table, &key.fields);
        let mut linker = BatchLinker::new(table.len());
        linker.apply_pass(&key, &index);
        let outcome = linker.finish();

        let pairs: Vec<_> = outcome.edges.edges().iter().map(|e| (e.a.0, e.b.0)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2)]);
        assert_eq!(outcome.passes[0].groups, 1);
    }

    #[test]
    fn test_empty_table_yields_no_clusters() {
        let outcome = build_clusters(&Table::new(), &Ontology::provider_defaults()).unwrap();
        assert!(outcome.clusters.is_empty());
        assert!(outcome.edges.is_empty());
    }
}
