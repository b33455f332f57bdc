//! # Reference Linkage Engine
//!
//! Links canonical roster records to per-jurisdiction reference registries.
//! Every jurisdiction is joined twice: an exact strategy on the license
//! number and a fallback strategy on a jurisdiction-specific identity
//! composite. Both joins are inner joins; their results are concatenated
//! (exact first) and reduced to the first row per roster primary key.
//! Canonical records that neither strategy matches are dropped.
//!
//! Registry columns are namespaced with a suffix before joining so registry
//! fields never collide with roster fields.

use crate::config::defaults::*;
use crate::error::{ErrorReport, ResolveError};
use crate::index::{extract_key, BlockingIndex};
use crate::model::{field_list, Record, RecordIndex, Table, Value};
use crate::validation::flag_counts;
use anyhow::Result;
use hashbrown::HashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Paired roster and registry fields of one join strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKey {
    pub roster_fields: Vec<String>,
    /// Registry fields before namespacing
    pub registry_fields: Vec<String>,
}

impl JoinKey {
    pub fn new(roster_fields: Vec<String>, registry_fields: Vec<String>) -> Self {
        Self {
            roster_fields,
            registry_fields,
        }
    }

    /// Join on identically named fields
    pub fn same(fields: Vec<String>) -> Self {
        Self {
            registry_fields: fields.clone(),
            roster_fields: fields,
        }
    }

    /// Registry fields after namespacing with `suffix`
    pub fn namespaced_registry_fields(&self, suffix: &str) -> Vec<String> {
        self.registry_fields
            .iter()
            .map(|field| namespaced(field, suffix))
            .collect()
    }
}

/// Join strategies for one jurisdiction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionRule {
    /// Value of the roster jurisdiction field, e.g. `"CA"`
    pub code: String,
    pub exact: JoinKey,
    pub fallback: JoinKey,
}

impl JurisdictionRule {
    /// Rule with the default license-number exact join
    pub fn with_fallback(code: impl Into<String>, fallback: JoinKey) -> Self {
        Self {
            code: code.into(),
            exact: JoinKey::same(field_list(&[LICENSE_NUMBER])),
            fallback,
        }
    }
}

/// Rules shared by every jurisdiction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkageRules {
    pub jurisdiction_field: String,
    /// Partition field for [`merge_preview`], which splits on the license
    /// state rather than the practice state
    pub preview_field: String,
    /// Roster key used to drop rows matched by both strategies
    pub primary_key: String,
    pub registry_suffix: String,
    /// Registry status column, before namespacing
    pub registry_status_field: String,
    /// Identifier validity flag carried on roster rows
    pub flag_field: String,
    pub jurisdictions: Vec<JurisdictionRule>,
}

impl LinkageRules {
    /// CA and NY with their registry fallback composites
    pub fn provider_defaults() -> Self {
        Self {
            jurisdiction_field: DEFAULT_JURISDICTION_FIELD.to_string(),
            preview_field: DEFAULT_PREVIEW_FIELD.to_string(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            registry_suffix: DEFAULT_REGISTRY_SUFFIX.to_string(),
            registry_status_field: DEFAULT_REGISTRY_STATUS_FIELD.to_string(),
            flag_field: DEFAULT_FLAG_FIELD.to_string(),
            jurisdictions: default_jurisdictions(),
        }
    }

    pub fn jurisdiction(&self, code: &str) -> Option<&JurisdictionRule> {
        self.jurisdictions.iter().find(|rule| rule.code == code)
    }
}

impl Default for LinkageRules {
    fn default() -> Self {
        Self::provider_defaults()
    }
}

pub fn default_jurisdictions() -> Vec<JurisdictionRule> {
    vec![
        JurisdictionRule::with_fallback(
            "CA",
            JoinKey::same(field_list(&[
                FIRST_NAME,
                LAST_NAME,
                MEDICAL_SCHOOL,
                RESIDENCY_PROGRAM,
            ])),
        ),
        JurisdictionRule::with_fallback(
            "NY",
            JoinKey::new(
                field_list(&[FIRST_NAME, LAST_NAME, MEDICAL_SCHOOL, HOUSE_NUMBER]),
                field_list(&[FIRST_NAME, LAST_NAME, MEDICAL_SCHOOL, REGISTRY_HOUSE_NUMBER]),
            ),
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    Exact,
    Fallback,
}

impl JoinStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinStrategy::Exact => "exact",
            JoinStrategy::Fallback => "fallback",
        }
    }
}

/// Registry-confirmed providers for one jurisdiction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedDataset {
    pub jurisdiction: String,
    /// Roster fields followed by namespaced registry fields
    pub records: Table,
    /// Canonical records in this jurisdiction before joining
    pub candidates: usize,
    /// Rows produced by the exact join
    pub exact_matches: usize,
    /// Rows produced by the fallback join
    pub fallback_matches: usize,
    /// Strategies skipped because their columns were absent
    pub skipped: Vec<ErrorReport>,
    /// Value counts of the namespaced registry status column
    pub status_distribution: BTreeMap<String, usize>,
    pub valid_identifiers: usize,
    pub invalid_identifiers: usize,
}

impl LinkedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `column` with `suffix` appended unless it already ends with it
pub fn namespaced(column: &str, suffix: &str) -> String {
    if column.ends_with(suffix) {
        column.to_string()
    } else {
        format!("{column}{suffix}")
    }
}

/// Rename every registry column with the namespace suffix
pub fn namespace_columns(registry: &Table, suffix: &str) -> Table {
    registry.rename_columns(|column| namespaced(column, suffix))
}

/// Partition `table` by the value of `field`.
///
/// Rows with a null jurisdiction belong to no partition. Each partition keeps
/// the source schema.
pub fn split_by_jurisdiction(table: &Table, field: &str) -> Result<BTreeMap<String, Table>> {
    if table.is_empty() {
        return Ok(BTreeMap::new());
    }
    if !table.has_column(field) {
        return Err(ResolveError::data_availability(
            format!("jurisdiction field {field}"),
            "absent from the canonical records",
        )
        .into());
    }

    let mut partitions: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in table.records() {
        if let Some(code) = record.value(field).key_text() {
            partitions.entry(code).or_default().push(record.clone());
        }
    }

    Ok(partitions
        .into_iter()
        .map(|(code, records)| (code, Table::with_columns(table.columns().to_vec(), records)))
        .collect())
}

/// Rows of `table` whose jurisdiction equals `code`
fn jurisdiction_rows(table: &Table, field: &str, code: &str) -> Table {
    table.filter(|record| record.value(field).key_text().as_deref() == Some(code))
}

/// One row of an inner join, identified by its roster position
struct JoinedRow {
    roster: RecordIndex,
    record: Record,
}

/// Inner join of `roster` with an already namespaced `registry`.
///
/// Output follows roster order, then registry order within a roster row.
/// Null key components never join.
fn inner_join(
    roster: &Table,
    registry: &Table,
    roster_fields: &[String],
    registry_fields: &[String],
) -> Vec<JoinedRow> {
    let index = BlockingIndex::build(registry, registry_fields);
    let mut rows = Vec::new();

    for (position, record) in roster.iter_indexed() {
        let Some(key) = extract_key(record, roster_fields) else {
            continue;
        };
        for &matched in index.lookup(&key) {
            if let Some(reference) = registry.get(matched) {
                let mut joined = record.clone();
                joined.extend_from(reference);
                rows.push(JoinedRow {
                    roster: position,
                    record: joined,
                });
            }
        }
    }
    rows
}

/// Identity used to keep the first joined row per roster record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Primary(Option<String>),
    Position(RecordIndex),
}

/// Check that a strategy's columns exist on both sides
fn plan_strategy(
    strategy: JoinStrategy,
    code: &str,
    roster: &Table,
    registry: &Table,
    roster_fields: &[String],
    registry_fields: &[String],
) -> std::result::Result<(), ResolveError> {
    let mut missing = roster.missing_columns(roster_fields);
    missing.extend(registry.missing_columns(registry_fields));
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ResolveError::schema(
            format!("{code} {} join", strategy.as_str()),
            missing,
        ))
    }
}

/// Link the canonical records of one jurisdiction to its registry
#[instrument(skip(canonical, registry, rules), fields(jurisdiction = %rule.code))]
pub fn link_jurisdiction(
    canonical: &Table,
    registry: &Table,
    rule: &JurisdictionRule,
    rules: &LinkageRules,
) -> Result<LinkedDataset> {
    let roster = jurisdiction_rows(canonical, &rules.jurisdiction_field, &rule.code);
    let registry = namespace_columns(registry, &rules.registry_suffix);

    let strategies = [
        (JoinStrategy::Exact, &rule.exact),
        (JoinStrategy::Fallback, &rule.fallback),
    ];
    let mut skipped = Vec::new();
    let mut joined = Vec::new();
    let mut exact_matches = 0;
    let mut fallback_matches = 0;

    for (strategy, key) in strategies {
        let registry_fields = key.namespaced_registry_fields(&rules.registry_suffix);
        if let Err(err) = plan_strategy(
            strategy,
            &rule.code,
            &roster,
            &registry,
            &key.roster_fields,
            &registry_fields,
        ) {
            // An empty partition has no schema to check against
            if !roster.is_empty() {
                warn!(strategy = strategy.as_str(), error = %err, "skipping join strategy");
                skipped.push(err);
            }
            continue;
        }

        let rows = inner_join(&roster, &registry, &key.roster_fields, &registry_fields);
        match strategy {
            JoinStrategy::Exact => exact_matches = rows.len(),
            JoinStrategy::Fallback => fallback_matches = rows.len(),
        }
        joined.extend(rows);
    }

    if skipped.len() == strategies.len() {
        let missing = skipped
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ResolveError::data_availability(
            format!("{} registry join keys", rule.code),
            missing,
        )
        .into());
    }

    let has_primary_key = roster.has_column(&rules.primary_key);
    let mut seen: HashSet<RowKey> = HashSet::new();
    let mut records = Vec::new();
    for row in joined {
        let key = if has_primary_key {
            let position = row.roster;
            RowKey::Primary(
                roster
                    .get(position)
                    .and_then(|r| r.value(&rules.primary_key).key_text()),
            )
        } else {
            RowKey::Position(row.roster)
        };
        if seen.insert(key) {
            records.push(row.record);
        }
    }

    let mut columns = roster.columns().to_vec();
    columns.extend(registry.columns().iter().cloned());
    let records = Table::with_columns(columns, records);

    let status_field = namespaced(&rules.registry_status_field, &rules.registry_suffix);
    let status_distribution = records.value_counts(&status_field);
    let (valid_identifiers, invalid_identifiers) = flag_counts(&records, &rules.flag_field);

    debug!(
        candidates = roster.len(),
        exact = exact_matches,
        fallback = fallback_matches,
        linked = records.len(),
        "jurisdiction linked"
    );

    Ok(LinkedDataset {
        jurisdiction: rule.code.clone(),
        candidates: roster.len(),
        records,
        exact_matches,
        fallback_matches,
        skipped: skipped.iter().map(ErrorReport::from).collect(),
        status_distribution,
        valid_identifiers,
        invalid_identifiers,
    })
}

/// Link every configured jurisdiction in parallel.
///
/// Fails if the canonical table lacks the jurisdiction field or a
/// configured jurisdiction has no registry.
#[instrument(skip_all, fields(records = canonical.len(), jurisdictions = rules.jurisdictions.len()))]
pub fn link_all(
    canonical: &Table,
    registries: &BTreeMap<String, Table>,
    rules: &LinkageRules,
) -> Result<Vec<LinkedDataset>> {
    if !canonical.is_empty() && !canonical.has_column(&rules.jurisdiction_field) {
        return Err(ResolveError::data_availability(
            format!("jurisdiction field {}", rules.jurisdiction_field),
            "absent from the canonical records",
        )
        .into());
    }

    let missing: Vec<&str> = rules
        .jurisdictions
        .iter()
        .filter(|rule| registry_for(registries, &rule.code).is_none())
        .map(|rule| rule.code.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ResolveError::data_availability(
            format!("{} registry", missing.join(", ")),
            "not loaded",
        )
        .into());
    }

    let linked = rules
        .jurisdictions
        .par_iter()
        .map(|rule| {
            let registry = registry_for(registries, &rule.code)
                .ok_or_else(|| ResolveError::data_availability(format!("{} registry", rule.code), "not loaded"))?;
            link_jurisdiction(canonical, registry, rule, rules)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        linked = linked.iter().map(LinkedDataset::len).sum::<usize>(),
        "registry linkage complete"
    );
    Ok(linked)
}

/// Registry loaded under `code`. Environment-sourced config lowercases map
/// keys, so a key that only differs in ASCII case is accepted too.
fn registry_for<'a>(registries: &'a BTreeMap<String, Table>, code: &str) -> Option<&'a Table> {
    registries.get(code).or_else(|| {
        registries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(code))
            .map(|(_, registry)| registry)
    })
}

/// Left join of one jurisdiction's roster rows with its registry on the
/// exact key. Rows are selected by `rules.preview_field`.
///
/// Every roster row is kept; rows without a registry match carry null
/// registry columns. A roster row with several registry matches appears
/// once per match.
pub fn merge_preview(
    roster: &Table,
    registry: &Table,
    rule: &JurisdictionRule,
    rules: &LinkageRules,
) -> Result<Table> {
    let partition = jurisdiction_rows(roster, &rules.preview_field, &rule.code);
    let registry = namespace_columns(registry, &rules.registry_suffix);
    let registry_fields = rule.exact.namespaced_registry_fields(&rules.registry_suffix);

    if !partition.is_empty() {
        plan_strategy(
            JoinStrategy::Exact,
            &rule.code,
            &partition,
            &registry,
            &rule.exact.roster_fields,
            &registry_fields,
        )?;
    }

    let index = BlockingIndex::build(&registry, &registry_fields);
    let mut columns = partition.columns().to_vec();
    columns.extend(registry.columns().iter().cloned());

    let mut records = Vec::with_capacity(partition.len());
    for record in partition.records() {
        let matches = extract_key(record, &rule.exact.roster_fields)
            .map(|key| index.lookup(&key))
            .unwrap_or(&[]);

        if matches.is_empty() {
            let mut row = record.clone();
            for column in registry.columns() {
                row.set(column.as_str(), Value::Null);
            }
            records.push(row);
            continue;
        }

        for &matched in matches {
            let mut row = record.clone();
            if let Some(reference) = registry.get(matched) {
                row.extend_from(reference);
            }
            records.push(row);
        }
    }

    Ok(Table::with_columns(columns, records))
}
