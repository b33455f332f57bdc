#[path = "../src/test_support.rs"]
mod test_support;

use std::collections::BTreeMap;

use rosterlink::model::RecordIndex;
use rosterlink::quality::{score, CorrectionReport};
use rosterlink::{build_clusters, dedupe, Ontology, Record, Table, Value};
use test_support::generate_roster;

#[test]
fn canonical_plus_duplicates_covers_input() -> anyhow::Result<()> {
    for seed in [1, 7, 42] {
        let roster = generate_roster(400, 0.3, seed);
        let resolution = dedupe(&roster.table, &Ontology::provider_defaults())?;

        assert_eq!(resolution.input_len(), roster.table.len());
        let mut seen: Vec<RecordIndex> = resolution
            .canonical
            .iter()
            .map(|c| c.index)
            .chain(resolution.duplicates.iter().map(|d| d.index))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), roster.table.len());
    }
    Ok(())
}

#[test]
fn generated_duplicates_land_with_their_source() -> anyhow::Result<()> {
    let roster = generate_roster(300, 0.4, 11);
    let outcome = build_clusters(&roster.table, &Ontology::provider_defaults())?;

    let mut expected: BTreeMap<usize, Vec<u32>> = BTreeMap::new();
    for (row, &source) in roster.source.iter().enumerate() {
        expected.entry(source).or_default().push(row as u32);
    }

    assert_eq!(outcome.clusters.len(), expected.len());
    for members in expected.values() {
        let cluster = outcome
            .clusters
            .cluster_of(RecordIndex(members[0]))
            .expect("every record is clustered");
        let actual: Vec<u32> = cluster.records.iter().map(|r| r.0).collect();
        assert_eq!(&actual, members);
    }
    Ok(())
}

#[test]
fn shared_key_implies_same_cluster() -> anyhow::Result<()> {
    let roster = generate_roster(250, 0.35, 3);
    let ontology = Ontology::provider_defaults();
    let outcome = build_clusters(&roster.table, &ontology)?;

    for key in ontology.match_keys() {
        let fields = key.resolve_fields(&roster.table).expect("generated schema");
        let mut by_key: BTreeMap<Vec<String>, RecordIndex> = BTreeMap::new();
        for (index, record) in roster.table.iter_indexed() {
            let Some(tuple) = record.key_for(&fields) else {
                continue;
            };
            let first = *by_key.entry(tuple).or_insert(index);
            let a = outcome.clusters.cluster_of(first).map(|c| c.id);
            let b = outcome.clusters.cluster_of(index).map(|c| c.id);
            assert_eq!(a, b, "{} and {} share {}", first, index, key.name);
        }
    }
    Ok(())
}

#[test]
fn resolving_canonical_output_is_idempotent() -> anyhow::Result<()> {
    let roster = generate_roster(300, 0.3, 5);
    let ontology = Ontology::provider_defaults();

    let first = dedupe(&roster.table, &ontology)?;
    let second = dedupe(&first.canonical_table(), &ontology)?;

    assert!(second.duplicates.is_empty());
    assert_eq!(second.canonical.len(), first.canonical.len());
    Ok(())
}

#[test]
fn resolution_is_deterministic() -> anyhow::Result<()> {
    let roster = generate_roster(300, 0.3, 9);
    let ontology = Ontology::provider_defaults();

    let first = dedupe(&roster.table, &ontology)?;
    let second = dedupe(&roster.table, &ontology)?;

    let picks = |r: &rosterlink::Resolution| r.canonical.iter().map(|c| c.index).collect::<Vec<_>>();
    assert_eq!(picks(&first), picks(&second));
    let reasons = |r: &rosterlink::Resolution| {
        r.duplicates
            .iter()
            .map(|d| d.duplicate_reason.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(reasons(&first), reasons(&second));
    Ok(())
}

#[test]
fn equally_complete_pair_keeps_first_seen() -> anyhow::Result<()> {
    let row = |id: i64| {
        Record::new()
            .with("provider_id", id)
            .with("first_name", "Jo")
            .with("last_name", "Lee")
            .with("practice_phone", "5551234567")
    };
    let table = Table::from_records(vec![row(10), row(20)]);
    let resolution = dedupe(&table, &Ontology::provider_defaults())?;

    assert_eq!(resolution.canonical.len(), 1);
    assert_eq!(resolution.canonical[0].index, RecordIndex(0));
    let duplicate = &resolution.duplicates[0];
    assert_eq!(duplicate.duplicate_of, Value::from(10i64));
    assert_eq!(duplicate.duplicate_reason, "name_phone");
    Ok(())
}

#[test]
fn duplication_ratio_counts_resolved_duplicates() -> anyhow::Result<()> {
    let row = |id: i64, phone: &str| {
        Record::new()
            .with("provider_id", id)
            .with("first_name", "Jo")
            .with("last_name", "Lee")
            .with("practice_phone", phone)
    };
    let table = Table::from_records(vec![
        row(10, "5551234567"),
        row(20, "5551234567"),
        row(30, "5550000000"),
    ]);
    let resolution = dedupe(&table, &Ontology::provider_defaults())?;
    assert_eq!(resolution.duplicates.len(), 1);

    let metrics = score(table.len(), &CorrectionReport::new(), resolution.duplicates.len());
    assert_eq!(metrics.duplication_ratio, 33.33);
    Ok(())
}

#[test]
fn adjacent_large_license_numbers_stay_apart() -> anyhow::Result<()> {
    let table: Table = serde_json::from_str(
        r#"[{"provider_id":1,"license_number":9007199254740993},
            {"provider_id":2,"license_number":9007199254740992}]"#,
    )?;
    let resolution = dedupe(&table, &Ontology::provider_defaults())?;

    assert_eq!(resolution.canonical.len(), 2);
    assert!(resolution.duplicates.is_empty());
    assert_eq!(
        serde_json::to_string(&resolution.canonical_table())?,
        r#"[{"provider_id":1,"license_number":9007199254740993},{"provider_id":2,"license_number":9007199254740992}]"#
    );
    Ok(())
}

#[test]
fn ratios_stay_in_range() {
    for seed in 0..20u64 {
        let roster = generate_roster(100, 0.5, seed);
        let resolution = dedupe(&roster.table, &Ontology::provider_defaults()).unwrap();
        let corrections = CorrectionReport::from_counts([
            ("first_name", seed * 3),
            ("city", seed),
        ]);
        let metrics = score(roster.table.len(), &corrections, resolution.duplicates.len());

        for value in [
            metrics.misspelling_ratio,
            metrics.duplication_ratio,
            metrics.quality_score,
        ] {
            assert!((0.0..=100.0).contains(&value), "{value} out of range");
        }
    }
}
