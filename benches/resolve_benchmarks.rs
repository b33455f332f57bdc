//! Benchmarks for the matching and resolution hot paths.

#[path = "../src/test_support.rs"]
mod test_support;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeMap;
use std::hint::black_box;
use std::time::Duration;

use rosterlink::dsu::DisjointSet;
use rosterlink::index::BlockingIndex;
use rosterlink::linkage::{link_all, LinkageRules};
use rosterlink::model::{field_list, RecordIndex};
use rosterlink::{build_clusters, dedupe, Ontology};
use test_support::{generate_registry, generate_roster};

// =============================================================================
// DSU BENCHMARKS - Union-Find Operations
// =============================================================================

fn bench_dsu_union_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsu");
    group.sample_size(50);
    group.warm_up_time(Duration::from_millis(500));

    for &count in &[10_000u32, 100_000] {
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::new("chain_union", count), &count, |b, &count| {
            b.iter(|| {
                let mut dsu = DisjointSet::new(count as usize);
                for i in 1..count {
                    dsu.union(RecordIndex(i - 1), RecordIndex(i));
                }
                black_box(dsu.find(RecordIndex(count - 1)))
            })
        });
    }
    group.finish();
}

// =============================================================================
// MATCHING BENCHMARKS
// =============================================================================

fn bench_blocking(c: &mut Criterion) {
    let roster = generate_roster(20_000, 0.2, 42).table;
    let fields = field_list(&["first_name", "last_name", "practice_phone"]);

    c.bench_function("blocking_index_20k", |b| {
        b.iter(|| black_box(BlockingIndex::build(&roster, &fields).len()))
    });
}

fn bench_build_clusters(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_clusters");
    group.sample_size(20);
    let ontology = Ontology::provider_defaults();

    for &count in &[1_000u32, 10_000, 50_000] {
        let roster = generate_roster(count, 0.25, 7).table;
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &roster, |b, roster| {
            b.iter(|| black_box(build_clusters(roster, &ontology).map(|o| o.clusters.len())))
        });
    }
    group.finish();
}

fn bench_dedupe_and_link(c: &mut Criterion) {
    let roster = generate_roster(10_000, 0.25, 13).table;
    let ontology = Ontology::provider_defaults();
    let rules = LinkageRules::provider_defaults();
    let registries = BTreeMap::from([
        ("CA".to_string(), generate_registry(&roster, "CA", 1)),
        ("NY".to_string(), generate_registry(&roster, "NY", 2)),
    ]);

    c.bench_function("dedupe_10k", |b| {
        b.iter(|| black_box(dedupe(&roster, &ontology).map(|r| r.canonical.len())))
    });

    let canonical = match dedupe(&roster, &ontology) {
        Ok(resolution) => resolution.canonical_table(),
        Err(err) => panic!("dedupe failed: {err:#}"),
    };
    c.bench_function("link_all_10k", |b| {
        b.iter(|| black_box(link_all(&canonical, &registries, &rules).map(|l| l.len())))
    });
}

criterion_group!(
    benches,
    bench_dsu_union_find,
    bench_blocking,
    bench_build_clusters,
    bench_dedupe_and_link
);
criterion_main!(benches);
