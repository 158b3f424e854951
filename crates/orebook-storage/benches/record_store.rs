//! Benchmarks for the CSV record store
//!
//! Run with: cargo bench -p orebook-storage

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orebook_core::{EntityKind, Record};
use orebook_storage::{DataDir, RecordStore};
use tempfile::TempDir;

/// Create a sites table with `rows` records
fn seeded_sites(rows: usize) -> (TempDir, RecordStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = RecordStore::for_entity(temp_dir.path(), EntityKind::Sites);

    let records: Vec<Record> = (1..=rows)
        .map(|i| {
            Record::from_pairs([
                ("SiteID", i.to_string()),
                ("SiteName", format!("Site {}", i)),
                ("CountryID", (i % 20 + 1).to_string()),
                ("MineralID", (i % 8 + 1).to_string()),
                ("Latitude", format!("{:.4}", (i % 180) as f64 - 90.0)),
                ("Longitude", format!("{:.4}", (i % 360) as f64 - 180.0)),
                ("Production_tonnes", (i * 10).to_string()),
            ])
        })
        .collect();
    store.save(&records).unwrap();

    (temp_dir, store)
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_store_load");

    for rows in [100, 1_000, 10_000] {
        let (_dir, store) = seeded_sites(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| black_box(store.load().unwrap()));
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_store_insert");

    for rows in [100, 1_000] {
        let (_dir, store) = seeded_sites(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| {
                store
                    .insert_with_next_id(|_, _| {
                        Ok(Record::from_pairs([
                            ("SiteName", "Bench"),
                            ("Latitude", "0"),
                            ("Longitude", "0"),
                        ]))
                    })
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let (dir, _) = DataDir::init(temp_dir.path(), false).unwrap();
    let (_sites_dir, sites) = seeded_sites(5_000);
    dir.store(EntityKind::Sites)
        .save(&sites.load().unwrap())
        .unwrap();

    c.bench_function("load_snapshot_5000_sites", |b| {
        b.iter(|| black_box(dir.load_snapshot().unwrap()));
    });
}

criterion_group!(benches, bench_load, bench_insert, bench_snapshot);
criterion_main!(benches);
