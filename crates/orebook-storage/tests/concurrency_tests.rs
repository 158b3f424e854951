//! Concurrent writer tests for the Orebook data directory
//!
//! Small workloads run by default; set `STRESS_TEST_WRITERS` to raise the
//! writer count.

use orebook_core::record::FieldValues;
use orebook_core::{EntityKind, Role};
use orebook_storage::Catalog;
use std::collections::HashSet;
use tempfile::TempDir;

fn writer_count() -> usize {
    std::env::var("STRESS_TEST_WRITERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8)
}

fn country(name: &str) -> FieldValues {
    let mut values = FieldValues::new();
    values.insert("CountryName".to_string(), name.to_string());
    values.insert("GDP_BillionUSD".to_string(), "1".to_string());
    values
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_never_lose_updates() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let catalog = Catalog::open(temp_dir.path())
        .await
        .expect("failed to open catalog");

    let writers = writer_count();
    let per_writer = 5;

    let mut handles = Vec::new();
    for w in 0..writers {
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..per_writer {
                catalog
                    .create(EntityKind::Countries, country(&format!("C-{}-{}", w, i)))
                    .await
                    .expect("create failed");
            }
        }));
    }
    for handle in handles {
        handle.await.expect("writer panicked");
    }

    // Writes reload on their own; no manual reload before asserting
    let snapshot = catalog.snapshot();
    let rows = snapshot.records(EntityKind::Countries);
    assert_eq!(rows.len(), writers * per_writer);

    let ids: HashSet<i64> = rows.iter().filter_map(|r| r.integer("CountryID")).collect();
    assert_eq!(ids.len(), rows.len(), "identifiers must be unique");
    assert_eq!(ids.iter().max().copied(), Some((writers * per_writer) as i64));
}

fn mineral(name: &str) -> FieldValues {
    let mut values = FieldValues::new();
    values.insert("MineralName".to_string(), name.to_string());
    values
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshot_matches_disk_after_concurrent_writes() {
    let writers = writer_count();
    let per_writer = 5;

    for round in 0..10 {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let catalog = Catalog::open(temp_dir.path())
            .await
            .expect("failed to open catalog");

        let mut handles = Vec::new();
        for w in 0..writers {
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..per_writer {
                    let name = format!("R{}-{}-{}", round, w, i);
                    let (kind, values) = if w % 2 == 0 {
                        (EntityKind::Countries, country(&name))
                    } else {
                        (EntityKind::Minerals, mineral(&name))
                    };
                    catalog.create(kind, values).await.expect("create failed");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("writer panicked");
        }

        let snapshot = catalog.snapshot();
        for kind in [EntityKind::Countries, EntityKind::Minerals] {
            let on_disk = catalog.data_dir().store(kind).load().expect("load failed");
            assert_eq!(
                snapshot.count(kind),
                on_disk.len(),
                "round {}: snapshot is behind the {} file",
                round,
                kind
            );
        }
        assert_eq!(
            snapshot.count(EntityKind::Countries) + snapshot.count(EntityKind::Minerals),
            writers * per_writer
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_audit_appends_and_clear() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let catalog = Catalog::open(temp_dir.path())
        .await
        .expect("failed to open catalog");

    let mut handles = Vec::new();
    for w in 0..writer_count() {
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                catalog
                    .append_audit(orebook_core::audit::AuditEntry::new(
                        format!("user{}", w),
                        orebook_core::audit::AuditAction::PageView,
                        "/dashboard",
                        format!("Visit {}", i),
                    ))
                    .await
                    .expect("append failed");
            }
        }));
    }
    for handle in handles {
        handle.await.expect("writer panicked");
    }

    let total = writer_count() * 10;
    assert_eq!(catalog.audit_tail(total + 10).await.unwrap().len(), total);

    let outcome = catalog.clear_audit("root".to_string()).await.unwrap();
    assert_eq!(outcome.cleared_entries, total);
    assert_eq!(catalog.audit_tail(total).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_shares_visible_across_clones() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let catalog = Catalog::open(temp_dir.path()).await.unwrap();
    let other = catalog.clone();

    catalog
        .grant_share(
            orebook_core::sharing::ShareScope::Role,
            "Investor".to_string(),
            "root".to_string(),
        )
        .await
        .unwrap();
    assert!(other.is_dataset_visible("anyone".to_string(), Role::Investor).await);
}
