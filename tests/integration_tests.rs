use intkv::{Database, DatabaseConfig, Format};
use tempfile::tempdir;

#[test]
fn s1_avl_plus_flush() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();

    for (k, v) in [
        (3, 3),
        (4, 4),
        (6, 6),
        (8, 8),
        (12, 12),
        (13, 13),
        (12, 44),
        (16, 16),
        (17, 17),
        (21, 21),
    ] {
        db.put(k, v).unwrap();
    }

    assert_eq!(db.get(12).unwrap(), 44);
    assert_eq!(db.get(4).unwrap(), 4);
    assert_eq!(db.get(21).unwrap(), 21);
    assert_eq!(db.scan(5, 16).unwrap(), vec![(6, 6), (8, 8), (12, 44), (13, 13), (16, 16)]);
}

#[test]
fn s2_point_lookup_over_large_bsst() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_bsst(dir.path(), 256 * 256, 128).unwrap();

    for i in 1..=65536i64 {
        db.put(i, i).unwrap();
    }
    for i in [1i64, 2, 1000, 32768, 65535, 65536] {
        assert_eq!(db.get(i).unwrap(), i);
    }

    for i in 65537..=131072i64 {
        db.put(i, i).unwrap();
    }
    for i in [1i64, 65536, 65537, 100000, 131072] {
        assert_eq!(db.get(i).unwrap(), i);
    }
}

#[test]
fn s3_tombstones_survive_flush() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_bsst(dir.path(), 65536, 64).unwrap();

    for i in 1..=65536i64 {
        db.put(i, 10).unwrap();
    }
    for i in 1..=65536i64 {
        db.delete(i).unwrap();
    }
    for i in [1i64, 2, 32768, 65536] {
        assert_eq!(db.get(i).unwrap(), -1);
    }

    // another flush round: still absent.
    db.put(70000, 1).unwrap();
    db.delete(70000).unwrap();
    for i in [1i64, 32768, 65536, 70000] {
        assert_eq!(db.get(i).unwrap(), -1);
    }
}

#[test]
fn s4_scan_merges_memtable_and_segments() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();

    for (k, v) in [
        (3, 3),
        (4, 4),
        (6, 6),
        (8, 8),
        (12, 12),
        (13, 13),
        (12, 44),
        (16, 16),
        (17, 17),
        (21, 21),
    ] {
        db.put(k, v).unwrap();
    }
    db.put(78, 78).unwrap();
    db.put(29, 29).unwrap();
    db.put(4, 4).unwrap();

    assert_eq!(db.scan(20, 100).unwrap(), vec![(21, 21), (29, 29), (78, 78)]);
}

#[test]
fn s5_lsm_compaction() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_lsm(dir.path(), 5, 32).unwrap();

    for (k, v) in [(1, 1), (3, 3), (5, 5), (7, 7), (9, 9)] {
        db.put(k, v).unwrap();
    }
    for (k, v) in [(2, 2), (4, 4), (6, 6), (8, 8), (10, 10)] {
        db.put(k, v).unwrap();
    }

    let segment_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_str().unwrap().ends_with(".bin"))
        .collect();
    assert_eq!(segment_files.len(), 1);

    assert_eq!(db.get(4).unwrap(), 4);
    assert_eq!(db.get(9).unwrap(), 9);
    assert_eq!(db.scan(1, 5).unwrap(), vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
}

#[test]
fn s6_cascading_compaction() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_lsm(dir.path(), 5, 32).unwrap();

    for (k, v) in [(1, 1), (3, 3), (5, 5), (7, 7), (9, 9)] {
        db.put(k, v).unwrap();
    }
    for (k, v) in [(2, 2), (4, 4), (6, 6), (8, 8), (10, 10)] {
        db.put(k, v).unwrap();
    }
    for (k, v) in [(11, 11), (13, 13), (15, 15), (17, 17), (19, 19)] {
        db.put(k, v).unwrap();
    }
    for (k, v) in [(12, 12), (14, 14), (16, 16), (18, 18), (20, 20)] {
        db.put(k, v).unwrap();
    }

    let segment_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_str().unwrap().ends_with(".bin"))
        .collect();
    assert_eq!(segment_files.len(), 1);

    assert_eq!(db.get(20).unwrap(), 20);
    assert_eq!(
        db.scan(8, 12).unwrap(),
        vec![(8, 8), (9, 9), (10, 10), (11, 11), (12, 12)]
    );
}

#[test]
fn shadowing_across_segment_and_level_boundaries() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_lsm(dir.path(), 3, 16).unwrap();

    db.put(1, 1).unwrap();
    db.put(2, 2).unwrap();
    db.put(3, 3).unwrap(); // flushes, level 1 gets one segment

    db.put(1, 100).unwrap();
    db.put(4, 4).unwrap();
    db.put(5, 5).unwrap(); // flushes again, triggers a level-1 merge

    assert_eq!(db.get(1).unwrap(), 100);
}

#[test]
fn delete_then_put_resurrects_key() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_sorted(dir.path(), 100, 16).unwrap();

    db.put(42, 7).unwrap();
    db.delete(42).unwrap();
    assert_eq!(db.get(42).unwrap(), -1);

    db.put(42, 9).unwrap();
    assert_eq!(db.get(42).unwrap(), 9);
}

#[test]
fn scan_with_lo_gte_hi_is_empty() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();
    db.put(5, 5).unwrap();
    assert_eq!(db.scan(10, 10).unwrap(), Vec::new());
    assert_eq!(db.scan(10, 5).unwrap(), Vec::new());
}

#[test]
fn zero_key_is_rejected() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_sorted(dir.path(), 10, 16).unwrap();
    assert!(db.put(0, 1).is_err());
    assert!(db.delete(0).is_err());
}

#[test]
fn close_then_reopen_recovers_flushed_data() {
    let dir = tempdir().unwrap();
    {
        let mut db = Database::open_sorted(dir.path(), 1000, 16).unwrap();
        db.put(1, 1).unwrap();
        db.put(2, 2).unwrap();
        db.close().unwrap();
    }

    let mut db = Database::open(dir.path(), DatabaseConfig::new(1000, 16, Format::Sorted)).unwrap();
    assert_eq!(db.get(1).unwrap(), 1);
    assert_eq!(db.get(2).unwrap(), 2);
}

#[test]
fn buffer_pool_can_be_disabled_without_changing_results() {
    let dir = tempdir().unwrap();
    let mut db = Database::open_bsst(dir.path(), 2000, 32).unwrap();
    for i in 1..=2000i64 {
        db.put(i, i * 2).unwrap();
    }
    db.set_bufferpool_enabled(false);
    for i in [1i64, 999, 2000] {
        assert_eq!(db.get(i).unwrap(), i * 2);
    }
}
