//! Lifecycle guarantees: write rejection after finish, single read, teardown,
//! failure handling and the per-bucket memory cap.

use disksort_lib::errors::DiskSortError;
use disksort_lib::sort::{DiskSort, DiskSortConfig, OutputBlock, SortState};
use tempfile::TempDir;

use crate::helpers::{files_with_prefix, identity, random_values, u64_sorter};

#[test]
fn test_add_after_finish_leaves_files_untouched() {
    let dir = TempDir::new().unwrap();
    let mut sorter = u64_sorter(&dir.path().join("w"), 16, 2, 1);
    for v in random_values(1, 500, 16) {
        sorter.add(&v).unwrap();
    }
    sorter.finish().unwrap();

    let before: Vec<Vec<u8>> = (0..4).map(|i| std::fs::read(sorter.bucket_path(i)).unwrap()).collect();
    for v in [0u64, 0x4000, 0x8000, 0xFFFF] {
        let err = sorter.add(&v).unwrap_err();
        assert!(err.is_misuse(), "unexpected error: {err}");
    }
    let after: Vec<Vec<u8>> = (0..4).map(|i| std::fs::read(sorter.bucket_path(i)).unwrap()).collect();

    assert_eq!(before, after);
    assert_eq!(sorter.num_records(), 500);
    assert_eq!(before.iter().map(Vec::len).sum::<usize>(), 500 * 8);
    sorter.teardown().unwrap();
}

#[test]
fn test_bucket_files_hold_all_records_after_finish() {
    let dir = TempDir::new().unwrap();
    let mut sorter = u64_sorter(&dir.path().join("c"), 16, 3, 1);
    let values = random_values(2, 3_000, 16);
    for v in &values {
        sorter.add(v).unwrap();
    }
    // 256-byte buffers over 3,000 eight-byte records force many flushes.
    assert!(sorter.flush_count() > 0);
    sorter.finish().unwrap();

    for i in 0..8 {
        let on_disk = std::fs::metadata(sorter.bucket_path(i)).unwrap().len();
        assert_eq!(on_disk, sorter.bucket_len(i).unwrap() * 8);
    }
    sorter.teardown().unwrap();
}

#[test]
fn test_teardown_removes_every_file() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("td");

    // Torn down while still writing.
    let mut writing = u64_sorter(&prefix, 16, 4, 2);
    writing.add(&77).unwrap();
    assert_eq!(files_with_prefix(dir.path(), "td").len(), 16);
    writing.teardown().unwrap();
    assert!(files_with_prefix(dir.path(), "td").is_empty());

    // Torn down after a full read, twice.
    let mut read = u64_sorter(&prefix, 16, 4, 2);
    for v in random_values(4, 1_000, 16) {
        read.add(&v).unwrap();
    }
    read.finish().unwrap();
    read.read(Vec::<OutputBlock<u64>>::new(), 32).unwrap();
    read.teardown().unwrap();
    read.teardown().unwrap();
    assert_eq!(read.state(), SortState::TornDown);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_operations_after_teardown_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut sorter = u64_sorter(&dir.path().join("x"), 8, 1, 1);
    sorter.teardown().unwrap();
    assert!(matches!(sorter.add(&1), Err(DiskSortError::InvalidState { state: SortState::TornDown, .. })));
    assert!(matches!(sorter.finish(), Err(DiskSortError::InvalidState { .. })));
    assert!(matches!(
        sorter.read(Vec::<OutputBlock<u64>>::new(), 1),
        Err(DiskSortError::InvalidState { .. })
    ));
}

#[test]
fn test_truncated_bucket_fails_the_read() {
    let dir = TempDir::new().unwrap();
    let mut sorter = u64_sorter(&dir.path().join("t"), 8, 2, 2);
    for v in 0..200u64 {
        sorter.add(&v).unwrap();
    }
    sorter.finish().unwrap();
    // Bucket 2 holds keys 128..192: 64 records, 512 bytes.
    std::fs::write(sorter.bucket_path(2), [0u8; 12]).unwrap();

    let err = sorter.read(Vec::<OutputBlock<u64>>::new(), 8).err().unwrap();
    assert!(matches!(err, DiskSortError::ShortRead { expected: 512, actual: 12, .. }), "{err}");
    assert_eq!(sorter.state(), SortState::Exhausted);
    sorter.teardown().unwrap();
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_bucket_over_memory_cap_is_refused() {
    let dir = TempDir::new().unwrap();
    let config = DiskSortConfig::new(16, 2, dir.path().join("cap"))
        .threads(2)
        .max_bucket_bytes(Some(8 * 1_000));
    let mut sorter = DiskSort::new(config, identity as fn(&u64) -> u64).unwrap();

    // Bucket 0 stays under the cap; bucket 3 goes over it.
    for v in 0..900u64 {
        sorter.add(&v).unwrap();
    }
    for v in 0..1_200u64 {
        sorter.add(&(0xC000 + v)).unwrap();
    }
    sorter.finish().unwrap();

    match sorter.read(Vec::<OutputBlock<u64>>::new(), 64) {
        Err(DiskSortError::BucketTooLarge { index: 3, bytes: 9_600, limit: 8_000 }) => {}
        other => panic!("expected BucketTooLarge, got {:?}", other.map(|b| b.len())),
    }
    sorter.teardown().unwrap();
}

#[test]
fn test_buckets_under_memory_cap_sort_normally() {
    let dir = TempDir::new().unwrap();
    let config = DiskSortConfig::new(16, 4, dir.path().join("ok"))
        .threads(4)
        .queue_depth(2)
        .max_bucket_bytes(Some(64 * 1024));
    let mut sorter = DiskSort::new(config, identity as fn(&u64) -> u64).unwrap();
    let values = random_values(9, 50_000, 16);
    for v in &values {
        sorter.add(v).unwrap();
    }
    sorter.finish().unwrap();
    let blocks = sorter.read(Vec::<OutputBlock<u64>>::new(), 256).unwrap();
    sorter.teardown().unwrap();

    let largest = blocks
        .iter()
        .fold(std::collections::HashMap::<usize, usize>::new(), |mut acc, b| {
            *acc.entry(b.bucket).or_default() += b.records.len();
            acc
        })
        .into_values()
        .max()
        .unwrap();
    assert!(largest * 8 <= 64 * 1024);
    assert_eq!(blocks.iter().map(|b| b.records.len()).sum::<usize>(), values.len());
}

#[test]
fn test_invalid_configuration_creates_no_files() {
    let dir = TempDir::new().unwrap();
    let config = DiskSortConfig::new(8, 9, dir.path().join("bad"));
    let err = DiskSort::new(config, identity as fn(&u64) -> u64).err().unwrap();
    assert!(matches!(err, DiskSortError::InvalidParameter { .. }));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
