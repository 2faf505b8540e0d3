//! Ordering, completeness and partition-boundary properties of the sorted output.

use disksort_lib::sort::{DiskSort, DiskSortConfig, FixedRecord, OutputBlock, PrefixKey};
use proptest::prelude::*;
use rstest::rstest;
use tempfile::TempDir;

use crate::helpers::{flatten, random_values, sort_all};

#[rstest]
#[case::one_bucket(16, 0, 1, 1000)]
#[case::many_buckets(16, 6, 4, 37)]
#[case::one_key_per_bucket(6, 6, 2, 1)]
#[case::wide_keys(64, 6, 8, 1 << 40)]
#[case::huge_blocks(32, 4, 3, u64::MAX)]
fn test_output_is_sorted_permutation(
    #[case] key_size: u32,
    #[case] log_buckets: u32,
    #[case] threads: usize,
    #[case] block_size: u64,
) {
    let dir = TempDir::new().unwrap();
    let values = random_values(u64::from(key_size) * 31 + u64::from(log_buckets), 20_000, key_size);
    let blocks = sort_all(&dir.path().join("p"), &values, key_size, log_buckets, threads, block_size);

    let mut expected = values.clone();
    expected.sort_unstable();
    assert_eq!(flatten(&blocks), expected);
}

#[test]
fn test_thread_count_does_not_change_output() {
    let dir = TempDir::new().unwrap();
    let mut values = random_values(11, 30_000, 20);
    // Plenty of duplicate keys.
    values.extend(values.clone().into_iter().take(5_000));

    let single = sort_all(&dir.path().join("one"), &values, 20, 5, 1, 64);
    let parallel = sort_all(&dir.path().join("eight"), &values, 20, 5, 8, 64);
    assert_eq!(single, parallel);
}

#[test]
fn test_bucket_boundaries() {
    let dir = TempDir::new().unwrap();
    let (key_size, log_buckets, block_size) = (16, 4, 50);
    let values = random_values(5, 10_000, key_size);
    let blocks = sort_all(&dir.path().join("b"), &values, key_size, log_buckets, 4, block_size);
    let shift = key_size - log_buckets;

    // Every record sits in the bucket its top bits name, and buckets appear in index order.
    for block in &blocks {
        assert!(!block.records.is_empty());
        for key in &block.records {
            assert_eq!((key >> shift) as usize, block.bucket);
        }
        // One block covers one quotient.
        let quotient = block.records[0] / block_size;
        assert!(block.records.iter().all(|k| k / block_size == quotient));
    }
    assert!(blocks.windows(2).all(|w| w[0].bucket <= w[1].bucket));

    // Exactly one begin and one end per bucket, at its first and last block.
    let mut start = 0;
    while start < blocks.len() {
        let bucket = blocks[start].bucket;
        let end = start + blocks[start..].iter().take_while(|b| b.bucket == bucket).count();
        let run = &blocks[start..end];
        assert!(run[0].is_begin, "bucket {bucket} does not open with a begin block");
        assert!(run[run.len() - 1].is_end, "bucket {bucket} does not close with an end block");
        assert_eq!(run.iter().filter(|b| b.is_begin).count(), 1);
        assert_eq!(run.iter().filter(|b| b.is_end).count(), 1);
        start = end;
    }
}

#[test]
fn test_empty_buckets_emit_nothing() {
    let dir = TempDir::new().unwrap();
    // Only buckets 1 and 6 of 8 receive records.
    let values: Vec<u64> = (0..100).map(|i| if i % 2 == 0 { 0x2000 + i } else { 0xC000 + i }).collect();
    let blocks = sort_all(&dir.path().join("e"), &values, 16, 3, 2, 16);
    let buckets: Vec<usize> = blocks.iter().filter(|b| b.is_begin).map(|b| b.bucket).collect();
    assert_eq!(buckets, vec![1, 6]);
}

#[test]
fn test_no_records() {
    let dir = TempDir::new().unwrap();
    assert!(sort_all(&dir.path().join("n"), &[], 8, 3, 2, 4).is_empty());
}

#[test]
fn test_fixed_records_keep_their_payload() {
    let dir = TempDir::new().unwrap();
    let config = DiskSortConfig::new(16, 4, dir.path().join("f")).threads(3);
    let mut sorter = DiskSort::new(config, PrefixKey::new(2)).unwrap();

    let mut records = Vec::new();
    for (i, key) in random_values(3, 2_000, 16).into_iter().enumerate() {
        let mut bytes = [0u8; 12];
        bytes[..2].copy_from_slice(&(key as u16).to_be_bytes());
        bytes[2..10].copy_from_slice(&(i as u64).to_le_bytes());
        records.push(FixedRecord(bytes));
    }
    for r in &records {
        sorter.add(r).unwrap();
    }
    sorter.finish().unwrap();
    let blocks = sorter.read(Vec::<OutputBlock<FixedRecord<12>>>::new(), 128).unwrap();
    sorter.teardown().unwrap();

    let mut out: Vec<FixedRecord<12>> = blocks.into_iter().flat_map(|b| b.records).collect();
    assert!(out.windows(2).all(|w| w[0].0[..2] <= w[1].0[..2]));
    out.sort_unstable_by_key(|r| r.0);
    records.sort_unstable_by_key(|r| r.0);
    assert_eq!(out, records);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn proptest_sort_matches_std_sort(
        values in prop::collection::vec(0u64..(1 << 12), 0..600),
        log_buckets in 0u32..=6,
        block_size in 1u64..5_000,
        threads in 1usize..=4,
    ) {
        let dir = TempDir::new().unwrap();
        let blocks = sort_all(&dir.path().join("pt"), &values, 12, log_buckets, threads, block_size);
        let mut expected = values.clone();
        expected.sort_unstable();
        prop_assert_eq!(flatten(&blocks), expected);
    }
}
