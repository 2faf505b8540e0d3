//! The eight-key, four-bucket walkthrough: 8-bit keys, 2 bucket bits, block size 4.

use disksort_lib::sort::OutputBlock;
use tempfile::TempDir;

use crate::helpers::{flatten, u64_sorter};

const KEYS: [u64; 8] = [200, 5, 130, 64, 201, 6, 129, 65];

#[test]
fn test_keys_land_in_top_bit_buckets() {
    let dir = TempDir::new().unwrap();
    let mut sorter = u64_sorter(&dir.path().join("s"), 8, 2, 1);
    let expected = [3, 0, 2, 1, 3, 0, 2, 1];
    for (key, bucket) in KEYS.iter().zip(expected) {
        assert_eq!(sorter.bucket_index(key).unwrap(), bucket, "key {key}");
        sorter.add(key).unwrap();
    }
    sorter.finish().unwrap();
    for bucket in 0..4 {
        assert_eq!(sorter.bucket_len(bucket), Some(2));
        // Two 8-byte records per bucket.
        assert_eq!(std::fs::metadata(sorter.bucket_path(bucket)).unwrap().len(), 16);
    }
    sorter.teardown().unwrap();
}

#[test]
fn test_sorted_output_and_flags() {
    let dir = TempDir::new().unwrap();
    let mut sorter = u64_sorter(&dir.path().join("s"), 8, 2, 2);
    for key in KEYS {
        sorter.add(&key).unwrap();
    }
    sorter.finish().unwrap();
    let blocks = sorter.read(Vec::<OutputBlock<u64>>::new(), 4).unwrap();

    assert_eq!(flatten(&blocks), vec![5, 6, 64, 65, 129, 130, 200, 201]);
    // Each bucket's two keys share a quotient, so every bucket is one block.
    let expected: Vec<OutputBlock<u64>> = [(0, [5, 6]), (1, [64, 65]), (2, [129, 130]), (3, [200, 201])]
        .into_iter()
        .map(|(bucket, records)| OutputBlock { bucket, records: records.to_vec(), is_begin: true, is_end: true })
        .collect();
    assert_eq!(blocks, expected);

    let stats = sorter.read_stats().unwrap();
    assert_eq!((stats.buckets, stats.blocks, stats.records), (4, 4, 8));
    sorter.teardown().unwrap();
}

#[test]
fn test_unit_block_size_splits_every_key() {
    let dir = TempDir::new().unwrap();
    let mut sorter = u64_sorter(&dir.path().join("s"), 8, 2, 3);
    for key in KEYS {
        sorter.add(&key).unwrap();
    }
    sorter.finish().unwrap();
    let blocks = sorter.read(Vec::<OutputBlock<u64>>::new(), 1).unwrap();

    assert_eq!(blocks.len(), 8);
    for pair in blocks.chunks(2) {
        assert!(pair[0].is_begin && !pair[0].is_end);
        assert!(!pair[1].is_begin && pair[1].is_end);
        assert_eq!(pair[0].bucket, pair[1].bucket);
    }
    sorter.teardown().unwrap();
}
