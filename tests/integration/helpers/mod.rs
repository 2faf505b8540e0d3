//! Helper utilities for integration tests.

use std::path::{Path, PathBuf};

use disksort_lib::sort::{DiskSort, DiskSortConfig, OutputBlock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub type U64Sorter = DiskSort<u64, fn(&u64) -> u64>;

pub fn identity(x: &u64) -> u64 {
    *x
}

/// A `u64` sorter keyed by the value itself, with a small write buffer so flushes happen.
pub fn u64_sorter(prefix: &Path, key_size: u32, log_buckets: u32, threads: usize) -> U64Sorter {
    let config = DiskSortConfig::new(key_size, log_buckets, prefix)
        .threads(threads)
        .write_buffer_size(256)
        .read_chunk_records(97);
    DiskSort::new(config, identity as fn(&u64) -> u64).expect("failed to create sorter")
}

/// Add `values`, finish, read with block size `block_size`, and tear down.
pub fn sort_all(
    prefix: &Path,
    values: &[u64],
    key_size: u32,
    log_buckets: u32,
    threads: usize,
    block_size: u64,
) -> Vec<OutputBlock<u64>> {
    let mut sorter = u64_sorter(prefix, key_size, log_buckets, threads);
    for v in values {
        sorter.add(v).unwrap();
    }
    sorter.finish().unwrap();
    let blocks = sorter.read(Vec::<OutputBlock<u64>>::new(), block_size).unwrap();
    sorter.teardown().unwrap();
    blocks
}

/// `n` random values below `2^bits`.
pub fn random_values(seed: u64, n: usize, bits: u32) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    (0..n).map(|_| rng.random::<u64>() & mask).collect()
}

pub fn flatten(blocks: &[OutputBlock<u64>]) -> Vec<u64> {
    blocks.iter().flat_map(|b| b.records.iter().copied()).collect()
}

/// Files in `dir` whose names start with `prefix`.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(prefix)))
        .collect();
    files.sort();
    files
}
