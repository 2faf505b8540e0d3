//! Sort a file of fixed-width binary records by a big-endian key prefix.
//!
//! # Verification
//!
//! Use `--verify` to check whether a file is already sorted without writing output.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use disksort_lib::logging::{OperationTimer, format_bytes, format_count, format_percent};
use disksort_lib::progress::ProgressTracker;
use disksort_lib::sort::{DiskSort, DiskSortConfig, FixedRecord, PrefixKey};
use disksort_lib::validation::{validate_dir_exists, validate_positive};

use crate::commands::command::Command;
use crate::commands::common::{BlockWriter, RecordReader, dispatch_record_size};

/// Largest bucket count picked automatically when `--log-buckets` is omitted.
const MAX_AUTO_LOG_BUCKETS: u32 = 16;

/// Blocks per bucket aimed for when `--block-size` is omitted.
const BLOCKS_PER_BUCKET_LOG: u32 = 6;

/// Sort a record file.
#[derive(Debug, Parser)]
#[command(
    name = "sort",
    about = "Sort fixed-width binary records by their leading key bytes",
    long_about = r#"
Sort a file of fixed-width binary records using a disk-backed bucket sort.

Records are scattered into 2^L bucket files by the top L bits of their key,
then each bucket is read back, split into blocks and sorted in parallel.
Peak memory is governed by bucket size, not input size: pick --log-buckets
so that a bucket comfortably fits in memory.

The key is the first --key-bytes bytes of each record, read as a big-endian
unsigned integer. Records with equal keys come out in no particular order.

EXAMPLES:

  # Sort 100-byte records on an 8-byte key prefix
  disksort sort -i records.bin -o sorted.bin --record-size 100

  # 4-byte keys, 1024 buckets, 8 threads, buckets on a fast scratch disk
  disksort sort -i in.bin -o out.bin --record-size 16 --key-bytes 4 \
    --log-buckets 10 --threads 8 --tmp-dir /scratch

  # Check that a file is sorted
  disksort sort -i out.bin --record-size 16 --key-bytes 4 --verify
"#
)]
pub struct Sort {
    /// Input record file.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output record file (required unless --verify is used).
    #[arg(short = 'o', long = "output", conflicts_with = "verify")]
    pub output: Option<PathBuf>,

    /// Verify the input file is sorted (no output written).
    ///
    /// Exits 0 if every record's key is >= the previous record's key,
    /// non-zero otherwise.
    #[arg(long = "verify", conflicts_with = "output")]
    pub verify: bool,

    /// Size of each record in bytes.
    #[arg(long = "record-size")]
    pub record_size: usize,

    /// Number of leading bytes forming the big-endian sort key.
    #[arg(long = "key-bytes", default_value = "8", value_parser = clap::value_parser!(u8).range(1..=8))]
    pub key_bytes: u8,

    /// log2 of the number of bucket files.
    ///
    /// Defaults to the smallest value that keeps an evenly filled bucket under
    /// --max-bucket-memory (or 256M when no limit is given).
    #[arg(short = 'L', long = "log-buckets")]
    pub log_buckets: Option<u32>,

    /// Width of the key range sorted as one block.
    ///
    /// Defaults to 1/64th of a bucket's key range.
    #[arg(short = 'M', long = "block-size")]
    pub block_size: Option<u64>,

    /// Number of threads for reading and sorting buckets.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Directory for bucket files.
    ///
    /// If not specified, uses the system default temp directory.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Write buffer per bucket (e.g. "256K", "1M").
    #[arg(long = "write-buffer", default_value = "1M", value_parser = parse_memory)]
    pub write_buffer: usize,

    /// Fail instead of loading a bucket larger than this (e.g. "2G").
    #[arg(long = "max-bucket-memory", value_parser = parse_memory)]
    pub max_bucket_memory: Option<usize>,
}

/// Parse a memory size string (e.g. "512M", "1G", "64K", "1048576").
fn parse_memory(s: &str) -> Result<usize, String> {
    let s = s.trim().to_uppercase();
    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (num_str, multiplier) = match s.as_bytes()[s.len() - 1] {
        b'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        b'M' => (&s[..s.len() - 1], 1024 * 1024),
        b'K' => (&s[..s.len() - 1], 1024),
        _ => (s.as_str(), 1),
    };
    let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;
    if num < 0.0 {
        return Err("Memory size must be positive".to_string());
    }
    Ok((num * f64::from(multiplier)) as usize)
}

/// Smallest `log` such that `input_bytes / 2^log <= target_bytes`, capped at `max_log`.
fn auto_log_buckets(input_bytes: u64, target_bytes: u64, max_log: u32) -> u32 {
    let target = target_bytes.max(1);
    let mut log = 0;
    while log < max_log && (input_bytes >> log) > target {
        log += 1;
    }
    log
}

/// Key-range width giving roughly `2^BLOCKS_PER_BUCKET_LOG` blocks per bucket.
fn default_block_size(key_bits: u32, log_buckets: u32) -> u64 {
    let bucket_bits = key_bits - log_buckets;
    1u64.checked_shl(bucket_bits.saturating_sub(BLOCKS_PER_BUCKET_LOG)).unwrap_or(1)
}

impl Command for Sort {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_positive(self.record_size, "record-size")?;
        if usize::from(self.key_bytes) > self.record_size {
            bail!(
                "--key-bytes ({}) cannot exceed --record-size ({})",
                self.key_bytes,
                self.record_size
            );
        }

        if self.verify {
            return self.execute_verify();
        }
        let Some(output) = self.output.as_deref() else {
            bail!("Either --output or --verify must be specified");
        };
        validate_positive(self.threads, "threads")?;
        if let Some(tmp) = &self.tmp_dir {
            validate_dir_exists(tmp, "tmp-dir")?;
        }
        dispatch_record_size!(self.record_size, N => self.execute_sort::<N>(output))
    }
}

impl Sort {
    fn key_bits(&self) -> u32 {
        u32::from(self.key_bytes) * 8
    }

    /// Execute sort mode: scatter into buckets, sort, and write output.
    fn execute_sort<const N: usize>(&self, output: &Path) -> Result<()> {
        let timer = OperationTimer::new("Sorting records");
        let mut reader = RecordReader::open(&self.input, N, 65_536)?;

        let key_bits = self.key_bits();
        let target = self.max_bucket_memory.map_or(256 << 20, |m| m as u64);
        let log_buckets = self
            .log_buckets
            .unwrap_or_else(|| auto_log_buckets(reader.len_bytes(), target, key_bits.min(MAX_AUTO_LOG_BUCKETS)));
        let block_size = match self.block_size {
            Some(m) => m,
            None => default_block_size(key_bits, log_buckets.min(key_bits)),
        };

        let tmp_root = self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let scratch = tempfile::Builder::new()
            .prefix("disksort.")
            .tempdir_in(&tmp_root)
            .with_context(|| format!("Failed to create a scratch directory in {}", tmp_root.display()))?;

        info!("Input: {} ({} records)", self.input.display(), format_count(reader.num_records()));
        info!("Output: {}", output.display());
        info!("Record size: {N} bytes, key: first {} bytes", self.key_bytes);
        info!("Buckets: {} (log {log_buckets}), block size: {block_size}", 1u64 << log_buckets.min(63));
        info!("Threads: {}", self.threads);
        info!("Write buffer: {} per bucket", format_bytes(self.write_buffer as u64));
        info!("Bucket files: {}", scratch.path().display());

        let config = DiskSortConfig::new(key_bits, log_buckets, scratch.path().join("bucket"))
            .threads(self.threads)
            .write_buffer_size(self.write_buffer)
            .max_bucket_bytes(self.max_bucket_memory.map(|m| m as u64));
        let mut sorter: DiskSort<FixedRecord<N>, PrefixKey> =
            DiskSort::new(config, PrefixKey::new(usize::from(self.key_bytes)))?;

        let result = Self::run::<N>(&mut sorter, &mut reader, output, block_size);
        sorter.teardown()?;
        let written = result?;

        let largest = (0..sorter.num_buckets()).filter_map(|i| sorter.bucket_len(i)).max().unwrap_or(0);
        info!("=== Summary ===");
        info!("Records processed: {}", format_count(sorter.num_records()));
        info!("Records written: {}", format_count(written));
        info!("Buffer flushes: {}", format_count(sorter.flush_count()));
        if sorter.num_records() > 0 {
            info!(
                "Largest bucket: {} records ({} of input)",
                format_count(largest),
                format_percent(largest as f64 / sorter.num_records() as f64, 2)
            );
        }
        if let Some(stats) = sorter.read_stats() {
            info!("Blocks sorted: {} across {} buckets", format_count(stats.blocks), stats.buckets);
        }
        timer.log_completion(written);
        Ok(())
    }

    fn run<const N: usize>(
        sorter: &mut DiskSort<FixedRecord<N>, PrefixKey>,
        reader: &mut RecordReader,
        output: &Path,
        block_size: u64,
    ) -> Result<u64> {
        let progress = ProgressTracker::new("Added records");
        while let Some(chunk) = reader.next_chunk()? {
            for bytes in chunk.chunks_exact(N) {
                sorter.add(&FixedRecord::from_slice(bytes))?;
            }
            progress.log_if_needed((chunk.len() / N) as u64);
        }
        progress.log_final();
        sorter.finish()?;

        let writer = sorter.read(BlockWriter::create(output)?, block_size)?;
        let written = writer.finish()?;
        if written != sorter.num_records() {
            bail!("Wrote {written} records but {} were added", sorter.num_records());
        }
        Ok(written)
    }

    /// Execute verify mode: read records and check key order.
    fn execute_verify(&self) -> Result<()> {
        let timer = OperationTimer::new("Verifying sort order");
        let key = PrefixKey::new(usize::from(self.key_bytes));
        let mut reader = RecordReader::open(&self.input, self.record_size, 65_536)?;

        info!("Input: {}", self.input.display());
        info!("Key: first {} bytes of {}-byte records", self.key_bytes, self.record_size);

        let mut total: u64 = 0;
        let mut violations: u64 = 0;
        let mut first_violation: Option<u64> = None;
        let mut prev: Option<u64> = None;
        while let Some(chunk) = reader.next_chunk()? {
            for bytes in chunk.chunks_exact(self.record_size) {
                let current = key.extract(bytes);
                if prev.is_some_and(|p| current < p) {
                    violations += 1;
                    first_violation.get_or_insert(total);
                }
                prev = Some(current);
                total += 1;
            }
        }

        info!("=== Verification Summary ===");
        info!("Records checked: {}", format_count(total));
        info!("Sort order violations: {}", format_count(violations));
        timer.log_completion(total);

        if let Some(index) = first_violation {
            info!("First violation at record {index}");
            bail!("File is NOT sorted: {violations} violations found");
        }
        info!("Result: PASS - file is sorted");
        Ok(())
    }
}
