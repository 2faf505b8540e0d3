//! Generate a file of random fixed-width records.
//!
//! Useful for producing sort inputs of a chosen size; with `--seed` the output
//! is reproducible.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use disksort_lib::logging::{OperationTimer, format_bytes, format_count};
use disksort_lib::progress::ProgressTracker;
use disksort_lib::validation::validate_positive;

use crate::commands::command::Command;

/// Records generated per write.
const CHUNK_RECORDS: usize = 16_384;

/// Write random records.
#[derive(Debug, Parser)]
#[command(name = "generate", about = "Write a file of random fixed-width binary records")]
pub struct Generate {
    /// Output record file.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Number of records to write.
    #[arg(short = 'n', long = "num-records")]
    pub num_records: u64,

    /// Size of each record in bytes.
    #[arg(long = "record-size")]
    pub record_size: usize,

    /// Random seed; omit for a different file each run.
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

impl Command for Generate {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_positive(self.record_size, "record-size")?;
        let timer = OperationTimer::new("Generating records");

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let file = File::create(&self.output)
            .with_context(|| format!("Failed to create output file: {}", self.output.display()))?;
        let mut writer = BufWriter::with_capacity(1 << 20, file);

        info!("Output: {}", self.output.display());
        info!(
            "Writing {} records of {} bytes ({})",
            format_count(self.num_records),
            self.record_size,
            format_bytes(self.num_records.saturating_mul(self.record_size as u64))
        );

        let progress = ProgressTracker::new("Generated records");
        let mut chunk = vec![0u8; CHUNK_RECORDS * self.record_size];
        let mut remaining = self.num_records;
        while remaining > 0 {
            let count = remaining.min(CHUNK_RECORDS as u64) as usize;
            let bytes = &mut chunk[..count * self.record_size];
            rng.fill_bytes(bytes);
            writer
                .write_all(bytes)
                .with_context(|| format!("Failed to write {}", self.output.display()))?;
            remaining -= count as u64;
            progress.log_if_needed(count as u64);
        }
        progress.log_final();
        writer.flush().with_context(|| format!("Failed to flush {}", self.output.display()))?;

        timer.log_completion(self.num_records);
        Ok(())
    }
}
