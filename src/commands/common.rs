//! Record file helpers shared across commands.
//!
//! Record files are a plain concatenation of fixed-width records with no header.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use disksort_lib::errors::DiskSortError;
use disksort_lib::pipeline::Sink;
use disksort_lib::sort::{FixedRecord, OutputBlock};
use disksort_lib::validation::validate_file_exists;

/// Record widths the `sort` command is compiled for.
pub const SUPPORTED_RECORD_SIZES: &[usize] =
    &[1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 16, 20, 24, 32, 40, 48, 64, 96, 100, 128, 256, 512, 1024];

/// Run `$body` with the const `$n` bound to `$size`, for every supported record size.
///
/// ```ignore
/// dispatch_record_size!(size, N => self.sort_records::<N>())
/// ```
macro_rules! dispatch_record_size {
    ($size:expr, $n:ident => $body:expr) => {
        dispatch_record_size!(@sizes $size, $n => $body;
            1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 16, 20, 24, 32, 40, 48, 64, 96, 100, 128, 256, 512, 1024)
    };
    (@sizes $size:expr, $n:ident => $body:expr; $($s:literal),*) => {
        match $size {
            $($s => {
                const $n: usize = $s;
                $body
            })*
            other => anyhow::bail!(
                "Unsupported record size {other}; supported sizes are {:?}",
                $crate::commands::common::SUPPORTED_RECORD_SIZES
            ),
        }
    };
}
pub(crate) use dispatch_record_size;

/// Reads a record file in chunks of whole records.
pub struct RecordReader {
    file: File,
    path: PathBuf,
    record_size: usize,
    len: u64,
    buf: Vec<u8>,
}

impl RecordReader {
    /// Open `path`, checking that it holds a whole number of `record_size`-byte records.
    pub fn open(path: &Path, record_size: usize, chunk_records: usize) -> Result<Self> {
        validate_file_exists(path, "Input file")?;
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat input file: {}", path.display()))?
            .len();
        if len % record_size as u64 != 0 {
            bail!(
                "{} is {len} bytes, which is not a multiple of the {record_size}-byte record size",
                path.display()
            );
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            record_size,
            len,
            buf: vec![0u8; record_size * chunk_records.max(1)],
        })
    }

    /// Number of records in the file.
    #[must_use]
    pub fn num_records(&self) -> u64 {
        self.len / self.record_size as u64
    }

    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.len
    }

    /// The next chunk of records, or `None` at end of file.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.file.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to read {}", self.path.display()));
                }
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled % self.record_size != 0 {
            bail!("Truncated record at the end of {}", self.path.display());
        }
        Ok(Some(&self.buf[..filled]))
    }
}

/// Writes sorted blocks to a record file.
pub struct BlockWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl BlockWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::with_capacity(1 << 20, file),
            path: path.to_path_buf(),
            records: 0,
        })
    }

    /// Flush buffered output and return the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", self.path.display()))?;
        Ok(self.records)
    }
}

impl<const N: usize> Sink<OutputBlock<FixedRecord<N>>> for BlockWriter {
    fn accept(&mut self, block: OutputBlock<FixedRecord<N>>) -> disksort_lib::errors::Result<()> {
        for record in &block.records {
            self.writer
                .write_all(record.as_bytes())
                .map_err(|e| DiskSortError::io("write", &self.path, e))?;
        }
        self.records += block.records.len() as u64;
        Ok(())
    }
}
