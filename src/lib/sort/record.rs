//! Fixed-width records and key extraction.
//!
//! The engine stores records as a raw concatenation of `DISK_SIZE`-byte images
//! and orders them by an unsigned integer key. Both capabilities are traits so
//! callers can plug in their own record layouts.

use crate::errors::{DiskSortError, Result};

/// A fixed-width record that can be written to and read from a byte buffer.
pub trait Record: Sized + Send + 'static {
    /// Exact serialized width in bytes.
    const DISK_SIZE: usize;

    /// Serialize into the first `DISK_SIZE` bytes of `buf`, returning the bytes written.
    fn write_to(&self, buf: &mut [u8]) -> usize;

    /// Deserialize from the first `DISK_SIZE` bytes of `buf`.
    fn read_from(buf: &[u8]) -> Self;
}

/// Extracts the sort key of a record.
///
/// Keys must be deterministic and fit in the configured `key_size` bits: the
/// same function partitions records when they are written and again when they
/// are read back.
pub trait KeyExtractor<T>: Send + Sync + 'static {
    fn key(&self, record: &T) -> u64;

    /// Reject extractors that cannot read a key out of every `T`.
    ///
    /// Called once when a sorter is built, so that [`key`](Self::key) never
    /// has to fail on a record.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl<T, F> KeyExtractor<T> for F
where
    F: Fn(&T) -> u64 + Send + Sync + 'static,
{
    #[inline]
    fn key(&self, record: &T) -> u64 {
        self(record)
    }
}

macro_rules! impl_be_record {
    ($($ty:ty),*) => {
        $(
            impl Record for $ty {
                const DISK_SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write_to(&self, buf: &mut [u8]) -> usize {
                    buf[..Self::DISK_SIZE].copy_from_slice(&self.to_be_bytes());
                    Self::DISK_SIZE
                }

                #[inline]
                fn read_from(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::DISK_SIZE]);
                    <$ty>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_be_record!(u8, u16, u32, u64);

/// An opaque record of exactly `N` bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FixedRecord<const N: usize>(pub [u8; N]);

impl<const N: usize> FixedRecord<N> {
    /// Copy a record out of the first `N` bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than `N`.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; N];
        data.copy_from_slice(&bytes[..N]);
        Self(data)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> Default for FixedRecord<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> Record for FixedRecord<N> {
    const DISK_SIZE: usize = N;

    #[inline]
    fn write_to(&self, buf: &mut [u8]) -> usize {
        buf[..N].copy_from_slice(&self.0);
        N
    }

    #[inline]
    fn read_from(buf: &[u8]) -> Self {
        Self::from_slice(buf)
    }
}

/// Key made of the first `bytes` bytes of a [`FixedRecord`], read big-endian.
///
/// Big-endian keys make integer order agree with lexicographic byte order, so
/// a file sorted by this key is also sorted byte-wise on its prefix.
#[derive(Clone, Copy, Debug)]
pub struct PrefixKey {
    bytes: usize,
}

impl PrefixKey {
    /// Create a key over the first `bytes` bytes (clamped to 1..=8).
    #[must_use]
    pub fn new(bytes: usize) -> Self {
        Self { bytes: bytes.clamp(1, 8) }
    }

    /// Number of key bits this extractor produces.
    #[must_use]
    pub fn key_size(&self) -> u32 {
        (self.bytes * 8) as u32
    }

    /// Extract the key from raw record bytes.
    #[inline]
    #[must_use]
    pub fn extract(&self, record: &[u8]) -> u64 {
        record[..self.bytes].iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

impl<const N: usize> KeyExtractor<FixedRecord<N>> for PrefixKey {
    #[inline]
    fn key(&self, record: &FixedRecord<N>) -> u64 {
        self.extract(&record.0)
    }

    fn validate(&self) -> Result<()> {
        if self.bytes > N {
            return Err(DiskSortError::InvalidParameter {
                parameter: "key_bytes".to_string(),
                reason: format!("a {}-byte key does not fit in {N}-byte records", self.bytes),
            });
        }
        Ok(())
    }
}
