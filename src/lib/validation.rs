//! Input validation utilities
//!
//! Common checks for configuration values and command-line parameters, all
//! reporting [`DiskSortError::InvalidParameter`] with consistent messages.

use crate::errors::{DiskSortError, Result};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::Path;

/// Validate that a file exists
///
/// # Example
/// ```
/// use disksort_lib::validation::validate_file_exists;
///
/// assert!(validate_file_exists("/nonexistent/records.bin", "Input file").is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DiskSortError::InvalidParameter {
            parameter: description.to_string(),
            reason: format!("File does not exist: {}", path.display()),
        });
    }
    Ok(())
}

/// Validate that a directory exists
pub fn validate_dir_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Err(DiskSortError::InvalidParameter {
            parameter: description.to_string(),
            reason: format!("Directory does not exist: {}", path.display()),
        });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Example
/// ```
/// use disksort_lib::validation::validate_positive;
///
/// validate_positive(10, "threads").unwrap();
/// assert!(validate_positive(0, "threads").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(DiskSortError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate that a value lies in an inclusive range
///
/// # Example
/// ```
/// use disksort_lib::validation::validate_range;
///
/// validate_range(32u32, 1..=64, "key_size").unwrap();
/// assert!(validate_range(65u32, 1..=64, "key_size").is_err());
/// ```
pub fn validate_range<T: PartialOrd + Display>(value: T, range: RangeInclusive<T>, name: &str) -> Result<()> {
    if !range.contains(&value) {
        return Err(DiskSortError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be in {}..={}, got: {value}", range.start(), range.end()),
        });
    }
    Ok(())
}
