//! CLI command implementations for disksort.
//!
//! - [`sort`] - sort a record file, or verify that it is sorted
//! - [`generate`] - write a file of random records

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod generate;
pub mod sort;
