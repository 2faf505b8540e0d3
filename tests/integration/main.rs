//! Integration tests for the disksort library and CLI.
//!
//! These tests drive the engine end to end through its public API and the
//! built binary, checking the ordering, partitioning and lifecycle guarantees.

mod helpers;
mod test_cli;
mod test_lifecycle;
mod test_ordering;
mod test_scenario;
