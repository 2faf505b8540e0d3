//! Command trait definition for CLI commands.
//!
//! Every subcommand implements [`Command`]; `enum_dispatch` routes calls from
//! the `Subcommand` enum to the selected variant.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all disksort CLI commands.
///
/// `command_line` is the full invocation, for commands that record it.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
